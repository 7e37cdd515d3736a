//! Utilidades compartidas por los tests de integración del cliente.

use std::{sync::Arc, time::Duration};

use client::{ApiClient, ClientConfig, PollingController, TaskBackend};
use common::Workflow;
use serde_json::{json, Value};
use wiremock::MockServer;

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn api_for(server: &MockServer) -> Arc<ApiClient> {
    let config = ClientConfig::default().with_api_url(server.uri());
    Arc::new(ApiClient::new(&config).expect("config válida"))
}

#[allow(dead_code)]
pub fn poller_for<W: Workflow>(server: &MockServer) -> PollingController<W, ApiClient>
where
    ApiClient: TaskBackend<W>,
{
    PollingController::new(api_for(server), Duration::from_secs(1))
}

/// Cuerpo JSON mínimo de una tarea, con campos extra mezclados encima.
pub fn task_json(task_id: &str, status: &str, updated_at: f64, extra: Value) -> Value {
    let mut body = json!({
        "task_id": task_id,
        "status": status,
        "created_at": 1_700_000_000.0,
        "updated_at": updated_at,
    });
    if let (Some(obj), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    body
}
