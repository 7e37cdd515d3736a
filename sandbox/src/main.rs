mod advance;
mod handlers;
mod state;

use crate::state::AppState;
use anyhow::Context;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STAGE_SECS: u64 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sandbox=debug,tower_http=info,axum=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = std::env::var("SANDBOX_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let stage_secs = match std::env::var("SANDBOX_STAGE_SECS") {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("SANDBOX_STAGE_SECS inválido: {raw}"))?,
        Err(_) => DEFAULT_STAGE_SECS,
    };

    let state = AppState::new();

    // router HTTP
    let app = handlers::build_router(state.clone());

    // avance de etapas en segundo plano
    let advance_state = state.clone();
    tokio::spawn(async move {
        advance::advance_stages(advance_state, Duration::from_secs(stage_secs.max(1))).await;
    });

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {addr}"))?;
    info!(
        "sandbox escuchando en {} (etapas cada {}s)",
        listener.local_addr()?,
        stage_secs
    );

    axum::serve(listener, app).await?;
    Ok(())
}
