use async_trait::async_trait;
use common::{EventWorkflow, ResearchWorkflow, TaskOf, Workflow};

use crate::api::ApiClient;
use crate::error::Result;

/// Origen de las copias frescas de una tarea.
///
/// El poller sólo necesita "traer la tarea por id"; en producción es el
/// `ApiClient`, en tests puede ser cualquier fake.
#[async_trait]
pub trait TaskBackend<W: Workflow>: Send + Sync + 'static {
    async fn fetch(&self, task_id: &str) -> Result<TaskOf<W>>;
}

#[async_trait]
impl TaskBackend<EventWorkflow> for ApiClient {
    async fn fetch(&self, task_id: &str) -> Result<TaskOf<EventWorkflow>> {
        self.get_event(task_id).await
    }
}

#[async_trait]
impl TaskBackend<ResearchWorkflow> for ApiClient {
    async fn fetch(&self, task_id: &str) -> Result<TaskOf<ResearchWorkflow>> {
        self.get_research(task_id).await
    }
}
