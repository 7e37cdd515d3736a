use std::sync::Arc;

use common::{
    chip::UNKNOWN_CHIP, Action, ActionContext, ActionSet, EventStatus, EventWorkflow, PdfInfo,
    PromptConfig, PromptOverrides, ResearchStatus, ResearchWorkflow, StatusChip, TaskId, TaskOf,
    Workflow, WorkflowStatus, WorkflowStatusMachine,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::backend::TaskBackend;
use crate::error::{ClientError, Result};
use crate::poller::{PollingController, RefreshResult};

/// Sesión de trabajo sobre una tarea abierta.
///
/// Junta lo que vive mientras la tarea está en pantalla: el poller
/// compartido, la máquina de pestañas y el estado local de los controles.
pub struct TaskSession<W: Workflow>
where
    ApiClient: TaskBackend<W>,
{
    task_id: TaskId,
    poller: PollingController<W, ApiClient>,
    machine: WorkflowStatusMachine<W>,
    ctx: ActionContext,
    updates: broadcast::Receiver<TaskOf<W>>,
}

pub type EventSession = TaskSession<EventWorkflow>;
pub type ResearchSession = TaskSession<ResearchWorkflow>;

impl<W: Workflow> TaskSession<W>
where
    ApiClient: TaskBackend<W>,
{
    pub fn new(poller: PollingController<W, ApiClient>, task_id: impl Into<TaskId>) -> Self {
        let updates = poller.subscribe();
        Self {
            task_id: task_id.into(),
            poller,
            machine: WorkflowStatusMachine::new(),
            ctx: ActionContext::default(),
            updates,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn poller(&self) -> &PollingController<W, ApiClient> {
        &self.poller
    }

    fn api(&self) -> Arc<ApiClient> {
        self.poller.backend().clone()
    }

    pub fn task(&self) -> Option<TaskOf<W>> {
        self.poller.cached(&self.task_id)
    }

    /// Pestaña actual, re-derivada contra la última copia en caché (los
    /// ticks del polling la pueden haber cambiado).
    pub fn tab(&mut self) -> W::Tab {
        self.sync();
        self.machine.tab()
    }

    pub fn select_tab(&mut self, tab: W::Tab) {
        self.machine.select(tab);
    }

    pub fn chip(&self) -> StatusChip {
        self.task()
            .map(|t| t.status.chip())
            .unwrap_or(UNKNOWN_CHIP)
    }

    pub fn actions(&self) -> ActionSet {
        self.task()
            .map(|t| W::actions(&t, &self.ctx))
            .unwrap_or_default()
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    pub fn toggle_image(&mut self, index: usize) -> bool {
        self.ctx.toggle_image(index)
    }

    pub fn set_feedback(&mut self, feedback: Option<String>) {
        self.ctx.feedback = feedback;
    }

    pub fn set_auto_polling(&self, enabled: bool) {
        self.poller.set_auto_polling(&self.task_id, enabled)
    }

    pub fn is_auto_polling(&self) -> bool {
        self.poller.is_auto_polling(&self.task_id)
    }

    /// Si hay un loop de polling corriendo ahora (no sólo pedido).
    pub fn is_polling(&self) -> bool {
        self.poller.is_polling(&self.task_id)
    }

    pub async fn refresh(&mut self) -> RefreshResult<TaskOf<W>> {
        let result = self.poller.refresh(&self.task_id).await;
        self.sync();
        result
    }

    /// Re-observa la copia en caché (ej: después de un tick del polling).
    /// Devuelve la pestaña si cambió.
    pub fn sync(&mut self) -> Option<W::Tab> {
        let task = self.poller.cached(&self.task_id)?;
        self.machine.observe(&task)
    }

    /// Espera la próxima copia de esta tarea que aplique el poller y la
    /// observa. Devuelve la pestaña si cambió.
    pub async fn next_update(&mut self) -> std::result::Result<Option<W::Tab>, RecvError> {
        loop {
            let task = self.updates.recv().await?;
            if task.task_id == self.task_id {
                return Ok(self.sync());
            }
        }
    }

    /// Valida que la acción esté habilitada antes de mandar nada.
    fn ensure(&self, action: Action) -> Result<TaskOf<W>> {
        let task = self
            .task()
            .ok_or_else(|| ClientError::blocked(action, "not loaded"))?;

        if W::actions(&task, &self.ctx).permits(action) {
            Ok(task)
        } else {
            debug!(
                kind = W::KIND,
                task_id = %self.task_id,
                "acción {} bloqueada en {}",
                action,
                task.status
            );
            Err(ClientError::blocked(action, task.status.as_str()))
        }
    }

    /// Toda acción enviada termina con exactamente un refresh, salga bien o
    /// mal, para que la vista refleje lo que hizo el backend.
    async fn finish(&mut self, action: Action, outcome: Result<TaskOf<W>>) -> Result<()> {
        if let Err(e) = self.refresh().await {
            warn!(
                kind = W::KIND,
                task_id = %self.task_id,
                "refresh después de {} falló: {}",
                action,
                e
            );
        }

        match outcome {
            Ok(task) => {
                info!(
                    kind = W::KIND,
                    task_id = %self.task_id,
                    "{} enviado (backend respondió {})",
                    action,
                    task.status
                );
                self.ctx.clear();
                Ok(())
            }
            Err(e) => {
                warn!(
                    kind = W::KIND,
                    task_id = %self.task_id,
                    "{} falló: {}",
                    action,
                    e
                );
                Err(e)
            }
        }
    }

    fn feedback(&self) -> Option<String> {
        self.ctx.feedback_text().map(str::to_string)
    }
}

impl<W: Workflow> Drop for TaskSession<W>
where
    ApiClient: TaskBackend<W>,
{
    fn drop(&mut self) {
        self.poller.set_auto_polling(&self.task_id, false);
    }
}

/* ---------------- eventos ---------------- */

impl TaskSession<EventWorkflow> {
    /// Acepta el anuncio, o las imágenes ("aceptar y continuar").
    /// Con imágenes marcadas se envían como feedback sin regenerar.
    pub async fn accept(&mut self) -> Result<()> {
        let task = self.ensure(Action::Accept)?;
        let api = self.api();
        let feedback = self.feedback();

        let outcome = match task.status {
            EventStatus::ImagesReady if self.ctx.has_selection() => {
                api.provide_image_feedback(
                    &self.task_id,
                    self.ctx.selected_indices(),
                    feedback.unwrap_or_default(),
                    false,
                )
                .await
            }
            EventStatus::ImagesReady => api.accept_images(&self.task_id).await,
            _ => api.accept_announcement(&self.task_id, feedback).await,
        };

        self.finish(Action::Accept, outcome).await
    }

    /// Pide otra versión: del anuncio (exige feedback) o de las imágenes
    /// marcadas.
    pub async fn reject(&mut self) -> Result<()> {
        let task = self.ensure(Action::Reject)?;
        let api = self.api();
        let feedback = self.feedback().unwrap_or_default();

        let outcome = match task.status {
            EventStatus::ImagesReady => {
                api.provide_image_feedback(&self.task_id, self.ctx.selected_indices(), feedback, true)
                    .await
            }
            _ => api.revise_announcement(&self.task_id, feedback).await,
        };

        self.finish(Action::Reject, outcome).await
    }

    /// Regenera las imágenes marcadas.
    pub async fn regenerate(&mut self) -> Result<()> {
        self.ensure(Action::Regenerate)?;
        let api = self.api();
        let outcome = api
            .provide_image_feedback(
                &self.task_id,
                self.ctx.selected_indices(),
                self.feedback().unwrap_or_default(),
                true,
            )
            .await;

        self.finish(Action::Regenerate, outcome).await
    }

    /// Genera los videos a partir de los prompts ya generados.
    pub async fn generate_next(&mut self) -> Result<()> {
        self.ensure(Action::GenerateNext)?;
        let api = self.api();
        let outcome = api.generate_videos(&self.task_id).await;
        self.finish(Action::GenerateNext, outcome).await
    }

    pub async fn update_prompts(&mut self, overrides: PromptOverrides) -> Result<()> {
        self.ensure(Action::EditPrompts)?;
        if overrides.is_empty() {
            return Err(ClientError::Validation(
                "no hay prompts para actualizar".to_string(),
            ));
        }

        let api = self.api();
        let outcome = api.update_system_prompts(&self.task_id, &overrides).await;
        self.finish(Action::EditPrompts, outcome).await
    }

    pub async fn prompts(&self) -> Result<PromptOverrides> {
        self.api().get_event_prompts(&self.task_id).await
    }
}

/* ---------------- investigación ---------------- */

impl TaskSession<ResearchWorkflow> {
    pub async fn accept(&mut self) -> Result<()> {
        self.ensure(Action::Accept)?;
        let api = self.api();
        let outcome = api.accept_outline(&self.task_id, self.feedback()).await;
        self.finish(Action::Accept, outcome).await
    }

    /// Rechaza el outline con feedback (obligatorio).
    pub async fn reject(&mut self) -> Result<()> {
        self.ensure(Action::Reject)?;
        let api = self.api();
        let outcome = api.reject_outline(&self.task_id, self.feedback()).await;
        self.finish(Action::Reject, outcome).await
    }

    /// Regenera el outline: un reject sin feedback.
    pub async fn regenerate(&mut self) -> Result<()> {
        self.ensure(Action::Regenerate)?;
        let api = self.api();
        let outcome = api.reject_outline(&self.task_id, None).await;
        self.finish(Action::Regenerate, outcome).await
    }

    /// Regeneración obligatoria del outline después de editar prompts.
    pub async fn generate_next(&mut self) -> Result<()> {
        self.ensure(Action::GenerateNext)?;
        let api = self.api();
        let outcome = api.reject_outline(&self.task_id, None).await;
        self.finish(Action::GenerateNext, outcome).await
    }

    pub async fn update_prompts(&mut self, partial: PromptConfig) -> Result<()> {
        self.ensure(Action::EditPrompts)?;
        if partial.is_empty() {
            return Err(ClientError::Validation(
                "no hay prompts para actualizar".to_string(),
            ));
        }

        let api = self.api();
        let outcome = api.update_prompts(&self.task_id, &partial).await;
        self.finish(Action::EditPrompts, outcome).await
    }

    pub async fn prompts(&self) -> Result<PromptConfig> {
        self.api().get_user_prompts(&self.task_id).await
    }

    /// URL del PDF del artículo; sólo existe con la tarea completada.
    pub async fn pdf(&self) -> Result<PdfInfo> {
        match self.task().map(|t| t.status) {
            Some(ResearchStatus::Completed) => self.api().get_research_pdf(&self.task_id).await,
            Some(other) => Err(ClientError::Validation(format!(
                "el PDF sólo está disponible con la tarea completada (status {other})"
            ))),
            None => Err(ClientError::Validation("tarea no cargada".to_string())),
        }
    }
}
