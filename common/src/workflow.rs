use serde::{de::DeserializeOwned, Serialize};
use std::fmt::{Debug, Display};

use crate::actions::{ActionContext, ActionSet};
use crate::chip::StatusChip;
use crate::task::Task;

/// Enum de status de un workflow.
///
/// El backend puede agregar status nuevos sin avisar, así que toda
/// implementación tiene que aceptar strings desconocidos (variante
/// `Unknown`) en vez de fallar al deserializar.
pub trait WorkflowStatus:
    Debug + Display + Clone + PartialEq + Eq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Valor tal cual viaja en el JSON.
    fn as_str(&self) -> &str;

    /// No se espera más progreso del pipeline.
    fn is_terminal(&self) -> bool;

    /// El backend está produciendo contenido; no hay nada que revisar.
    fn is_busy(&self) -> bool;

    fn is_known(&self) -> bool;

    fn chip(&self) -> StatusChip;
}

/// Señales derivadas del payload que afectan la elección de pestaña.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabHints {
    pub has_images: bool,
    pub has_video_prompts: bool,
}

/// Configuración de un workflow concreto (evento o investigación).
///
/// La máquina de estados genérica y el poller trabajan sobre este trait, así
/// que los dos workflows comparten la lógica y sólo cambian las tablas.
pub trait Workflow: Send + Sync + 'static {
    type Status: WorkflowStatus;
    type Payload: Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Tab: Debug + Display + Copy + PartialEq + Eq + Send + Sync + 'static;

    /// Nombre corto para logs y rutas ("event", "research").
    const KIND: &'static str;

    const DEFAULT_TAB: Self::Tab;

    fn hints(task: &TaskOf<Self>) -> TabHints;

    /// Pestaña que se auto-selecciona para un status + hints.
    fn select_tab(status: &Self::Status, hints: TabHints) -> Self::Tab;

    fn actions(task: &TaskOf<Self>, ctx: &ActionContext) -> ActionSet;
}

pub type TaskOf<W> = Task<<W as Workflow>::Status, <W as Workflow>::Payload>;
