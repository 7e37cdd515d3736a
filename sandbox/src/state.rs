// sandbox/src/state.rs

use common::{EventTask, PromptConfig, ResearchTask, TaskId};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Evento guardado junto con lo que pidió el usuario al crearlo.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub task: EventTask,
    pub title: String,
    /// Último pedido de revisión del anuncio
    pub revision: Option<String>,
    /// Índices que se pidieron regenerar en la última ronda
    pub regenerate: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ResearchRecord {
    pub task: ResearchTask,
    pub instructions: Option<String>,
    pub prompts: PromptConfig,
}

#[derive(Clone, Default)]
pub struct AppState {
    pub events: Arc<Mutex<HashMap<TaskId, EventRecord>>>,
    pub research: Arc<Mutex<HashMap<TaskId, ResearchRecord>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> MutexGuard<'_, HashMap<TaskId, EventRecord>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn research(&self) -> MutexGuard<'_, HashMap<TaskId, ResearchRecord>> {
        self.research.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
