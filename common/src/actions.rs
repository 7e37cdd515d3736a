use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Controles de acción que la UI puede ofrecer sobre una tarea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Accept,
    Reject,
    Regenerate,
    GenerateNext,
    EditPrompts,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::Regenerate => "regenerate",
            Action::GenerateNext => "generate_next",
            Action::EditPrompts => "edit_prompts",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado local de los controles: imágenes marcadas y texto de feedback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionContext {
    pub selected_images: BTreeSet<usize>,
    pub feedback: Option<String>,
}

impl ActionContext {
    /// Feedback recortado; `None` si está vacío o sólo tiene espacios.
    pub fn feedback_text(&self) -> Option<&str> {
        self.feedback
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn has_feedback(&self) -> bool {
        self.feedback_text().is_some()
    }

    pub fn has_selection(&self) -> bool {
        !self.selected_images.is_empty()
    }

    /// Alterna la marca de una imagen; devuelve si quedó seleccionada.
    pub fn toggle_image(&mut self, index: usize) -> bool {
        if self.selected_images.remove(&index) {
            false
        } else {
            self.selected_images.insert(index);
            true
        }
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.selected_images.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.selected_images.clear();
        self.feedback = None;
    }
}

/// Qué controles están habilitados para un status + contexto dados.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionSet {
    pub accept: bool,
    pub reject: bool,
    pub regenerate: bool,
    pub generate_next: bool,
    /// La siguiente etapa es obligatoria antes de que el pipeline siga
    /// (ej: regenerar el outline después de editar prompts).
    pub next_stage_required: bool,
    pub edit_prompts: bool,
}

impl ActionSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn permits(&self, action: Action) -> bool {
        match action {
            Action::Accept => self.accept,
            Action::Reject => self.reject,
            Action::Regenerate => self.regenerate,
            Action::GenerateNext => self.generate_next,
            Action::EditPrompts => self.edit_prompts,
        }
    }

    pub fn enabled(&self) -> Vec<Action> {
        [
            Action::Accept,
            Action::Reject,
            Action::Regenerate,
            Action::GenerateNext,
            Action::EditPrompts,
        ]
        .into_iter()
        .filter(|a| self.permits(*a))
        .collect()
    }

    /// true si hay alguna acción de revisión (accept/reject/regenerate).
    pub fn awaiting_review(&self) -> bool {
        self.accept || self.reject || self.regenerate
    }
}
