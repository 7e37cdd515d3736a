use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/* --------- Creación de tareas --------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartEventRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResearchRequest {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: TaskId,
}

/* --------- Acciones del workflow de eventos --------- */

/// Aprobación (o pedido de revisión) del anuncio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFeedbackRequest {
    pub selected_indices: Vec<usize>,
    #[serde(default)]
    pub feedback: String,
    pub regenerate: bool,
}

/// Overrides de los prompts de sistema de cada etapa. Los campos en `None`
/// conservan el valor actual del backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl PromptOverrides {
    pub fn is_empty(&self) -> bool {
        self.announcement.is_none() && self.image.is_none() && self.video.is_none()
    }

    /// Aplica encima de `self` los campos presentes en `other`.
    pub fn merge(&mut self, other: PromptOverrides) {
        if other.announcement.is_some() {
            self.announcement = other.announcement;
        }
        if other.image.is_some() {
            self.image = other.image;
        }
        if other.video.is_some() {
            self.video = other.video;
        }
    }
}

/* --------- Acciones del workflow de investigación --------- */

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlineFeedback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Prompts editables de una investigación.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
}

impl PromptConfig {
    pub fn is_empty(&self) -> bool {
        self.research.is_none() && self.outline.is_none() && self.article.is_none()
    }

    /// Aplica encima de `self` los campos presentes en `partial`.
    pub fn merge(&mut self, partial: PromptConfig) {
        if partial.research.is_some() {
            self.research = partial.research;
        }
        if partial.outline.is_some() {
            self.outline = partial.outline;
        }
        if partial.article.is_some() {
            self.article = partial.article;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfInfo {
    pub pdf_url: String,
    pub format: String,
}

/// Cuerpo de error que devuelve el backend en respuestas no-2xx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(alias = "detail", alias = "message")]
    pub error: String,
}
