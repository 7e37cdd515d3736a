use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = String;

/// Copia local de una tarea del backend.
///
/// El backend es el dueño del registro; el cliente sólo lo reemplaza entero
/// en cada refresh. Los campos propios de cada workflow viven en `payload`
/// y se serializan aplanados en el mismo objeto JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task<S, P> {
    pub task_id: TaskId,
    pub status: S,

    /// Avance orientativo en [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// Sólo viene cuando status == "error"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Segundos desde epoch, tal como los manda el backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<f64>,

    #[serde(flatten)]
    pub payload: P,
}

impl<S, P: Default> Task<S, P> {
    pub fn new(task_id: impl Into<TaskId>, status: S) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            progress: None,
            current_step: None,
            error: None,
            created_at: None,
            updated_at: None,
            payload: P::default(),
        }
    }
}

impl<S, P> Task<S, P> {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at.and_then(epoch_to_utc)
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        self.updated_at.and_then(epoch_to_utc)
    }

    /// Progreso en porcentaje, recortado a [0, 100].
    pub fn progress_pct(&self) -> Option<f64> {
        self.progress.map(|p| (p.clamp(0.0, 1.0) * 100.0))
    }

    /// true si `other` es más viejo que esta copia según `updated_at`.
    /// Sin timestamps en alguno de los dos lados no se puede decidir y se
    /// considera que no es más viejo.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        match (self.updated_at, other.updated_at) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => false,
        }
    }
}

/// Timestamp actual en segundos desde epoch (con fracción de milisegundos).
pub fn now_epoch_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    let millis = (secs * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}
