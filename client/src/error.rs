use common::Action;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Falla de transporte (conexión, timeout, TLS...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// El backend respondió con un status no-2xx
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("task {0} not found")]
    NotFound(String),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// La acción está deshabilitada para el status actual; no se envió nada
    #[error("action `{action}` is not available while task is `{status}`")]
    ActionBlocked { action: Action, status: String },

    /// Datos locales incompletos (ej: prompts vacíos); no se envió nada
    #[error("invalid input: {0}")]
    Validation(String),

    /// El refresh en segundo plano terminó sin resultado (panic o abort)
    #[error("background refresh failed: {0}")]
    Join(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Errores transitorios: el próximo tick de polling puede resolverlos.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) | ClientError::Join(_) => true,
            ClientError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        ClientError::Api {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    pub fn blocked(action: Action, status: impl Into<String>) -> Self {
        ClientError::ActionBlocked {
            action,
            status: status.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
