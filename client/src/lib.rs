pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod poller;
pub mod session;

pub use api::ApiClient;
pub use backend::TaskBackend;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use poller::{ControllerState, PollingController, RefreshResult};
pub use session::{EventSession, ResearchSession, TaskSession};
