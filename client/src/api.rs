use common::{
    AnnouncementFeedback, ApiErrorBody, EventTask, ImageFeedbackRequest, OutlineFeedback,
    PdfInfo, PromptConfig, PromptOverrides, ResearchTask, StartEventRequest,
    StartResearchRequest, TaskCreated,
};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

const EVENTS: &[&str] = &["api", "v1", "events"];
const RESEARCH: &[&str] = &["api", "v1", "research"];

/// Cliente HTTP del backend de tareas.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let base_url = Url::parse(&config.api_url).map_err(|e| {
            ClientError::Config(format!("api_url inválida {}: {e}", config.api_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "api_url no admite rutas: {}",
                config.api_url
            )));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// Arma la URL segmento por segmento; el id de la tarea va escapado.
    fn url(&self, root: &[&str], rest: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Config(format!("api_url no admite rutas: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(root)
            .extend(rest);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.http.request(method, url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, task_id: Option<&str>) -> Result<T> {
        let resp = self.request(Method::GET, url).send().await?;
        decode(resp, task_id).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
        task_id: Option<&str>,
    ) -> Result<T> {
        let resp = self.request(method, url).json(body).send().await?;
        decode(resp, task_id).await
    }

    /* ---------------- eventos ---------------- */

    pub async fn start_event(&self, req: &StartEventRequest) -> Result<TaskCreated> {
        self.send(Method::POST, self.url(EVENTS, &[])?, req, None).await
    }

    pub async fn list_events(&self) -> Result<Vec<EventTask>> {
        self.get(self.url(EVENTS, &[])?, None).await
    }

    pub async fn get_event(&self, task_id: &str) -> Result<EventTask> {
        self.get(self.url(EVENTS, &[task_id])?, Some(task_id)).await
    }

    pub async fn accept_announcement(
        &self,
        task_id: &str,
        feedback: Option<String>,
    ) -> Result<EventTask> {
        let body = AnnouncementFeedback {
            feedback,
            approved: true,
        };
        self.send(
            Method::POST,
            self.url(EVENTS, &[task_id, "announcement"])?,
            &body,
            Some(task_id),
        )
        .await
    }

    /// Pide otra versión del anuncio con el feedback dado.
    pub async fn revise_announcement(&self, task_id: &str, feedback: String) -> Result<EventTask> {
        let body = AnnouncementFeedback {
            feedback: Some(feedback),
            approved: false,
        };
        self.send(
            Method::POST,
            self.url(EVENTS, &[task_id, "announcement"])?,
            &body,
            Some(task_id),
        )
        .await
    }

    pub async fn provide_image_feedback(
        &self,
        task_id: &str,
        selected_indices: Vec<usize>,
        feedback: String,
        regenerate: bool,
    ) -> Result<EventTask> {
        let body = ImageFeedbackRequest {
            selected_indices,
            feedback,
            regenerate,
        };
        self.send(
            Method::POST,
            self.url(EVENTS, &[task_id, "images", "feedback"])?,
            &body,
            Some(task_id),
        )
        .await
    }

    pub async fn accept_images(&self, task_id: &str) -> Result<EventTask> {
        self.send(
            Method::POST,
            self.url(EVENTS, &[task_id, "images", "accept"])?,
            &serde_json::json!({}),
            Some(task_id),
        )
        .await
    }

    pub async fn generate_videos(&self, task_id: &str) -> Result<EventTask> {
        self.send(
            Method::POST,
            self.url(EVENTS, &[task_id, "videos"])?,
            &serde_json::json!({}),
            Some(task_id),
        )
        .await
    }

    pub async fn get_event_prompts(&self, task_id: &str) -> Result<PromptOverrides> {
        self.get(self.url(EVENTS, &[task_id, "prompts"])?, Some(task_id))
            .await
    }

    pub async fn update_system_prompts(
        &self,
        task_id: &str,
        overrides: &PromptOverrides,
    ) -> Result<EventTask> {
        self.send(
            Method::PUT,
            self.url(EVENTS, &[task_id, "prompts"])?,
            overrides,
            Some(task_id),
        )
        .await
    }

    /* ---------------- investigación ---------------- */

    pub async fn start_research(&self, req: &StartResearchRequest) -> Result<TaskCreated> {
        self.send(Method::POST, self.url(RESEARCH, &[])?, req, None).await
    }

    pub async fn list_research(&self) -> Result<Vec<ResearchTask>> {
        self.get(self.url(RESEARCH, &[])?, None).await
    }

    pub async fn get_research(&self, task_id: &str) -> Result<ResearchTask> {
        self.get(self.url(RESEARCH, &[task_id])?, Some(task_id))
            .await
    }

    pub async fn accept_outline(
        &self,
        task_id: &str,
        feedback: Option<String>,
    ) -> Result<ResearchTask> {
        self.send(
            Method::POST,
            self.url(RESEARCH, &[task_id, "outline", "accept"])?,
            &OutlineFeedback { feedback },
            Some(task_id),
        )
        .await
    }

    /// Sin feedback equivale a "regenerar outline".
    pub async fn reject_outline(
        &self,
        task_id: &str,
        feedback: Option<String>,
    ) -> Result<ResearchTask> {
        self.send(
            Method::POST,
            self.url(RESEARCH, &[task_id, "outline", "reject"])?,
            &OutlineFeedback { feedback },
            Some(task_id),
        )
        .await
    }

    pub async fn get_user_prompts(&self, task_id: &str) -> Result<PromptConfig> {
        self.get(self.url(RESEARCH, &[task_id, "prompts"])?, Some(task_id))
            .await
    }

    pub async fn update_prompts(
        &self,
        task_id: &str,
        partial: &PromptConfig,
    ) -> Result<ResearchTask> {
        self.send(
            Method::PATCH,
            self.url(RESEARCH, &[task_id, "prompts"])?,
            partial,
            Some(task_id),
        )
        .await
    }

    pub async fn get_research_pdf(&self, task_id: &str) -> Result<PdfInfo> {
        self.get(self.url(RESEARCH, &[task_id, "pdf"])?, Some(task_id))
            .await
    }
}

/// Convierte la respuesta en `T` o en el `ClientError` que corresponda.
async fn decode<T: DeserializeOwned>(resp: Response, task_id: Option<&str>) -> Result<T> {
    let status = resp.status();
    let bytes = resp.bytes().await?;

    if status.is_success() {
        return Ok(serde_json::from_slice(&bytes)?);
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        if let Some(id) = task_id {
            return Err(ClientError::NotFound(id.to_string()));
        }
    }

    let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
        .map(|b| b.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).trim().to_string());

    Err(ClientError::api_error(status, message))
}
