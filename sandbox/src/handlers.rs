use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::{
    AnnouncementFeedback, ApiErrorBody, EventStatus, EventTask, ImageFeedbackRequest,
    OutlineFeedback, PdfInfo, PromptConfig, PromptOverrides, ResearchStatus, ResearchTask,
    StartEventRequest, StartResearchRequest, Task, TaskCreated, WorkflowStatus,
};
use std::cmp::Ordering;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::advance::{move_event, move_research, touch};
use crate::state::{AppState, EventRecord, ResearchRecord};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/events", post(create_event).get(list_events))
        .route("/api/v1/events/:id", get(get_event))
        .route("/api/v1/events/:id/announcement", post(announcement))
        .route("/api/v1/events/:id/images/feedback", post(image_feedback))
        .route("/api/v1/events/:id/images/accept", post(accept_images))
        .route("/api/v1/events/:id/videos", post(generate_videos))
        .route(
            "/api/v1/events/:id/prompts",
            get(get_event_prompts).put(put_event_prompts),
        )
        .route("/api/v1/research", post(create_research).get(list_research))
        .route("/api/v1/research/:id", get(get_research))
        .route("/api/v1/research/:id/outline/accept", post(accept_outline))
        .route("/api/v1/research/:id/outline/reject", post(reject_outline))
        .route(
            "/api/v1/research/:id/prompts",
            get(get_research_prompts).patch(patch_research_prompts),
        )
        .route("/api/v1/research/:id/pdf", get(research_pdf))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- errores ---------------- */

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("tarea {id} no existe"),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// La tarea existe pero no está en un status que admita la operación.
    fn conflict(op: &str, status: &impl WorkflowStatus) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: format!("{op} no se admite en status {}", status.as_str()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn newest_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn with_event<T>(
    state: &AppState,
    id: &str,
    f: impl FnOnce(&mut EventRecord) -> Result<T, ApiError>,
) -> ApiResult<T> {
    let mut events = state.events();
    let record = events.get_mut(id).ok_or_else(|| ApiError::not_found(id))?;
    f(record).map(Json)
}

fn with_research<T>(
    state: &AppState,
    id: &str,
    f: impl FnOnce(&mut ResearchRecord) -> Result<T, ApiError>,
) -> ApiResult<T> {
    let mut research = state.research();
    let record = research.get_mut(id).ok_or_else(|| ApiError::not_found(id))?;
    f(record).map(Json)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

/* --------- eventos --------- */

async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<StartEventRequest>,
) -> ApiResult<TaskCreated> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_request("el título es obligatorio"));
    }

    let task_id = uuid::Uuid::new_v4().to_string();
    let mut task: EventTask = Task::new(task_id.clone(), EventStatus::Started);
    move_event(&mut task, EventStatus::Started);
    task.created_at = task.updated_at;

    info!("evento {} creado: {}", task_id, title);
    state.events().insert(
        task_id.clone(),
        EventRecord {
            task,
            title,
            revision: None,
            regenerate: Vec::new(),
        },
    );

    Ok(Json(TaskCreated { task_id }))
}

async fn list_events(State(state): State<AppState>) -> Json<Vec<EventTask>> {
    let mut tasks: Vec<EventTask> = state.events().values().map(|r| r.task.clone()).collect();
    tasks.sort_by(|a, b| newest_first(a.created_at, b.created_at));
    Json(tasks)
}

async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<EventTask> {
    with_event(&state, &id, |record| Ok(record.task.clone()))
}

// Aprobación o pedido de revisión del anuncio
async fn announcement(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnnouncementFeedback>,
) -> ApiResult<EventTask> {
    with_event(&state, &id, |record| {
        let reviewable = match record.task.status {
            EventStatus::AnnouncementReady => true,
            EventStatus::Started => record.task.payload.announcement.is_some(),
            _ => false,
        };
        if !reviewable {
            return Err(ApiError::conflict("announcement", &record.task.status));
        }

        if req.approved {
            info!("evento {}: anuncio aprobado", id);
            move_event(&mut record.task, EventStatus::GeneratingImages);
        } else {
            let feedback = non_blank(req.feedback)
                .ok_or_else(|| ApiError::bad_request("para revisar el anuncio hace falta feedback"))?;
            info!("evento {}: revisión del anuncio pedida", id);
            record.revision = Some(feedback);
            record.task.payload.announcement = None;
            move_event(&mut record.task, EventStatus::Started);
        }
        Ok(record.task.clone())
    })
}

async fn image_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ImageFeedbackRequest>,
) -> ApiResult<EventTask> {
    with_event(&state, &id, |record| {
        if record.task.status != EventStatus::ImagesReady {
            return Err(ApiError::conflict("images/feedback", &record.task.status));
        }

        let total = record.task.payload.preview_images.len();
        if let Some(bad) = req.selected_indices.iter().find(|&&i| i >= total) {
            return Err(ApiError::bad_request(format!(
                "índice de imagen {bad} fuera de rango (hay {total})"
            )));
        }

        if req.regenerate {
            if req.selected_indices.is_empty() {
                return Err(ApiError::bad_request("no hay imágenes marcadas para regenerar"));
            }
            info!(
                "evento {}: regenerando imágenes {:?}",
                id, req.selected_indices
            );
            record.regenerate = req.selected_indices;
            move_event(&mut record.task, EventStatus::GeneratingImages);
        } else {
            info!(
                "evento {}: imágenes aceptadas con selección {:?}",
                id, req.selected_indices
            );
            move_event(&mut record.task, EventStatus::GeneratingPrompts);
        }
        Ok(record.task.clone())
    })
}

async fn accept_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EventTask> {
    with_event(&state, &id, |record| {
        if record.task.status != EventStatus::ImagesReady {
            return Err(ApiError::conflict("images/accept", &record.task.status));
        }
        info!("evento {}: imágenes aceptadas", id);
        move_event(&mut record.task, EventStatus::GeneratingPrompts);
        Ok(record.task.clone())
    })
}

async fn generate_videos(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<EventTask> {
    with_event(&state, &id, |record| {
        if record.task.status != EventStatus::PromptsGenerated {
            return Err(ApiError::conflict("videos", &record.task.status));
        }
        info!("evento {}: generando videos", id);
        move_event(&mut record.task, EventStatus::GeneratingVideos);
        Ok(record.task.clone())
    })
}

async fn get_event_prompts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PromptOverrides> {
    with_event(&state, &id, |record| {
        Ok(record.task.payload.prompt_overrides.clone().unwrap_or_default())
    })
}

async fn put_event_prompts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PromptOverrides>,
) -> ApiResult<EventTask> {
    with_event(&state, &id, |record| {
        let status = &record.task.status;
        if !status.is_known() || status.is_busy() {
            return Err(ApiError::conflict("prompts", status));
        }

        record
            .task
            .payload
            .prompt_overrides
            .get_or_insert_with(PromptOverrides::default)
            .merge(req);
        touch(&mut record.task);
        info!("evento {}: prompts de sistema actualizados", id);
        Ok(record.task.clone())
    })
}

/* --------- investigación --------- */

async fn create_research(
    State(state): State<AppState>,
    Json(req): Json<StartResearchRequest>,
) -> ApiResult<TaskCreated> {
    let topic = req.topic.trim().to_string();
    if topic.is_empty() {
        return Err(ApiError::bad_request("el tema es obligatorio"));
    }

    let task_id = uuid::Uuid::new_v4().to_string();
    let mut task: ResearchTask = Task::new(task_id.clone(), ResearchStatus::Started);
    task.payload.topic = Some(topic.clone());
    move_research(&mut task, ResearchStatus::Started);
    task.created_at = task.updated_at;

    info!("investigación {} creada: {}", task_id, topic);
    state.research().insert(
        task_id.clone(),
        ResearchRecord {
            task,
            instructions: non_blank(req.instructions),
            prompts: PromptConfig::default(),
        },
    );

    Ok(Json(TaskCreated { task_id }))
}

async fn list_research(State(state): State<AppState>) -> Json<Vec<ResearchTask>> {
    let mut tasks: Vec<ResearchTask> =
        state.research().values().map(|r| r.task.clone()).collect();
    tasks.sort_by(|a, b| newest_first(a.created_at, b.created_at));
    Json(tasks)
}

async fn get_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ResearchTask> {
    with_research(&state, &id, |record| Ok(record.task.clone()))
}

async fn accept_outline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<OutlineFeedback>,
) -> ApiResult<ResearchTask> {
    with_research(&state, &id, |record| {
        if !record.task.status.is_outline_review() {
            return Err(ApiError::conflict("outline/accept", &record.task.status));
        }
        info!("investigación {}: outline aceptado", id);
        record.task.payload.feedback = non_blank(req.feedback);
        move_research(&mut record.task, ResearchStatus::Generating);
        Ok(record.task.clone())
    })
}

// Sin feedback equivale a pedir otro outline
async fn reject_outline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<OutlineFeedback>,
) -> ApiResult<ResearchTask> {
    with_research(&state, &id, |record| {
        let status = &record.task.status;
        if !(status.is_outline_review() || *status == ResearchStatus::PromptsUpdated) {
            return Err(ApiError::conflict("outline/reject", status));
        }
        info!("investigación {}: regenerando outline", id);
        record.task.payload.feedback = non_blank(req.feedback);
        move_research(&mut record.task, ResearchStatus::RegeneratingOutline);
        Ok(record.task.clone())
    })
}

async fn get_research_prompts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PromptConfig> {
    with_research(&state, &id, |record| Ok(record.prompts.clone()))
}

// Editar prompts obliga a regenerar el outline antes de seguir
async fn patch_research_prompts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PromptConfig>,
) -> ApiResult<ResearchTask> {
    with_research(&state, &id, |record| {
        let status = &record.task.status;
        if !status.is_known() || status.is_busy() {
            return Err(ApiError::conflict("prompts", status));
        }
        if req.is_empty() {
            return Err(ApiError::bad_request("no hay prompts para actualizar"));
        }

        record.prompts.merge(req);
        info!("investigación {}: prompts actualizados", id);
        move_research(&mut record.task, ResearchStatus::PromptsUpdated);
        Ok(record.task.clone())
    })
}

async fn research_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PdfInfo> {
    with_research(&state, &id, |record| {
        if record.task.status != ResearchStatus::Completed {
            return Err(ApiError::conflict("pdf", &record.task.status));
        }
        Ok(PdfInfo {
            pdf_url: format!("https://sandbox.local/{id}/article.pdf"),
            format: "pdf".to_string(),
        })
    })
}
