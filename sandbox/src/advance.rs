// sandbox/src/advance.rs

use crate::state::{AppState, EventRecord, ResearchRecord};
use common::{
    now_epoch_secs, EventStatus, EventTask, ResearchStatus, ResearchTask, Task, WorkflowStatus,
};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

const PREVIEW_IMAGES: usize = 3;

/// Loop de fondo: en cada tick mueve un paso las tareas que están ocupadas.
pub async fn advance_stages(state: AppState, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // el primer tick es inmediato
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let moved = advance_once(&state);
        if moved > 0 {
            debug!("{} tareas avanzaron de etapa", moved);
        }
    }
}

/// Avanza todas las tareas ocupadas una etapa. Devuelve cuántas se movieron.
pub fn advance_once(state: &AppState) -> usize {
    let mut moved = 0;

    for (id, record) in state.events().iter_mut() {
        let before = record.task.status.clone();
        if advance_event(record) {
            info!("evento {}: {} -> {}", id, before, record.task.status);
            moved += 1;
        }
    }

    for (id, record) in state.research().iter_mut() {
        let before = record.task.status.clone();
        if advance_research(record) {
            info!("investigación {}: {} -> {}", id, before, record.task.status);
            moved += 1;
        }
    }

    moved
}

fn advance_event(record: &mut EventRecord) -> bool {
    let task = &mut record.task;

    match task.status {
        EventStatus::Started => {
            let mut text = format!(
                "¡No te pierdas {}! Sumate y compartilo con quien quieras.",
                record.title
            );
            if let Some(revision) = record.revision.take() {
                text.push_str(&format!(" (revisado: {revision})"));
            }
            task.payload.announcement = Some(text);
            move_event(task, EventStatus::AnnouncementReady);
        }
        EventStatus::GeneratingImages => {
            let rev = (now_epoch_secs() * 1000.0) as u64;
            if task.payload.preview_images.is_empty() {
                task.payload.preview_images = (0..PREVIEW_IMAGES)
                    .map(|i| image_url(&task.task_id, i, 0))
                    .collect();
            } else {
                for i in std::mem::take(&mut record.regenerate) {
                    if let Some(url) = task.payload.preview_images.get_mut(i) {
                        *url = image_url(&task.task_id, i, rev);
                    }
                }
            }
            move_event(task, EventStatus::ImagesReady);
        }
        EventStatus::GeneratingPrompts => {
            task.payload.video_prompts = vec![
                format!("Paneo lento sobre el lugar de {}", record.title),
                format!("Primer plano del público llegando a {}", record.title),
            ];
            move_event(task, EventStatus::PromptsGenerated);
        }
        EventStatus::GeneratingVideos => {
            task.payload.video_urls = (0..task.payload.video_prompts.len())
                .map(|i| format!("https://sandbox.local/{}/video-{}.mp4", task.task_id, i))
                .collect();
            move_event(task, EventStatus::Completed);
        }
        _ => return false,
    }

    true
}

fn advance_research(record: &mut ResearchRecord) -> bool {
    let task = &mut record.task;
    let topic = task.payload.topic.clone().unwrap_or_default();

    match task.status {
        ResearchStatus::Started
        | ResearchStatus::Regenerating
        | ResearchStatus::RegeneratingOutline => {
            let mut outline = format!(
                "1. Qué es {topic}\n2. Estado actual\n3. Costos y limitaciones\n4. Próximos pasos"
            );
            if let Some(extra) = record.instructions.as_deref() {
                outline.push_str(&format!("\n\nIndicaciones: {extra}"));
            }
            if let Some(feedback) = task.payload.feedback.as_deref() {
                outline.push_str(&format!("\nAjustado según: {feedback}"));
            }
            if let Some(prompt) = record.prompts.outline.as_deref() {
                outline.push_str(&format!("\nPrompt de outline: {prompt}"));
            }
            task.payload.outline = Some(outline);
            move_research(task, ResearchStatus::OutlineReady);
        }
        ResearchStatus::Generating => {
            let outline = task.payload.outline.clone().unwrap_or_default();
            task.payload.article = Some(format!("# {topic}\n\n{outline}\n\n(borrador generado)"));
            move_research(task, ResearchStatus::Completed);
        }
        _ => return false,
    }

    true
}

fn image_url(task_id: &str, index: usize, rev: u64) -> String {
    format!("https://sandbox.local/{task_id}/image-{index}.png?rev={rev}")
}

pub fn event_progress(status: &EventStatus) -> f64 {
    match status {
        EventStatus::Started => 0.05,
        EventStatus::AnnouncementReady => 0.2,
        EventStatus::GeneratingImages => 0.3,
        EventStatus::ImagesReady => 0.5,
        EventStatus::GeneratingPrompts => 0.6,
        EventStatus::PromptsGenerated => 0.75,
        EventStatus::GeneratingVideos => 0.85,
        EventStatus::Completed => 1.0,
        EventStatus::Error | EventStatus::Unknown(_) => 0.0,
    }
}

pub fn research_progress(status: &ResearchStatus) -> f64 {
    match status {
        ResearchStatus::Started => 0.1,
        ResearchStatus::Regenerating | ResearchStatus::RegeneratingOutline => 0.2,
        ResearchStatus::OutlineReady
        | ResearchStatus::FeedbackNeeded
        | ResearchStatus::PromptsUpdated => 0.3,
        ResearchStatus::Generating => 0.6,
        ResearchStatus::Completed | ResearchStatus::Rejected => 1.0,
        ResearchStatus::Error | ResearchStatus::Unknown(_) => 0.0,
    }
}

pub fn move_event(task: &mut EventTask, status: EventStatus) {
    let progress = event_progress(&status);
    stamp(task, status, progress);
}

pub fn move_research(task: &mut ResearchTask, status: ResearchStatus) {
    let progress = research_progress(&status);
    stamp(task, status, progress);
}

fn stamp<S: WorkflowStatus, P>(task: &mut Task<S, P>, status: S, progress: f64) {
    task.current_step = Some(status.as_str().to_string());
    task.status = status;
    task.progress = Some(progress);
    touch(task);
}

pub fn touch<S, P>(task: &mut Task<S, P>) {
    task.updated_at = Some(now_epoch_secs());
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{EventPayload, ResearchPayload};

    fn event(status: EventStatus) -> EventRecord {
        EventRecord {
            task: Task::<EventStatus, EventPayload>::new("ev-1", status),
            title: "Feria del libro".into(),
            revision: None,
            regenerate: Vec::new(),
        }
    }

    #[test]
    fn started_pasa_a_announcement_ready_con_texto() {
        let mut record = event(EventStatus::Started);
        record.revision = Some("más corto".into());

        assert!(advance_event(&mut record));
        assert_eq!(record.task.status, EventStatus::AnnouncementReady);
        let text = record.task.payload.announcement.unwrap();
        assert!(text.contains("Feria del libro"));
        assert!(text.contains("más corto"));
        assert!(record.revision.is_none());
    }

    #[test]
    fn generating_images_llena_tres_previews() {
        let mut record = event(EventStatus::GeneratingImages);
        assert!(advance_event(&mut record));
        assert_eq!(record.task.status, EventStatus::ImagesReady);
        assert_eq!(record.task.payload.preview_images.len(), PREVIEW_IMAGES);
        assert_eq!(record.task.progress, Some(0.5));
    }

    #[test]
    fn regenerar_solo_toca_las_marcadas() {
        let mut record = event(EventStatus::GeneratingImages);
        advance_event(&mut record);
        let before = record.task.payload.preview_images.clone();

        record.regenerate = vec![1];
        move_event(&mut record.task, EventStatus::GeneratingImages);
        advance_event(&mut record);

        let after = &record.task.payload.preview_images;
        assert_eq!(after[0], before[0]);
        assert_ne!(after[1], before[1]);
        assert_eq!(after[2], before[2]);
    }

    #[test]
    fn estados_de_espera_no_avanzan() {
        for status in [
            EventStatus::AnnouncementReady,
            EventStatus::ImagesReady,
            EventStatus::PromptsGenerated,
            EventStatus::Completed,
            EventStatus::Error,
        ] {
            let mut record = event(status.clone());
            assert!(!advance_event(&mut record), "{status} no debería moverse");
        }
    }

    #[test]
    fn research_regenerating_outline_vuelve_a_outline_ready() {
        let mut task = Task::<ResearchStatus, ResearchPayload>::new(
            "rs-1",
            ResearchStatus::RegeneratingOutline,
        );
        task.payload.topic = Some("baterías de sodio".into());
        task.payload.feedback = Some("más costos".into());
        let mut record = ResearchRecord {
            task,
            instructions: None,
            prompts: Default::default(),
        };

        assert!(advance_research(&mut record));
        assert_eq!(record.task.status, ResearchStatus::OutlineReady);
        assert!(record.task.payload.outline.unwrap().contains("más costos"));
    }

    #[test]
    fn advance_once_cuenta_lo_que_movio() {
        let state = AppState::new();
        state
            .events()
            .insert("ev-1".into(), event(EventStatus::Started));
        state
            .events()
            .insert("ev-2".into(), event(EventStatus::ImagesReady));

        assert_eq!(advance_once(&state), 1);
        assert_eq!(
            state.events()["ev-1"].task.status,
            EventStatus::AnnouncementReady
        );
    }
}
