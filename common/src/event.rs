//! Workflow de eventos: anuncio -> imágenes -> prompts de video -> videos.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actions::{ActionContext, ActionSet};
use crate::api::PromptOverrides;
use crate::chip::{self, ChipColor, ChipRow, StatusChip};
use crate::task::Task;
use crate::workflow::{TabHints, TaskOf, Workflow, WorkflowStatus};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventStatus {
    Started,
    AnnouncementReady,
    GeneratingImages,
    ImagesReady,
    GeneratingPrompts,
    PromptsGenerated,
    GeneratingVideos,
    Completed,
    Error,
    /// Status que todavía no conocemos; se guarda el string crudo.
    Unknown(String),
}

const EVENT_CHIPS: &[ChipRow] = &[
    ("started", "Started", ChipColor::Info),
    ("announcement_ready", "Announcement Ready", ChipColor::Warning),
    ("generating_images", "Generating Images", ChipColor::Progress),
    ("images_ready", "Images Ready", ChipColor::Warning),
    ("generating_prompts", "Generating Prompts", ChipColor::Progress),
    ("prompts_generated", "Prompts Generated", ChipColor::Warning),
    ("generating_videos", "Generating Videos", ChipColor::Progress),
    ("completed", "Completed", ChipColor::Success),
    ("error", "Error", ChipColor::Danger),
];

impl EventStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "started" => EventStatus::Started,
            "announcement_ready" => EventStatus::AnnouncementReady,
            "generating_images" => EventStatus::GeneratingImages,
            "images_ready" => EventStatus::ImagesReady,
            "generating_prompts" => EventStatus::GeneratingPrompts,
            "prompts_generated" => EventStatus::PromptsGenerated,
            "generating_videos" => EventStatus::GeneratingVideos,
            "completed" => EventStatus::Completed,
            "error" => EventStatus::Error,
            other => EventStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_image_stage(&self) -> bool {
        matches!(self, EventStatus::GeneratingImages | EventStatus::ImagesReady)
    }

    pub fn is_video_stage(&self) -> bool {
        matches!(
            self,
            EventStatus::GeneratingPrompts
                | EventStatus::PromptsGenerated
                | EventStatus::GeneratingVideos
        )
    }
}

impl From<String> for EventStatus {
    fn from(raw: String) -> Self {
        match EventStatus::parse(&raw) {
            EventStatus::Unknown(_) => EventStatus::Unknown(raw),
            known => known,
        }
    }
}

impl From<EventStatus> for String {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WorkflowStatus for EventStatus {
    fn as_str(&self) -> &str {
        match self {
            EventStatus::Started => "started",
            EventStatus::AnnouncementReady => "announcement_ready",
            EventStatus::GeneratingImages => "generating_images",
            EventStatus::ImagesReady => "images_ready",
            EventStatus::GeneratingPrompts => "generating_prompts",
            EventStatus::PromptsGenerated => "prompts_generated",
            EventStatus::GeneratingVideos => "generating_videos",
            EventStatus::Completed => "completed",
            EventStatus::Error => "error",
            EventStatus::Unknown(raw) => raw,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Error)
    }

    fn is_busy(&self) -> bool {
        matches!(
            self,
            EventStatus::Started
                | EventStatus::GeneratingImages
                | EventStatus::GeneratingPrompts
                | EventStatus::GeneratingVideos
        )
    }

    fn is_known(&self) -> bool {
        !matches!(self, EventStatus::Unknown(_))
    }

    fn chip(&self) -> StatusChip {
        chip::lookup(EVENT_CHIPS, self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTab {
    Announcement,
    Images,
    Video,
}

impl fmt::Display for EventTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventTab::Announcement => "announcement",
            EventTab::Images => "images",
            EventTab::Video => "video",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement: Option<String>,
    #[serde(default)]
    pub preview_images: Vec<String>,
    #[serde(default)]
    pub video_prompts: Vec<String>,
    #[serde(default)]
    pub video_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_overrides: Option<PromptOverrides>,
}

pub type EventTask = Task<EventStatus, EventPayload>;

/// Selección automática de pestaña; la primera regla que matchea gana.
pub fn select_tab(status: &EventStatus, hints: TabHints) -> EventTab {
    if status.is_video_stage() || hints.has_video_prompts {
        EventTab::Video
    } else if status.is_image_stage() || hints.has_images {
        EventTab::Images
    } else {
        EventTab::Announcement
    }
}

pub struct EventWorkflow;

impl Workflow for EventWorkflow {
    type Status = EventStatus;
    type Payload = EventPayload;
    type Tab = EventTab;

    const KIND: &'static str = "event";
    const DEFAULT_TAB: EventTab = EventTab::Announcement;

    fn hints(task: &TaskOf<Self>) -> TabHints {
        TabHints {
            has_images: !task.payload.preview_images.is_empty() || task.status.is_image_stage(),
            has_video_prompts: !task.payload.video_prompts.is_empty(),
        }
    }

    fn select_tab(status: &EventStatus, hints: TabHints) -> EventTab {
        select_tab(status, hints)
    }

    fn actions(task: &EventTask, ctx: &ActionContext) -> ActionSet {
        let edit_prompts = task.status.is_known() && !task.status.is_busy();

        match task.status {
            EventStatus::Started if task.payload.announcement.is_none() => ActionSet::none(),
            EventStatus::Started | EventStatus::AnnouncementReady => ActionSet {
                accept: true,
                // revisar el anuncio exige texto de feedback
                reject: ctx.has_feedback(),
                edit_prompts,
                ..ActionSet::none()
            },
            EventStatus::ImagesReady => ActionSet {
                accept: true,
                reject: ctx.has_selection(),
                regenerate: ctx.has_selection(),
                edit_prompts,
                ..ActionSet::none()
            },
            EventStatus::PromptsGenerated => ActionSet {
                generate_next: true,
                edit_prompts,
                ..ActionSet::none()
            },
            _ => ActionSet {
                edit_prompts,
                ..ActionSet::none()
            },
        }
    }
}
