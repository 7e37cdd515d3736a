//! Workflow de investigación: outline -> revisión humana -> artículo.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::actions::{ActionContext, ActionSet};
use crate::chip::{self, ChipColor, ChipRow, StatusChip};
use crate::task::Task;
use crate::workflow::{TabHints, TaskOf, Workflow, WorkflowStatus};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResearchStatus {
    Started,
    OutlineReady,
    FeedbackNeeded,
    Generating,
    Completed,
    Rejected,
    Error,
    Regenerating,
    RegeneratingOutline,
    /// El usuario editó los prompts; hay que regenerar el outline antes de
    /// que el pipeline pueda seguir.
    PromptsUpdated,
    Unknown(String),
}

const RESEARCH_CHIPS: &[ChipRow] = &[
    ("started", "Started", ChipColor::Info),
    ("outline_ready", "Outline Ready", ChipColor::Warning),
    ("feedback_needed", "Feedback Needed", ChipColor::Warning),
    ("generating", "Generating Article", ChipColor::Progress),
    ("completed", "Completed", ChipColor::Success),
    ("rejected", "Rejected", ChipColor::Neutral),
    ("error", "Error", ChipColor::Danger),
    ("regenerating", "Regenerating", ChipColor::Progress),
    ("regenerating_outline", "Regenerating Outline", ChipColor::Progress),
    ("prompts_updated", "Prompts Updated", ChipColor::Warning),
];

impl ResearchStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "started" => ResearchStatus::Started,
            "outline_ready" => ResearchStatus::OutlineReady,
            "feedback_needed" => ResearchStatus::FeedbackNeeded,
            "generating" => ResearchStatus::Generating,
            "completed" => ResearchStatus::Completed,
            "rejected" => ResearchStatus::Rejected,
            "error" => ResearchStatus::Error,
            "regenerating" => ResearchStatus::Regenerating,
            "regenerating_outline" => ResearchStatus::RegeneratingOutline,
            "prompts_updated" => ResearchStatus::PromptsUpdated,
            other => ResearchStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_outline_review(&self) -> bool {
        matches!(self, ResearchStatus::OutlineReady | ResearchStatus::FeedbackNeeded)
    }
}

impl From<String> for ResearchStatus {
    fn from(raw: String) -> Self {
        match ResearchStatus::parse(&raw) {
            ResearchStatus::Unknown(_) => ResearchStatus::Unknown(raw),
            known => known,
        }
    }
}

impl From<ResearchStatus> for String {
    fn from(status: ResearchStatus) -> Self {
        match status {
            ResearchStatus::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WorkflowStatus for ResearchStatus {
    fn as_str(&self) -> &str {
        match self {
            ResearchStatus::Started => "started",
            ResearchStatus::OutlineReady => "outline_ready",
            ResearchStatus::FeedbackNeeded => "feedback_needed",
            ResearchStatus::Generating => "generating",
            ResearchStatus::Completed => "completed",
            ResearchStatus::Rejected => "rejected",
            ResearchStatus::Error => "error",
            ResearchStatus::Regenerating => "regenerating",
            ResearchStatus::RegeneratingOutline => "regenerating_outline",
            ResearchStatus::PromptsUpdated => "prompts_updated",
            ResearchStatus::Unknown(raw) => raw,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResearchStatus::Completed | ResearchStatus::Rejected | ResearchStatus::Error
        )
    }

    fn is_busy(&self) -> bool {
        matches!(
            self,
            ResearchStatus::Started
                | ResearchStatus::Generating
                | ResearchStatus::Regenerating
                | ResearchStatus::RegeneratingOutline
        )
    }

    fn is_known(&self) -> bool {
        !matches!(self, ResearchStatus::Unknown(_))
    }

    fn chip(&self) -> StatusChip {
        chip::lookup(RESEARCH_CHIPS, self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResearchTab {
    Article,
    Outline,
    /// Sólo se abre a mano, nunca automáticamente.
    Prompts,
}

impl fmt::Display for ResearchTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResearchTab::Article => "article",
            ResearchTab::Outline => "outline",
            ResearchTab::Prompts => "prompts",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    /// Último feedback que el backend registró sobre el outline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

pub type ResearchTask = Task<ResearchStatus, ResearchPayload>;

pub fn select_tab(status: &ResearchStatus) -> ResearchTab {
    if status.is_outline_review() {
        ResearchTab::Outline
    } else {
        ResearchTab::Article
    }
}

pub struct ResearchWorkflow;

impl Workflow for ResearchWorkflow {
    type Status = ResearchStatus;
    type Payload = ResearchPayload;
    type Tab = ResearchTab;

    const KIND: &'static str = "research";
    const DEFAULT_TAB: ResearchTab = ResearchTab::Article;

    fn hints(_task: &TaskOf<Self>) -> TabHints {
        TabHints::default()
    }

    fn select_tab(status: &ResearchStatus, _hints: TabHints) -> ResearchTab {
        select_tab(status)
    }

    fn actions(task: &ResearchTask, ctx: &ActionContext) -> ActionSet {
        let edit_prompts = task.status.is_known() && !task.status.is_busy();

        match task.status {
            ResearchStatus::OutlineReady | ResearchStatus::FeedbackNeeded => ActionSet {
                accept: true,
                // rechazar con feedback; sin feedback es "regenerar outline"
                reject: ctx.has_feedback(),
                regenerate: true,
                edit_prompts,
                ..ActionSet::none()
            },
            ResearchStatus::PromptsUpdated => ActionSet {
                generate_next: true,
                next_stage_required: true,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::chip::UNKNOWN_CHIP;
    use serde_json::json;

    const ALL: [&str; 10] = [
        "started",
        "outline_ready",
        "feedback_needed",
        "generating",
        "completed",
        "rejected",
        "error",
        "regenerating",
        "regenerating_outline",
        "prompts_updated",
    ];

    fn task(status: &str) -> ResearchTask {
        Task::new("rs-1", ResearchStatus::parse(status))
    }

    #[test]
    fn outline_si_y_solo_si_revision_de_outline() {
        for raw in ALL {
            let status = ResearchStatus::parse(raw);
            let tab = select_tab(&status);
            let expect_outline = raw == "outline_ready" || raw == "feedback_needed";
            assert_eq!(tab == ResearchTab::Outline, expect_outline, "{raw}");
            assert_ne!(tab, ResearchTab::Prompts, "prompts nunca es automática");
        }
    }

    #[test]
    fn desconocido_cae_en_article_y_chip_generico() {
        let status: ResearchStatus =
            serde_json::from_value(json!("unknown_future_status")).unwrap();
        assert!(!status.is_known());
        assert_eq!(select_tab(&status), ResearchTab::Article);
        assert_eq!(status.chip(), UNKNOWN_CHIP);
        assert_eq!(
            ResearchWorkflow::actions(&task("unknown_future_status"), &ActionContext::default()),
            ActionSet::none()
        );
    }

    #[test]
    fn chips_conocidos_no_son_genericos() {
        for raw in ALL {
            assert_ne!(ResearchStatus::parse(raw).chip(), UNKNOWN_CHIP, "{raw}");
        }
        assert_eq!(ResearchStatus::Rejected.chip().label, "Rejected");
    }

    #[test]
    fn revision_de_outline_habilita_accept_y_regenerate() {
        let set = ResearchWorkflow::actions(&task("outline_ready"), &ActionContext::default());
        assert!(set.accept);
        assert!(set.regenerate);
        assert!(!set.reject, "rechazar exige feedback");

        let ctx = ActionContext {
            feedback: Some("falta una sección de costos".into()),
            ..Default::default()
        };
        let set = ResearchWorkflow::actions(&task("feedback_needed"), &ctx);
        assert!(set.permits(Action::Reject));
        assert!(!set.generate_next);
    }

    #[test]
    fn prompts_updated_exige_regenerar_outline() {
        let ctx = ActionContext {
            feedback: Some("x".into()),
            ..Default::default()
        };
        let set = ResearchWorkflow::actions(&task("prompts_updated"), &ctx);
        assert!(set.generate_next);
        assert!(set.next_stage_required);
        assert!(!set.accept);
        assert!(!set.reject);
        assert!(!set.regenerate);
    }

    #[test]
    fn completed_permite_editar_prompts_y_nada_mas() {
        let set = ResearchWorkflow::actions(&task("completed"), &ActionContext::default());
        assert_eq!(set.enabled(), vec![Action::EditPrompts]);

        let set = ResearchWorkflow::actions(&task("generating"), &ActionContext::default());
        assert!(set.enabled().is_empty());
    }

    #[test]
    fn terminales() {
        for raw in ["completed", "rejected", "error"] {
            assert!(ResearchStatus::parse(raw).is_terminal(), "{raw}");
        }
        for raw in ["prompts_updated", "outline_ready", "regenerating_outline"] {
            assert!(!ResearchStatus::parse(raw).is_terminal(), "{raw}");
        }
    }
}
