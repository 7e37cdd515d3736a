pub mod actions;
pub mod api;
pub mod chip;
pub mod event;
pub mod machine;
pub mod research;
pub mod task;
pub mod workflow;

pub use actions::{Action, ActionContext, ActionSet};
pub use api::{
    AnnouncementFeedback, ApiErrorBody, ImageFeedbackRequest, OutlineFeedback, PdfInfo,
    PromptConfig, PromptOverrides, StartEventRequest, StartResearchRequest, TaskCreated,
};
pub use chip::{ChipColor, StatusChip};
pub use event::{EventPayload, EventStatus, EventTab, EventTask, EventWorkflow};
pub use machine::WorkflowStatusMachine;
pub use research::{ResearchPayload, ResearchStatus, ResearchTab, ResearchTask, ResearchWorkflow};
pub use task::{now_epoch_secs, Task, TaskId};
pub use workflow::{TabHints, TaskOf, Workflow, WorkflowStatus};
