//! Explicit chat application state
//!
//! All state transitions are synchronous; the controller feeds them with
//! backend responses and session events.

use serde::{Deserialize, Serialize};

use crate::conversation::{dedupe_by_title, Conversation, Turn};

use super::session::SessionId;

pub const NOTICE_SELECT_MODEL: &str = "Please select a model before sending messages.";
pub const NOTICE_UNAVAILABLE: &str = "Cannot send messages while the AI service is unavailable.";
pub const NOTICE_BUSY: &str = "Please wait for the current reply to finish.";
pub const NOTICE_DIRECTORY_FAILED: &str = "Failed to connect to the AI service. Please try again.";

/// Backend readiness classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    SingleModel,
    MultipleModels,
    NoModels,
    Error,
}

impl ModelStatus {
    /// Combine the reported status with the number of listed models
    pub fn resolve(reported: Option<ModelStatus>, model_count: usize) -> ModelStatus {
        match reported {
            Some(ModelStatus::Error) => ModelStatus::Error,
            Some(ModelStatus::SingleModel) if model_count == 0 => ModelStatus::NoModels,
            Some(status) => status,
            None => match model_count {
                0 => ModelStatus::NoModels,
                1 => ModelStatus::SingleModel,
                _ => ModelStatus::MultipleModels,
            },
        }
    }

    pub fn from_wire(status: &str) -> Option<ModelStatus> {
        match status {
            "single_model" => Some(ModelStatus::SingleModel),
            "multiple_models" => Some(ModelStatus::MultipleModels),
            "no_models" => Some(ModelStatus::NoModels),
            "error" => Some(ModelStatus::Error),
            _ => None,
        }
    }
}

/// Why a submission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Blank input; nothing is shown
    Empty,
    ModelRequired,
    Unavailable,
    Busy,
}

impl Rejection {
    pub fn notice(self) -> Option<&'static str> {
        match self {
            Rejection::Empty => None,
            Rejection::ModelRequired => Some(NOTICE_SELECT_MODEL),
            Rejection::Unavailable => Some(NOTICE_UNAVAILABLE),
            Rejection::Busy => Some(NOTICE_BUSY),
        }
    }
}

/// The session currently allowed to mutate the turn list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub id: SessionId,
    pub state: super::SessionState,
    pub model: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub turns: Vec<Turn>,
    pub conversations: Vec<Conversation>,
    pub models: Vec<String>,
    pub status: Option<ModelStatus>,
    pub selected_model: Option<String>,
    /// Nothing has been exchanged yet and no model was auto-selected
    pub first_message: bool,
    pub active: Option<ActiveSession>,
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            first_message: true,
            ..Default::default()
        }
    }

    /// Apply a model directory response.
    ///
    /// The turn list is reset to a single system notice.
    pub fn apply_models(
        &mut self,
        reported: Option<ModelStatus>,
        message: Option<String>,
        models: Vec<String>,
        welcome: &str,
    ) {
        let status = ModelStatus::resolve(reported, models.len());
        tracing::info!(?status, count = models.len(), "model directory loaded");

        if status == ModelStatus::SingleModel {
            self.selected_model = models.first().cloned();
            self.first_message = false;
        }
        self.status = Some(status);
        self.models = models;
        self.turns = vec![Turn::system(message.unwrap_or_else(|| welcome.to_string()))];
    }

    pub fn apply_models_unreachable(&mut self) {
        self.status = Some(ModelStatus::Error);
        self.turns = vec![Turn::system(NOTICE_DIRECTORY_FAILED)];
    }

    /// Gate a submission, returning the model to use
    pub fn check_submission(&self, text: &str) -> Result<String, Rejection> {
        if text.trim().is_empty() {
            return Err(Rejection::Empty);
        }
        if self.active.is_some() {
            return Err(Rejection::Busy);
        }
        match (self.status, self.selected_model.as_ref()) {
            (Some(ModelStatus::MultipleModels), None) => Err(Rejection::ModelRequired),
            (Some(ModelStatus::SingleModel | ModelStatus::MultipleModels), Some(model)) => {
                Ok(model.clone())
            }
            _ => Err(Rejection::Unavailable),
        }
    }

    pub fn push_notice(&mut self, notice: &str) {
        self.turns.push(Turn::system(notice));
    }

    pub fn select_model(&mut self, name: &str) -> bool {
        if !self.models.iter().any(|m| m == name) {
            return false;
        }
        self.selected_model = Some(name.to_string());
        true
    }

    /// Conversations for the history panel
    pub fn history(&self) -> Vec<&Conversation> {
        dedupe_by_title(&self.conversations)
    }

    /// A stored conversation, looked up without touching the turn list
    pub fn conversation(&self, id: i64) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Swap the active turn list for a stored conversation
    pub fn select_conversation(&mut self, id: i64) -> bool {
        let Some(messages) = self.conversation(id).map(|c| c.messages.clone()) else {
            return false;
        };
        self.turns = messages;
        self.first_message = false;
        true
    }

    /// Record a saved conversation, replacing any held under the same title
    pub fn record_saved(&mut self, saved: Conversation) {
        self.conversations.retain(|c| c.title != saved.title);
        self.conversations.push(saved);
    }
}
