//! Backend HTTP API
//!
//! The backend persists conversations, reports which models the local
//! runtime has installed and can close the host window. It is an external
//! collaborator; [`Backend`] is the seam the controller talks through.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::{Conversation, NewConversation};
use crate::core::ModelStatus;

pub use http::HttpBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A model installed in the local runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

/// Payload of `GET /api/models`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDirectory {
    /// Raw status string; unknown values are tolerated
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

impl ModelDirectory {
    pub fn reported_status(&self) -> Option<ModelStatus> {
        self.status.as_deref().and_then(ModelStatus::from_wire)
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// All saved conversations
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BackendError>;

    /// Persist a finished exchange; the backend assigns the id
    async fn save_conversation(
        &self,
        draft: &NewConversation,
    ) -> Result<Conversation, BackendError>;

    async fn list_models(&self) -> Result<ModelDirectory, BackendError>;

    /// Ask the host to close the chat window
    async fn exit(&self) -> Result<(), BackendError>;
}
