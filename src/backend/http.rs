//! HTTP implementation of the backend API

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::conversation::{Conversation, NewConversation};

use super::{Backend, BackendError, ModelDirectory};

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::InvalidResponse(format!(
                "{}: {}",
                status, body
            )));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BackendError> {
        let response = self
            .client
            .get(self.url("/api/conversations"))
            .send()
            .await?;
        Self::json(response).await
    }

    async fn save_conversation(
        &self,
        draft: &NewConversation,
    ) -> Result<Conversation, BackendError> {
        let response = self
            .client
            .post(self.url("/api/conversations"))
            .json(draft)
            .send()
            .await?;
        Self::json(response).await
    }

    async fn list_models(&self) -> Result<ModelDirectory, BackendError> {
        let response = self.client.get(self.url("/api/models")).send().await?;
        Self::json(response).await
    }

    async fn exit(&self) -> Result<(), BackendError> {
        let response = self.client.post(self.url("/api/exit")).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
