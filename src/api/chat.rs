// Q&A chat operations

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::RequestCoordinator;
use crate::error::{ApiError, Result};
use crate::models::{AskRequest, AskResponse, ChatMessage, HistoryResponse};

pub struct ChatApi {
    coordinator: Arc<RequestCoordinator>,
}

impl ChatApi {
    pub fn new(coordinator: Arc<RequestCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Submit a question and wait for the full answer
    pub async fn ask(&self, session_id: Uuid, question: &str) -> Result<AskResponse> {
        let request = self
            .coordinator
            .post("/chat/ask")
            .json(&AskRequest {
                session_id,
                question: question.to_string(),
            })
            .build()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to build ask request: {}", e)))?;

        let response = self.coordinator.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to parse answer: {}", e)))
    }

    /// Fetch the ordered message history of a chat session
    pub async fn history(&self, session_id: Uuid) -> Result<Vec<ChatMessage>> {
        let request = self
            .coordinator
            .get(&format!("/chat/history/{}", session_id))
            .build()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to build history request: {}", e)))?;

        let response = self.coordinator.execute(request).await?;
        let body: HistoryResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to parse history: {}", e)))?;

        Ok(body.messages)
    }
}
