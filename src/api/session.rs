// Account session operations: login and logout

use std::sync::Arc;

use crate::auth::{LoginRequest, LoginResponse, RequestCoordinator, Session, UserInfo};
use crate::error::{ApiError, Result};

pub struct SessionApi {
    coordinator: Arc<RequestCoordinator>,
}

impl SessionApi {
    pub fn new(coordinator: Arc<RequestCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Authenticate and persist the full credential pair
    ///
    /// Login bypasses `execute`: a 401 here means bad credentials, not an
    /// expired token, and must not enter the refresh protocol.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserInfo> {
        let response = self
            .coordinator
            .client()
            .post(self.coordinator.endpoint("/auth/login"))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Login request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::AuthError("Invalid email or password".to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to parse login response: {}", e)))?;

        self.coordinator.store().store_session(&Session {
            access_token: body.token,
            refresh_token: body.refresh_token,
            user_id: body.user.id.clone(),
            user_email: body.user.email.clone(),
        })?;

        tracing::info!(user = %body.user.email, "Logged in");
        Ok(body.user)
    }

    /// End the session and evict stored credentials
    ///
    /// The server-side revoke is best effort; local credentials are cleared
    /// even when it fails.
    pub async fn logout(&self) -> Result<()> {
        if self.coordinator.store().has_credentials() {
            let request = self
                .coordinator
                .post("/auth/logout")
                .build()
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to build logout request: {}", e)))?;

            if let Err(e) = self.coordinator.execute(request).await {
                tracing::debug!("Server-side logout failed: {}", e);
            }
        }

        self.coordinator.store().clear()?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Identity of the stored session, if any
    pub fn current_user(&self) -> Option<UserInfo> {
        self.coordinator.store().current_user()
    }
}
