// Authenticated request coordinator
// Attaches bearer tokens, detects 401s, and recovers through a
// single-flight token refresh with queued replay of concurrent failures

use anyhow::{Context, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Request, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};

use super::refresh;
use super::store::CredentialStore;
use crate::error::ApiError;

/// Broadcast payload emitted when a session ends irrecoverably
///
/// The UI layer subscribes and returns the user to the login entry point;
/// the coordinator itself never navigates.
#[derive(Debug, Clone)]
pub struct SessionExpired {
    pub reason: String,
}

/// Refresh protocol state: the in-flight flag plus queued continuations
///
/// Waiters receive either the new access token or the refresh failure
/// message, in arrival order.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<std::result::Result<String, String>>>,
}

/// Issues API requests with a valid bearer token, transparently recovering
/// from expired access tokens without duplicating refresh calls or losing
/// in-flight requests. One instance per process, shared via `Arc`.
pub struct RequestCoordinator {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// API base URL without a trailing slash
    base_url: String,

    /// Persisted credential pair
    store: Arc<CredentialStore>,

    /// Single-flight refresh gate; never held across an await
    refresh: Mutex<RefreshState>,

    /// Session-expired notifications for the UI layer
    session_expired: broadcast::Sender<SessionExpired>,
}

impl RequestCoordinator {
    /// Create a new coordinator with its own connection pool
    pub fn new(
        base_url: String,
        store: Arc<CredentialStore>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let (session_expired, _) = broadcast::channel(8);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            refresh: Mutex::new(RefreshState::default()),
            session_expired,
        })
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the credential store
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Subscribe to session-expired notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionExpired> {
        self.session_expired.subscribe()
    }

    /// Absolute URL for an API path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start building a GET request against the API
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.endpoint(path))
    }

    /// Start building a POST request against the API
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.endpoint(path))
    }

    /// Execute a request with bearer attachment and 401 recovery
    ///
    /// The request is replayed at most once: a second 401 after the refresh
    /// is surfaced to the caller as a terminal `ApiError::Api`. Non-401
    /// error statuses never enter the refresh protocol.
    pub async fn execute(&self, mut request: Request) -> std::result::Result<Response, ApiError> {
        let attached = self.store.access_token();
        if let Some(ref token) = attached {
            set_bearer(&mut request, token)?;
        }

        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(method = %method, url = %url, "Sending API request");

        // Captured before dispatch so the original body is never mutated
        let replay = request.try_clone();

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("HTTP request failed: {}", e)))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return into_result(response).await;
        }

        let Some(mut replay) = replay else {
            // Streaming bodies cannot be replayed; surface the 401 as-is
            tracing::warn!(method = %method, url = %url, "401 on non-replayable request");
            return into_result(response).await;
        };

        tracing::debug!(method = %method, url = %url, "Received 401, entering refresh protocol");

        let token = self.fresh_token(attached).await?;
        set_bearer(&mut replay, &token)?;

        let response = self
            .client
            .execute(replay)
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("HTTP request failed: {}", e)))?;

        // Replay result is final, whatever the status
        into_result(response).await
    }

    /// Obtain a usable access token after a 401, refreshing at most once
    /// across all concurrent callers
    ///
    /// `stale` is the token the failed request carried. If the store already
    /// holds a different token a previous cycle completed while the 401 was
    /// in transit, so that token is taken without another refresh.
    async fn fresh_token(&self, stale: Option<String>) -> std::result::Result<String, ApiError> {
        match self.store.access_token() {
            Some(current) => {
                if stale.as_deref() != Some(current.as_str()) {
                    tracing::debug!("Access token already rotated, skipping refresh");
                    return Ok(current);
                }
            }
            // Credentials were evicted while this 401 was in transit; the
            // failed cycle already notified, so do not start another one
            None if stale.is_some() => {
                return Err(ApiError::SessionExpired("Session already ended".to_string()));
            }
            None => {}
        }

        // The decision and the flag update happen under one lock: at most
        // one refresh call can ever be in flight.
        let waiter = {
            let mut state = self.refresh.lock().await;
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        match waiter {
            Some(rx) => match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(reason)) => Err(ApiError::SessionExpired(reason)),
                Err(_) => Err(ApiError::AuthError(
                    "Refresh completed without a result".to_string(),
                )),
            },
            None => self.lead_refresh().await,
        }
    }

    /// Leader path: perform the refresh call, then wake every queued waiter
    /// in arrival order with the outcome
    async fn lead_refresh(&self) -> std::result::Result<String, ApiError> {
        let result = self.run_refresh().await;

        let waiters = {
            let mut state = self.refresh.lock().await;
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        match result {
            Ok(token) => {
                tracing::info!(
                    waiters = waiters.len(),
                    "Token refresh succeeded, resuming queued requests"
                );
                for tx in waiters {
                    let _ = tx.send(Ok(token.clone()));
                }
                Ok(token)
            }
            Err(err) => {
                let reason = format!("{:#}", err);
                tracing::error!(
                    error = %reason,
                    waiters = waiters.len(),
                    "Token refresh failed, ending session"
                );

                if let Err(e) = self.store.clear() {
                    tracing::warn!("Failed to clear stored credentials: {:#}", e);
                }
                for tx in waiters {
                    let _ = tx.send(Err(reason.clone()));
                }
                let _ = self.session_expired.send(SessionExpired {
                    reason: reason.clone(),
                });

                Err(ApiError::SessionExpired(reason))
            }
        }
    }

    /// Call the refresh endpoint and persist the new access token
    ///
    /// Persistence happens before any waiter is woken, so replays always
    /// read the fresh token from the store.
    async fn run_refresh(&self) -> Result<String> {
        let refresh_token = self
            .store
            .refresh_token()
            .context("No refresh token stored")?;

        let token =
            refresh::refresh_access_token(&self.client, &self.base_url, &refresh_token).await?;

        self.store
            .set_access_token(&token)
            .context("Failed to persist refreshed access token")?;

        Ok(token)
    }
}

/// Set the Authorization header on a request
fn set_bearer(request: &mut Request, token: &str) -> std::result::Result<(), ApiError> {
    let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ApiError::AuthError("Access token is not a valid header value".to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// Map a response to the caller's result: success passes through, any error
/// status becomes `ApiError::Api` with the response body as the message
async fn into_result(response: Response) -> std::result::Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, message = %message, "API request failed");
    Err(ApiError::Api {
        status: status.as_u16(),
        message,
    })
}
