// Token refresh logic
// Wire-level exchange of a refresh token for a new access token

use anyhow::{Context, Result};
use reqwest::Client;

use super::types::{RefreshRequest, RefreshResponse};

/// Exchange the refresh token for a new access token
///
/// Any failure here (error status, network failure, malformed body) is
/// terminal for the session; the coordinator evicts credentials on it.
pub async fn refresh_access_token(
    client: &Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<String> {
    tracing::debug!("Refreshing access token...");

    let url = format!("{}/auth/refresh_token", base_url);
    let request = RefreshRequest {
        refresh_token: refresh_token.to_string(),
    };

    let response = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .context("Failed to send refresh request")?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Refresh request failed: {} - {}", status, error_text);
    }

    let data: RefreshResponse = response
        .json()
        .await
        .context("Failed to parse refresh response")?;

    if data.token.is_empty() {
        anyhow::bail!("Refresh response does not contain a token");
    }

    tracing::info!("Access token refreshed");

    Ok(data.token)
}
