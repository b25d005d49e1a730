// Authentication types

use serde::{Deserialize, Serialize};

/// Complete credential pair persisted after a successful login or refresh
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub user_email: String,
}

/// Authenticated user identity
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
}

/// Refresh request body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh response body
#[derive(Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}

/// Login request body
#[derive(Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response body
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: UserInfo,
}
