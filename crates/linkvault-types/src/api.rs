use serde::{Deserialize, Serialize};

use crate::models::ContentKind;

// -- Account --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

// -- Content --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub link: String,
    pub expires_at: i64,
    pub delete_token: String,
    pub view_count: i64,
    pub max_views: Option<i64>,
}

/// Body of access and verify requests.
#[derive(Debug, Default, Deserialize)]
pub struct PasswordRequest {
    #[serde(default)]
    pub password: Option<String>,
}

/// Body of delete and stats requests.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTokenRequest {
    #[serde(default)]
    pub delete_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub text: Option<String>,
    pub original_name: Option<String>,
    pub requires_password: bool,
    /// Absent when the response is a password-gated peek.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,
    pub max_views: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub view_count: i64,
    pub max_views: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub original_name: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
    pub view_count: i64,
    pub max_views: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MyContentsResponse {
    pub items: Vec<ContentSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
