/// Database row types. These map directly to SQLite rows and stay
/// independent of the linkvault-types wire structs.
use linkvault_types::models::ContentKind;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

/// A session joined with its owning user.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub user_id: String,
    pub email: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct ContentRow {
    pub id: String,
    pub kind: ContentKind,
    pub text_content: Option<String>,
    pub original_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_mime: Option<String>,
    pub password_hash: Option<String>,
    pub one_time: bool,
    pub view_count: i64,
    pub max_views: Option<i64>,
    pub created_at: i64,
    pub expires_at: i64,
    pub owner_id: Option<String>,
    pub delete_token_hash: String,
}

impl ContentRow {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    pub fn views_exhausted(&self) -> bool {
        matches!(self.max_views, Some(max) if self.view_count >= max)
    }
}

/// Everything needed to insert a new content row.
#[derive(Debug, Clone)]
pub struct NewContentRow {
    pub id: String,
    pub kind: ContentKind,
    pub text_content: Option<String>,
    pub original_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_mime: Option<String>,
    pub password_hash: Option<String>,
    pub one_time: bool,
    pub max_views: Option<i64>,
    pub created_at: i64,
    pub expires_at: i64,
    pub owner_id: Option<String>,
    pub delete_token_hash: String,
}

/// View counters as they stand after a successful increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewCounters {
    pub view_count: i64,
    pub max_views: Option<i64>,
}
