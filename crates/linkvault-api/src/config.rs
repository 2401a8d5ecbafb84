use std::collections::HashSet;
use std::time::Duration;

/// Media types accepted for file uploads.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "text/csv",
    "application/pdf",
    "application/json",
    "application/zip",
    "application/x-zip-compressed",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "audio/mpeg",
    "audio/wav",
    "video/mp4",
    "video/webm",
];

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Knobs the content engine and identity gate consult at runtime.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Base URL of the viewer; links are `{public_url}/view/{id}`.
    pub public_url: String,
    pub max_file_bytes: u64,
    pub default_expiry_minutes: i64,
    /// Longer requested lifetimes are clamped to this.
    pub max_expiry_minutes: i64,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub allowed_mime_types: HashSet<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:5173".into(),
            max_file_bytes: 10 * 1024 * 1024,
            default_expiry_minutes: 10,
            max_expiry_minutes: 30 * 24 * 60,
            session_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl VaultConfig {
    pub fn max_file_mb(&self) -> u64 {
        self.max_file_bytes / (1024 * 1024)
    }

    pub fn is_allowed_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types.contains(mime)
    }

    pub fn view_link(&self, id: &str) -> String {
        format!("{}/view/{}", self.public_url.trim_end_matches('/'), id)
    }
}
