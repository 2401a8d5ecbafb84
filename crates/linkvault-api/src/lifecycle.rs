//! Content lifecycle: creation, gated access, downloads, authorized
//! deletion and the purge routine shared with the sweeper.

use std::sync::Arc;

use bytes::Bytes;
use linkvault_db::Database;
use linkvault_db::models::{ContentRow, NewContentRow, ViewCounters};
use linkvault_types::api::{AccessResponse, ContentSummary, StatsResponse};
use linkvault_types::models::{AuthUser, ContentKind};
use tracing::{info, warn};
use uuid::Uuid;

use crate::blocking::run_blocking;
use crate::config::VaultConfig;
use crate::error::{ApiError, ApiResult};
use crate::now_millis;
use crate::secrets;
use crate::storage::Storage;

const MILLIS_PER_MINUTE: i64 = 60 * 1000;

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub media_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    File(FileUpload),
}

/// A validated submission. Optional knobs that were absent or unusable on
/// the wire arrive here as `None`.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub payload: Payload,
    pub password: Option<String>,
    pub one_time: bool,
    pub max_views: Option<i64>,
    pub expiry_minutes: Option<i64>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedContent {
    pub id: String,
    /// Returned exactly once; only its digest is stored.
    pub delete_token: String,
    pub expires_at: i64,
    pub max_views: Option<i64>,
}

/// What the download route needs once access has been granted.
#[derive(Debug, Clone)]
pub struct DownloadTicket {
    pub id: String,
    pub filename: String,
    pub media_type: String,
    pub size: u64,
    pub one_time: bool,
}

pub struct FileDownload {
    pub file: tokio::fs::File,
    pub ticket: DownloadTicket,
}

pub struct ContentEngine {
    db: Arc<Database>,
    storage: Arc<Storage>,
    config: VaultConfig,
}

impl ContentEngine {
    pub fn new(db: Arc<Database>, storage: Arc<Storage>, config: VaultConfig) -> Self {
        Self { db, storage, config }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub async fn create(&self, new: NewContent) -> ApiResult<CreatedContent> {
        let id = Uuid::new_v4().to_string();
        let delete_token = secrets::generate_token();
        let created_at = now_millis();
        let expiry_minutes = new
            .expiry_minutes
            .filter(|m| *m > 0)
            .unwrap_or(self.config.default_expiry_minutes)
            .min(self.config.max_expiry_minutes);
        let expires_at = expiry_minutes
            .checked_mul(MILLIS_PER_MINUTE)
            .and_then(|ms| created_at.checked_add(ms))
            .ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!(
                    "Expiry of {} minutes is out of range",
                    expiry_minutes
                ))
            })?;
        let max_views = new.max_views.filter(|m| *m > 0);
        let password_hash = match new.password {
            Some(p) if !p.is_empty() => {
                Some(run_blocking(move || Ok(secrets::hash_password(&p)?)).await?)
            }
            _ => None,
        };

        let mut row = NewContentRow {
            id: id.clone(),
            kind: ContentKind::Text,
            text_content: None,
            original_name: None,
            file_size: None,
            file_mime: None,
            password_hash,
            one_time: new.one_time,
            max_views,
            created_at,
            expires_at,
            owner_id: new.owner_id,
            delete_token_hash: secrets::hash_token(&delete_token),
        };

        match new.payload {
            Payload::Text(text) => {
                if text.is_empty() {
                    return Err(ApiError::MissingPayload);
                }
                row.text_content = Some(text);
            }
            Payload::File(upload) => {
                if !self.config.is_allowed_mime(&upload.media_type) {
                    return Err(ApiError::InvalidFileType);
                }
                if upload.data.len() as u64 > self.config.max_file_bytes {
                    return Err(ApiError::FileTooLarge {
                        max_mb: self.config.max_file_mb(),
                    });
                }

                row.kind = ContentKind::File;
                row.original_name = Some(upload.name);
                row.file_size = Some(upload.data.len() as i64);
                row.file_mime = Some(upload.media_type);

                self.storage.write_file(&id, &upload.data).await?;
            }
        }

        let kind = row.kind;
        let one_time = row.one_time;
        if let Err(e) = self.query(move |db| db.insert_content(&row)).await {
            if kind == ContentKind::File {
                if let Err(cleanup) = self.storage.delete_file(&id).await {
                    warn!("Failed to remove orphaned payload {}: {}", id, cleanup);
                }
            }
            return Err(e);
        }

        info!(
            "Created {} content {} (expires in {} min, max views {:?}, one-time {})",
            kind, id, expiry_minutes, max_views, one_time
        );

        Ok(CreatedContent {
            id,
            delete_token,
            expires_at,
            max_views,
        })
    }

    /// Consume one view of a content record.
    ///
    /// Checks run in a fixed order: existence, expiry (expired records are
    /// purged), password, view limit. The view is then claimed with a single
    /// conditional statement so concurrent callers cannot overshoot the
    /// limit. One-time text is claimed by deleting its row, so exactly one
    /// reader gets it; one-time files are only consumed by a completed
    /// download.
    pub async fn access(&self, id: &str, password: Option<&str>) -> ApiResult<AccessResponse> {
        let row = self.load_live(id).await?;

        if !password_matches(&row, password).await? {
            return Err(ApiError::InvalidPassword);
        }
        if row.views_exhausted() {
            return Err(ApiError::ExpiredOrInvalid);
        }

        let consume = row.one_time && row.kind == ContentKind::Text;
        let row_id = row.id.clone();
        let claimed: Option<ViewCounters> = if consume {
            self.query(move |db| db.consume_one_time_text(&row_id)).await?
        } else {
            self.query(move |db| db.try_record_view(&row_id)).await?
        };
        let counters = claimed.ok_or(ApiError::ExpiredOrInvalid)?;

        if consume {
            info!("One-time content {} consumed", row.id);
        }

        Ok(AccessResponse {
            kind: row.kind,
            text: row.text_content,
            original_name: row.original_name,
            requires_password: row.password_hash.is_some(),
            view_count: Some(counters.view_count),
            max_views: counters.max_views,
        })
    }

    /// Like [`access`](Self::access) without a password, except that
    /// password-protected content only reports that a password is needed
    /// and no view is consumed.
    pub async fn peek(&self, id: &str) -> ApiResult<AccessResponse> {
        let row = self.load_live(id).await?;

        if row.password_hash.is_some() {
            return Ok(AccessResponse {
                kind: row.kind,
                text: None,
                original_name: row.original_name,
                requires_password: true,
                view_count: None,
                max_views: None,
            });
        }

        self.access(id, None).await
    }

    /// Read-only password check: never touches the view counter, never
    /// purges, never consumes one-time content.
    pub async fn verify_password(&self, id: &str, password: Option<&str>) -> ApiResult<bool> {
        match self.fetch(id).await? {
            Some(row) if !row.is_expired(now_millis()) => password_matches(&row, password).await,
            _ => Ok(false),
        }
    }

    pub async fn open_download(
        &self,
        id: &str,
        password: Option<&str>,
    ) -> ApiResult<FileDownload> {
        let row = self.load_live(id).await?;

        if !password_matches(&row, password).await? {
            return Err(ApiError::InvalidPassword);
        }
        if row.kind != ContentKind::File {
            return Err(ApiError::NotAFile);
        }

        let file = match self.storage.open(&row.id).await {
            Ok(file) => file,
            Err(e) if is_not_found(&e) => {
                warn!("Payload for content {} missing on disk", row.id);
                return Err(ApiError::ExpiredOrInvalid);
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await.map_err(anyhow::Error::from)?.len();

        Ok(FileDownload {
            file,
            ticket: DownloadTicket {
                id: row.id,
                filename: row.original_name.unwrap_or_else(|| "download".to_string()),
                media_type: row
                    .file_mime
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                size,
                one_time: row.one_time,
            },
        })
    }

    /// Called once the whole payload has been streamed out.
    pub async fn complete_download(&self, ticket: &DownloadTicket) -> ApiResult<()> {
        if !ticket.one_time {
            return Ok(());
        }
        if let Some(row) = self.fetch(&ticket.id).await? {
            self.purge(&row).await?;
            info!("One-time file {} consumed by download", ticket.id);
        }
        Ok(())
    }

    /// Delete on behalf of the owner or any holder of the delete token.
    ///
    /// An id that no longer exists is reported as forbidden, same as a
    /// wrong token.
    pub async fn delete(
        &self,
        id: &str,
        requester: Option<&AuthUser>,
        delete_token: Option<&str>,
    ) -> ApiResult<()> {
        let row = self.authorize(id, requester, delete_token).await?;
        self.purge(&row).await?;
        info!("Content {} deleted on request", row.id);
        Ok(())
    }

    pub async fn stats(
        &self,
        id: &str,
        requester: Option<&AuthUser>,
        delete_token: Option<&str>,
    ) -> ApiResult<StatsResponse> {
        let row = self.authorize(id, requester, delete_token).await?;
        if row.is_expired(now_millis()) {
            self.purge(&row).await?;
            return Err(ApiError::Forbidden);
        }
        Ok(StatsResponse {
            view_count: row.view_count,
            max_views: row.max_views,
        })
    }

    /// Unexpired content owned by `user`, newest first.
    pub async fn list_owned(&self, user: &AuthUser) -> ApiResult<Vec<ContentSummary>> {
        let owner_id = user.id.clone();
        let rows = self
            .query(move |db| db.list_contents_by_owner(&owner_id))
            .await?;

        let now = now_millis();
        let items = rows
            .into_iter()
            .filter(|row| !row.is_expired(now))
            .map(|row| ContentSummary {
                id: row.id,
                kind: row.kind,
                original_name: row.original_name,
                created_at: row.created_at,
                expires_at: row.expires_at,
                view_count: row.view_count,
                max_views: row.max_views,
            })
            .collect();
        Ok(items)
    }

    /// Remove a record: payload file first, then the row. If the file
    /// cannot be removed the row stays so a later sweep retries.
    pub async fn purge(&self, row: &ContentRow) -> ApiResult<()> {
        if row.kind == ContentKind::File {
            self.storage.delete_file(&row.id).await?;
        }
        let id = row.id.clone();
        self.query(move |db| db.delete_content(&id)).await?;
        Ok(())
    }

    /// Purge every record whose expiry lies before `now`. Individual
    /// failures are logged and skipped. Returns how many were removed.
    pub async fn purge_expired(&self, now: i64) -> ApiResult<usize> {
        let expired = self.query(move |db| db.list_expired_contents(now)).await?;
        let mut purged = 0;
        for row in &expired {
            match self.purge(row).await {
                Ok(()) => purged += 1,
                Err(e) => warn!("Failed to purge expired content {}: {}", row.id, e),
            }
        }
        Ok(purged)
    }

    /// Run a database call on the blocking pool.
    async fn query<F, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        run_blocking(move || f(&db).map_err(ApiError::from)).await
    }

    async fn fetch(&self, id: &str) -> ApiResult<Option<ContentRow>> {
        let id = id.to_string();
        self.query(move |db| db.get_content(&id)).await
    }

    /// Fetch a record that is still alive, purging it if it has expired.
    async fn load_live(&self, id: &str) -> ApiResult<ContentRow> {
        let row = self.fetch(id).await?.ok_or(ApiError::ExpiredOrInvalid)?;
        if row.is_expired(now_millis()) {
            self.purge(&row).await?;
            info!("Content {} expired on access", row.id);
            return Err(ApiError::ExpiredOrInvalid);
        }
        Ok(row)
    }

    async fn authorize(
        &self,
        id: &str,
        requester: Option<&AuthUser>,
        delete_token: Option<&str>,
    ) -> ApiResult<ContentRow> {
        let row = self.fetch(id).await?.ok_or(ApiError::Forbidden)?;

        let is_owner = matches!(
            (requester, row.owner_id.as_deref()),
            (Some(user), Some(owner)) if user.id == owner
        );
        let holds_token = delete_token
            .filter(|t| !t.is_empty())
            .is_some_and(|t| secrets::hash_token(t) == row.delete_token_hash);

        if is_owner || holds_token {
            Ok(row)
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

async fn password_matches(row: &ContentRow, supplied: Option<&str>) -> ApiResult<bool> {
    match (row.password_hash.clone(), supplied) {
        (None, _) => Ok(true),
        (Some(_), None) => Ok(false),
        (Some(phc), Some(candidate)) => {
            let candidate = candidate.to_string();
            run_blocking(move || Ok(secrets::verify_password(&candidate, &phc)?)).await
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}
