//! Bearer-token identity: registration, login, session lookup and logout.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, header};
use linkvault_db::Database;
use linkvault_db::models::UserRow;
use linkvault_types::api::UserSummary;
use linkvault_types::models::AuthUser;
use tracing::{debug, info};
use uuid::Uuid;

use crate::blocking::run_blocking;
use crate::config::MIN_PASSWORD_LENGTH;
use crate::error::{ApiError, ApiResult};
use crate::now_millis;
use crate::secrets;

/// A freshly issued session. The raw token is only ever handed out here.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: i64,
    pub user: UserSummary,
}

/// Every public operation touches SQLite and most run Argon2, so each one
/// is handed to the blocking pool as a whole.
#[derive(Clone)]
pub struct IdentityGate {
    db: Arc<Database>,
    session_ttl: Duration,
}

impl IdentityGate {
    pub fn new(db: Arc<Database>, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    /// Resolve a presented bearer token to a user, or anonymous.
    ///
    /// Unknown and expired tokens both resolve to `None`; the stale session
    /// row is removed on the way out.
    pub async fn resolve(&self, token: Option<&str>) -> ApiResult<Option<AuthUser>> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let gate = self.clone();
        let token = token.to_string();
        run_blocking(move || gate.resolve_blocking(token)).await
    }

    pub async fn register(&self, email: &str, password: &str) -> ApiResult<IssuedSession> {
        let gate = self.clone();
        let (email, password) = (email.to_string(), password.to_string());
        run_blocking(move || gate.register_blocking(&email, &password)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<IssuedSession> {
        let gate = self.clone();
        let (email, password) = (email.to_string(), password.to_string());
        run_blocking(move || gate.login_blocking(&email, &password)).await
    }

    /// Ends only the session the caller presented; other sessions of the
    /// same user stay valid.
    pub async fn logout(&self, user: &AuthUser) -> ApiResult<()> {
        let db = self.db.clone();
        let token_hash = secrets::hash_token(&user.token);
        run_blocking(move || {
            db.delete_session(&token_hash)?;
            Ok(())
        })
        .await
    }

    pub async fn purge_expired_sessions(&self, now: i64) -> ApiResult<usize> {
        let db = self.db.clone();
        run_blocking(move || Ok(db.delete_expired_sessions(now)?)).await
    }

    fn resolve_blocking(&self, token: String) -> ApiResult<Option<AuthUser>> {
        let token_hash = secrets::hash_token(&token);

        match self.db.get_session(&token_hash)? {
            Some(session) if session.expires_at >= now_millis() => Ok(Some(AuthUser {
                id: session.user_id,
                email: session.email,
                token,
            })),
            _ => {
                if self.db.delete_session(&token_hash)? {
                    debug!("Dropped expired session on lookup");
                }
                Ok(None)
            }
        }
    }

    fn register_blocking(&self, email: &str, password: &str) -> ApiResult<IssuedSession> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(ApiError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::WeakPassword);
        }
        if self.db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::EmailExists);
        }

        let user = UserRow {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: secrets::hash_password(password)?,
            created_at: now_millis(),
        };
        if let Err(e) = self.db.create_user(&user) {
            // Lost a race with a concurrent registration of the same email.
            if is_constraint_violation(&e) {
                return Err(ApiError::EmailExists);
            }
            return Err(e.into());
        }

        info!("Registered user {}", user.id);
        self.issue_session(user.id, user.email)
    }

    fn login_blocking(&self, email: &str, password: &str) -> ApiResult<IssuedSession> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidCredentials);
        }

        let user = self
            .db
            .get_user_by_email(&email)?
            .ok_or(ApiError::InvalidCredentials)?;

        if !secrets::verify_password(password, &user.password_hash)? {
            return Err(ApiError::InvalidCredentials);
        }

        self.issue_session(user.id, user.email)
    }

    fn issue_session(&self, user_id: String, email: String) -> ApiResult<IssuedSession> {
        let token = secrets::generate_token();
        let created_at = now_millis();
        let expires_at = created_at + self.session_ttl.as_millis() as i64;

        self.db
            .create_session(&secrets::hash_token(&token), &user_id, created_at, expires_at)?;

        Ok(IssuedSession {
            token,
            expires_at,
            user: UserSummary { id: user_id, email },
        })
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

fn is_constraint_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
