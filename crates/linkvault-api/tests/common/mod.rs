//! Shared fixtures for the linkvault-api integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use tempfile::TempDir;
use tower::ServiceExt;

use linkvault_api::lifecycle::{FileUpload, NewContent, Payload};
use linkvault_api::storage::Storage;
use linkvault_api::{AppState, ContentEngine, IdentityGate, VaultConfig, build_router, now_millis};
use linkvault_db::Database;

pub const BOUNDARY: &str = "linkvault-test-boundary";

/// A fully wired vault on a throwaway directory.
pub struct TestVault {
    _dir: TempDir,
    pub db: Arc<Database>,
    pub storage: Arc<Storage>,
    pub engine: Arc<ContentEngine>,
    pub identity: Arc<IdentityGate>,
}

impl TestVault {
    pub async fn new() -> Self {
        Self::with_config(VaultConfig::default()).await
    }

    pub async fn with_config(config: VaultConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("vault.db")).unwrap());
        let storage = Arc::new(Storage::new(dir.path().join("uploads")).await.unwrap());
        let session_ttl = config.session_ttl;
        let engine = Arc::new(ContentEngine::new(db.clone(), storage.clone(), config));
        let identity = Arc::new(IdentityGate::new(db.clone(), session_ttl));
        Self {
            _dir: dir,
            db,
            storage,
            engine,
            identity,
        }
    }

    pub fn app(&self) -> Router {
        build_router(AppState {
            engine: self.engine.clone(),
            identity: self.identity.clone(),
        })
    }

    /// Move a content record's lifetime entirely into the past.
    pub fn expire_content(&self, id: &str) {
        let now = now_millis();
        self.db
            .with_conn_mut(|conn| {
                conn.execute(
                    "UPDATE contents SET created_at = ?1, expires_at = ?2 WHERE id = ?3",
                    rusqlite::params![now - 7_200_000, now - 3_600_000, id],
                )?;
                Ok(())
            })
            .unwrap();
    }

    /// Expire the session behind a raw bearer token.
    pub fn expire_session(&self, token: &str) {
        let hash = linkvault_api::secrets::hash_token(token);
        self.db
            .with_conn_mut(|conn| {
                conn.execute(
                    "UPDATE sessions SET expires_at = ?1 WHERE token_hash = ?2",
                    rusqlite::params![now_millis() - 1_000, hash],
                )?;
                Ok(())
            })
            .unwrap();
    }

    pub fn view_count(&self, id: &str) -> Option<i64> {
        self.db.get_content(id).unwrap().map(|row| row.view_count)
    }
}

pub fn text(body: &str) -> NewContent {
    NewContent {
        payload: Payload::Text(body.to_string()),
        password: None,
        one_time: false,
        max_views: None,
        expiry_minutes: None,
        owner_id: None,
    }
}

pub fn file(name: &str, media_type: &str, data: &[u8]) -> NewContent {
    NewContent {
        payload: Payload::File(FileUpload {
            name: name.to_string(),
            media_type: media_type.to_string(),
            data: Bytes::copy_from_slice(data),
        }),
        ..text("unused")
    }
}

// ── HTTP helpers ────────────────────────────────────────────────────────

/// One part of a multipart/form-data body.
pub enum Part<'a> {
    Field(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        media_type: &'a str,
        data: &'a [u8],
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                media_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, media_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>], bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

pub fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    bearer: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Send a request and return (status, headers, raw body).
pub async fn send(
    app: &Router,
    req: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Bytes) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

/// Send a request and parse the body as JSON.
pub async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = send(app, req).await;
    let value = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}
