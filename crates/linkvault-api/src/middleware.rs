use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use linkvault_types::models::AuthUser;

use crate::error::ApiError;
use crate::identity::bearer_token;
use crate::routes::AppState;

/// Identity attached to every request; `None` means anonymous.
#[derive(Debug, Clone)]
pub struct Identity(pub Option<AuthUser>);

impl Identity {
    pub fn user(&self) -> Option<&AuthUser> {
        self.0.as_ref()
    }
}

/// Resolve the bearer token (if any) and attach the caller's identity.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).map(str::to_string);
    let user = state.identity.resolve(token.as_deref()).await?;
    req.extensions_mut().insert(Identity(user));
    Ok(next.run(req).await)
}

/// Reject anonymous callers; downstream handlers can extract `AuthUser`.
pub async fn require_auth(
    Extension(identity): Extension<Identity>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = identity.0.ok_or(ApiError::Unauthorized)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
