use axum::{Extension, Json, extract::State};
use linkvault_types::api::{
    LoginRequest, MeResponse, RegisterRequest, SessionResponse, SuccessResponse, UserSummary,
};
use linkvault_types::models::AuthUser;

use crate::error::ApiResult;
use crate::identity::IssuedSession;
use crate::routes::AppState;

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.identity.register(&req.email, &req.password).await?;
    Ok(Json(session.into()))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.identity.login(&req.email, &req.password).await?;
    Ok(Json(session.into()))
}

/// GET /api/me
pub async fn me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserSummary {
            id: user.id,
            email: user.email,
        },
    })
}

/// POST /api/logout — ends the presenting session only.
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<SuccessResponse>> {
    state.identity.logout(&user).await?;
    Ok(Json(SuccessResponse::ok()))
}

impl From<IssuedSession> for SessionResponse {
    fn from(session: IssuedSession) -> Self {
        SessionResponse {
            token: session.token,
            expires_at: session.expires_at,
            user: session.user,
        }
    }
}
