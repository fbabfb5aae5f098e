use axum::{extract::State, Extension, Json};

use crate::{
    error::{AppError, AppResult},
    models::{
        AccessTokenResponse, AuthUser, LoginRequest, MessageResponse, RefreshRequest, TokenPair,
        UserProfileResponse,
    },
    routes::extract::AppJson,
    services::auth,
    state::AppState,
};

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = auth::login(state.users.as_ref(), &state.tokens, request).await?;
    Ok(Json(pair))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshRequest>,
) -> AppResult<Json<AccessTokenResponse>> {
    let access_token = state.tokens.refresh(&request.refresh_token)?;
    Ok(Json(AccessTokenResponse { access_token }))
}

/// POST /auth/logout
///
/// Tokens are stateless, so there is nothing to revoke server-side; clients drop
/// their copies.
pub async fn logout(Extension(user): Extension<AuthUser>) -> Json<MessageResponse> {
    tracing::info!(user_id = user.id, "User logged out");
    Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    })
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<UserProfileResponse>> {
    let account = state
        .users
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

    Ok(Json(UserProfileResponse::from(&account)))
}
