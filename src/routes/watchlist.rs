use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{AddToWatchlistRequest, AuthUser, Company, ResultsResponse, WatchlistEntry},
    routes::extract::{AppJson, AppPath},
    state::AppState,
};

/// GET /api/watchlist
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<ResultsResponse<Company>>> {
    let companies = state.watchlist.list_for_user(user.id).await?;
    Ok(Json(companies.into()))
}

/// POST /api/watchlist
pub async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(request_id): Extension<RequestId>,
    AppJson(request): AppJson<AddToWatchlistRequest>,
) -> AppResult<(StatusCode, Json<WatchlistEntry>)> {
    let entry = state.watchlist.add(user.id, request.company_id).await?;

    tracing::info!(
        request_id = %request_id,
        user_id = user.id,
        company_id = request.company_id,
        "Company saved to watchlist"
    );

    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /api/watchlist/:company_id
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(company_id): AppPath<i64>,
) -> AppResult<StatusCode> {
    if !state.watchlist.remove(user.id, company_id).await? {
        return Err(AppError::NotFound(format!(
            "Company {} is not in your watchlist",
            company_id
        )));
    }

    tracing::info!(user_id = user.id, company_id, "Company removed from watchlist");
    Ok(StatusCode::NO_CONTENT)
}
