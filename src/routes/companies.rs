use axum::{extract::State, Extension, Json};

use crate::{
    error::AppResult,
    middleware::RequestId,
    models::{AuthUser, Company, CompanyQuery, CompanySummary, Page, ResultsResponse},
    routes::extract::{AppPath, AppQuery},
    services::{company_search, recommendations},
    state::AppState,
};

/// GET /api/companies
pub async fn list(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CompanyQuery>,
) -> AppResult<Json<Page<Company>>> {
    let page = company_search::list_companies(state.companies.as_ref(), &query).await?;
    Ok(Json(page))
}

/// GET /api/companies/:id
pub async fn detail(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Company>> {
    let company = company_search::get_company(state.companies.as_ref(), id).await?;
    Ok(Json(company))
}

/// GET /api/companies/recommended
pub async fn recommended(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<ResultsResponse<Company>>> {
    let results = recommendations::get_recommendations(
        state.companies.as_ref(),
        state.watchlist.as_ref(),
        user.id,
    )
    .await?;

    tracing::info!(
        request_id = %request_id,
        user_id = user.id,
        count = results.len(),
        "Served recommendations"
    );

    Ok(Json(results.into()))
}

/// GET /api/companies/:id/summary
pub async fn summary(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    Extension(user): Extension<AuthUser>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<CompanySummary>> {
    let company = company_search::get_company(state.companies.as_ref(), id).await?;

    let summary = state.summaries.summarize(&company).await.map_err(|e| {
        tracing::warn!(
            request_id = %request_id,
            user_id = user.id,
            company_id = id,
            error = %e,
            "Company summary failed"
        );
        e
    })?;

    Ok(Json(summary))
}
