use axum::{
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware, require_auth},
    state::AppState,
};

pub mod auth;
pub mod companies;
pub mod extract;
pub mod watchlist;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/health", get(health_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/api/companies", get(companies::list))
        .route("/api/companies/:id", get(companies::detail));

    // Everything below requires a bearer access token
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/api/companies/recommended", get(companies::recommended))
        .route("/api/companies/:id/summary", get(companies::summary))
        .route("/api/watchlist", get(watchlist::list).post(watchlist::add))
        .route("/api/watchlist/:company_id", delete(watchlist::remove))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
