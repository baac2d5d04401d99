//! Router construction for the web surface.

use crate::state::AppState;
use crate::web::{dashboard, labs, status};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Uploaded lab images can be large; scrapes can take a while.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard::login_page))
        .route(
            "/dashboard",
            get(dashboard::dashboard_get).post(dashboard::dashboard_post),
        )
        .route("/b_safe", get(dashboard::b_safe))
        .route("/course/{code}", get(dashboard::course_detail))
        .route("/profile", get(dashboard::profile))
        .route("/lab", get(labs::lab_page).post(labs::lab_submit))
        .route("/get_lab_subjects", post(labs::get_lab_subjects))
        .route("/get_lab_dates", post(labs::get_lab_dates))
        .route("/get_experiment_title", post(labs::get_experiment_title))
        .route("/ping", get(status::ping))
        .route("/status", get(status::status))
        .with_state(app_state)
        .layer((
            TraceLayer::new_for_http(),
            CompressionLayer::new(),
            TimeoutLayer::new(REQUEST_TIMEOUT),
            DefaultBodyLimit::max(MAX_UPLOAD_BYTES),
        ))
}
