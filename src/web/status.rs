//! Liveness and status handlers.

use crate::state::{AppState, ServiceStatus};
use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Serialize)]
pub struct PoolStatus {
    capacity: usize,
    live_sessions: usize,
}

#[derive(Serialize)]
pub struct StatusResponse {
    status: ServiceStatus,
    version: String,
    commit: String,
    services: BTreeMap<String, ServiceStatus>,
    pool: PoolStatus,
}

/// `GET /ping`
pub(super) async fn ping() -> &'static str {
    trace!("ping requested");
    "pong"
}

/// `GET /status` -- per-service health plus browser pool occupancy.
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let mut services = BTreeMap::new();
    for (name, svc_status) in state.service_statuses.all() {
        services.insert(name, svc_status);
    }

    let overall_status = if services.values().any(|s| matches!(s, ServiceStatus::Error)) {
        ServiceStatus::Error
    } else if services.is_empty() {
        ServiceStatus::Disabled
    } else {
        ServiceStatus::Active
    };

    Json(StatusResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_SHORT").to_string(),
        services,
        pool: PoolStatus {
            capacity: state.session_pool.capacity(),
            live_sessions: state.session_pool.live_sessions(),
        },
    })
}
