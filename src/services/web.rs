//! The HTTP service.

use crate::services::Service;
use crate::state::{AppState, ServiceStatus};
use crate::web::create_router;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

pub struct WebService {
    port: u16,
    state: AppState,
}

impl WebService {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }
}

#[async_trait]
impl Service for WebService {
    async fn run(self: Box<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.state
            .service_statuses
            .set("web", ServiceStatus::Starting);

        let router = create_router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.port))
            .await
            .with_context(|| format!("failed to bind port {}", self.port))?;

        self.state.service_statuses.set("web", ServiceStatus::Active);
        info!(port = self.port, "web service listening");

        let statuses = self.state.service_statuses.clone();
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("web service draining");
            })
            .await
            .context("web server error");

        if result.is_err() {
            statuses.set("web", ServiceStatus::Error);
        } else {
            statuses.set("web", ServiceStatus::Disabled);
        }
        result
    }
}
