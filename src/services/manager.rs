//! Registration and lifecycle management for long-running services.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A long-running component that stops when the shutdown channel fires.
#[async_trait]
pub trait Service: Send {
    async fn run(self: Box<Self>, shutdown_rx: broadcast::Receiver<()>) -> Result<()>;
}

pub struct ServiceManager {
    services: Vec<(&'static str, Box<dyn Service>)>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            services: Vec::new(),
            handles: Vec::new(),
            shutdown_tx,
        }
    }

    pub fn register_service(&mut self, name: &'static str, service: Box<dyn Service>) {
        self.services.push((name, service));
    }

    pub fn has_services(&self) -> bool {
        !self.services.is_empty() || !self.handles.is_empty()
    }

    /// Spawn every registered service on its own task.
    pub fn spawn_all(&mut self) {
        for (name, service) in self.services.drain(..) {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let handle = tokio::spawn(async move {
                if let Err(e) = service.run(shutdown_rx).await {
                    error!(service = name, error = ?e, "service exited with error");
                }
            });
            info!(service = name, "service spawned");
            self.handles.push((name, handle));
        }
    }

    /// Broadcast shutdown and wait up to `timeout` for services to drain.
    pub async fn shutdown(self, timeout: Duration) {
        let _ = self.shutdown_tx.send(());

        let names: Vec<&'static str> = self.handles.iter().map(|(name, _)| *name).collect();
        let drain = join_all(self.handles.into_iter().map(|(_, handle)| handle));
        match tokio::time::timeout(timeout, drain).await {
            Ok(_) => info!(services = ?names, "all services stopped"),
            Err(_) => warn!(
                services = ?names,
                timeout = ?timeout,
                "services did not drain in time, abandoning"
            ),
        }
    }
}
