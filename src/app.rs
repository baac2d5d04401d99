use crate::cache::ResultCache;
use crate::config::Config;
use crate::portal::{PortalClient, PortalConfig};
use crate::services::manager::ServiceManager;
use crate::services::web::WebService;
use crate::state::AppState;
use crate::webdriver::{ChromeSessionFactory, SessionPool};
use anyhow::Context;
use figment::{Figment, providers::Env};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    service_manager: ServiceManager,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub fn new() -> Result<Self, anyhow::Error> {
        let config = Self::load_config()?;

        // One HTTP client serves both the WebDriver protocol and the remote
        // cache. Scrape navigations can legitimately take a while.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        let factory = ChromeSessionFactory::new(
            http.clone(),
            config.webdriver_url.clone(),
            config.chrome_bin.clone(),
        );
        let session_pool = SessionPool::new(factory, config.pool_capacity);
        info!(
            capacity = config.pool_capacity,
            webdriver_url = %config.webdriver_url,
            "browser session pool configured"
        );

        let portal_config = PortalConfig::new(
            &config.portal_base_url,
            config.acquire_timeout(),
            config.reference_year,
        );
        let portal = Arc::new(PortalClient::new(session_pool.clone(), portal_config));

        let result_cache = ResultCache::new(config.remote_cache(), http);
        info!(
            remote = result_cache.is_remote(),
            ttl_secs = config.cache_ttl_secs,
            "result cache configured"
        );

        let app_state = AppState::new(
            portal,
            session_pool,
            result_cache,
            config.cache_ttl(),
        );

        Ok(App {
            config,
            app_state,
            service_manager: ServiceManager::new(),
        })
    }

    pub fn load_config() -> Result<Config, anyhow::Error> {
        Figment::new()
            .merge(Env::raw())
            .extract()
            .context("Failed to load config")
    }

    /// Setup and register services
    pub fn setup_services(&mut self) -> Result<(), anyhow::Error> {
        let web_service = Box::new(WebService::new(self.config.port, self.app_state.clone()));
        self.service_manager.register_service("web", web_service);

        if !self.service_manager.has_services() {
            return Err(anyhow::anyhow!("No services enabled"));
        }
        Ok(())
    }

    /// Start all registered services
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run the application and handle shutdown signals
    pub async fn run(self) -> ExitCode {
        use crate::services::signals::handle_shutdown_signals;
        handle_shutdown_signals(
            self.service_manager,
            self.app_state,
            self.config.shutdown_timeout(),
        )
        .await
    }
}
