use crate::app::App;
use crate::cli::Args;
use crate::logging::setup_logging;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;

mod app;
mod attendance;
mod cache;
mod cli;
mod config;
mod logging;
mod pdf;
mod portal;
mod services;
mod state;
mod utils;
mod web;
mod webdriver;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let early_config = App::load_config().expect("Failed to load config for logging setup");
    setup_logging(&early_config, args.tracing);

    // Create and initialize the application
    let mut app = App::new().expect("Failed to initialize application");

    // Log application startup context
    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting bunkmate"
    );

    // Setup services (web)
    app.setup_services().expect("Failed to setup services");

    // Start all services and run the application
    app.start_services();
    app.run().await
}
