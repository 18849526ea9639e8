//! Mockup-Forge
//!
//! Turns an uploaded logo into photorealistic product mockups through an
//! image-generation backend, then refines them with free-text edits while
//! keeping a navigable version history per session.

use actix_web::{web, App, HttpServer, middleware};
use anyhow::Context;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod api;
mod config;
mod domain;
mod providers;
mod session;

use crate::config::Settings;
use crate::domain::ProductCatalog;
use crate::providers::GeneratorFactory;
use crate::session::SessionManager;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub catalog: Arc<ProductCatalog>,
    pub sessions: Arc<SessionManager>,
    pub started_at: Instant,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mockup_forge=info,actix_web=info")),
        )
        .json()
        .init();

    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting Mockup-Forge v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    let catalog = match &settings.catalog.path {
        Some(path) => ProductCatalog::load(path)
            .with_context(|| format!("Failed to load product catalog from {}", path.display()))?,
        None => ProductCatalog::builtin(),
    };
    info!("Loaded {} products", catalog.len());

    let generator = GeneratorFactory::create(&settings.generation)
        .context("Failed to initialize generation backend")?;

    let workers = settings.server.workers.unwrap_or_else(num_cpus::get);

    let sessions = Arc::new(SessionManager::new(generator).with_limits(&settings.sessions));
    sessions.spawn_sweeper(Duration::from_secs(settings.sessions.sweep_interval_secs));
    info!(
        max_sessions = settings.sessions.max_sessions,
        idle_ttl_secs = settings.sessions.idle_ttl_secs,
        "Session sweeper started"
    );

    let app_state = web::Data::new(AppState {
        settings: settings.clone(),
        catalog: Arc::new(catalog),
        sessions,
        started_at: Instant::now(),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "mockup-forge"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION")))
            )
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await?;

    Ok(())
}
