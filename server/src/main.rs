use actix_web::{middleware as actix_middleware, App, HttpServer};
use anyhow::Context;
use mongodb::Client;
use std::time::Duration;
use tokio::time;

use server::config::{AppConfig, StorageBackend};
use server::db::{MongoDbContext, Stores};
use server::middleware::cors_middleware;
use server::AppState;

async fn connect_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match config.database.backend {
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage; data is lost on restart");
            Ok(Stores::in_memory())
        }
        StorageBackend::Mongodb => {
            log::info!("Connecting to MongoDB database '{}'...", config.database.name);
            let client = Client::with_uri_str(config.database.uri.expose())
                .await
                .context("Failed to connect to MongoDB")?;

            let db_context = MongoDbContext::new(client, &config.database.name);

            log::info!("Initializing database indexes...");
            db_context
                .init_indexes()
                .await
                .context("Failed to initialize database indexes")?;

            Ok(Stores::mongo(db_context))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (for development)
    // Try loading from current directory first, then from server/ directory
    if dotenvy::dotenv().is_err() {
        dotenvy::from_filename("server/.env").ok();
    }

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting wardrobe server...");

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "server/config/wardrobe.toml".to_string());

    let config = AppConfig::load(Some(&config_path)).with_context(|| {
        format!(
            "Failed to load configuration from '{}' and WARDROBE__* variables",
            config_path
        )
    })?;
    log::info!(
        "Loaded configuration (storage: {:?}, AI keys: {})",
        config.database.backend,
        config.ai.usable_keys().len()
    );

    let stores = connect_stores(&config).await?;
    let state = AppState::from_config(config.clone(), stores)?;

    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(300)); // Every 5 minutes
        loop {
            interval.tick().await;
            rate_limiter.cleanup_old_entries();
            log::debug!("Background cleanup: cleaned rate limiter entries");
        }
    });

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    log::info!("Starting HTTP server at {}:{}...", server_host, server_port);

    let mut http_server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .configure(move |cfg| server::configure(&state, cfg))
            // Middleware; CORS is outermost so preflights never reach auth
            .wrap(actix_middleware::Compress::default())
            .wrap(actix_middleware::Logger::default())
            .wrap(actix_middleware::from_fn(cors_middleware))
    });

    if let Some(workers) = config.server.workers {
        http_server = http_server.workers(workers);
    }

    http_server
        .bind((server_host, server_port))?
        .run()
        .await
        .context("HTTP server terminated with an error")
}
