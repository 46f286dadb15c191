// Library exports for testing and reuse

pub mod auth_token;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use actix_web::{middleware as actix_middleware, web};

use crate::auth_token::AuthTokenService;
use crate::config::AppConfig;
use crate::db::Stores;
use crate::error::WardrobeError;
use crate::middleware::{auth_middleware, rate_limit_middleware, RateLimiter};
use crate::services::{FailoverCompleter, ImagePipeline, OpenRouterClient, Stylist};

/// Everything the handlers share, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub stores: Stores,
    pub auth_tokens: AuthTokenService,
    pub images: ImagePipeline,
    pub stylist: Stylist,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Wires the production HTTP clients around the given stores.
    pub fn from_config(config: AppConfig, stores: Stores) -> crate::error::Result<Self> {
        let auth_tokens = AuthTokenService::new(
            config.auth.jwt_secret.expose().as_bytes().to_vec(),
            config.token_ttl(),
        )
        .map_err(|err| WardrobeError::Config(format!("Invalid JWT secret: {}", err)))?;

        let images = ImagePipeline::from_config(&config.images)?;
        let completer = FailoverCompleter::new(
            Arc::new(OpenRouterClient::from_config(&config.ai)?),
            config.ai.usable_keys(),
        );
        if completer.key_count() == 0 {
            log::warn!("No AI API keys configured; styling endpoints will fail");
        }
        let rate_limiter = RateLimiter::from_config(&config.auth);

        Ok(Self {
            stores,
            auth_tokens,
            images,
            stylist: Stylist::new(completer),
            rate_limiter,
            config,
        })
    }
}

/// Registers shared state and every route. Used by `main` and the
/// integration tests.
pub fn configure(state: &AppState, cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        WardrobeError::Validation(format!("Invalid JSON body: {}", err)).into()
    });

    cfg.app_data(json_config)
        .app_data(web::Data::new(state.config.clone()))
        .app_data(web::Data::new(state.stores.clone()))
        .app_data(web::Data::new(state.auth_tokens.clone()))
        .app_data(web::Data::new(state.images.clone()))
        .app_data(web::Data::new(state.stylist.clone()))
        .app_data(web::Data::new(state.rate_limiter.clone()))
        // Public routes
        .service(handlers::health_check)
        .service(
            web::scope("/auth")
                .wrap(actix_middleware::from_fn(rate_limit_middleware))
                .service(handlers::authenticate)
                .service(handlers::logout),
        )
        // Protected routes; fixed paths before `/{id}`
        .service(
            web::scope("/wardrobe")
                .wrap(actix_middleware::from_fn(auth_middleware))
                .service(handlers::list_items)
                .service(handlers::create_item)
                .service(handlers::bulk_upload)
                .service(handlers::item_analytics)
                .service(handlers::styling_suggestions)
                .service(handlers::get_item)
                .service(handlers::update_item)
                .service(handlers::delete_item),
        )
        .service(
            web::scope("/outfits")
                .wrap(actix_middleware::from_fn(auth_middleware))
                .service(handlers::list_outfits)
                .service(handlers::create_outfit)
                .service(handlers::generate_outfit)
                .service(handlers::suggest_combinations)
                .service(handlers::update_outfit)
                .service(handlers::delete_outfit),
        );
}
