use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use crate::{db::Stores, error::Result};

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: &'static str,
    pub storage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[get("/health")]
pub async fn health_check(stores: web::Data<Stores>) -> Result<HttpResponse> {
    match stores.ping().await {
        Ok(()) => Ok(HttpResponse::Ok().json(HealthCheckResponse {
            status: "healthy",
            storage: stores.backend(),
            error: None,
        })),
        Err(err) => {
            log::warn!("Health check failed: {}", err);
            Ok(HttpResponse::ServiceUnavailable().json(HealthCheckResponse {
                status: "degraded",
                storage: stores.backend(),
                error: Some("storage unreachable".to_string()),
            }))
        }
    }
}
