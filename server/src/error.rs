use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowError {
    pub item: String,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WardrobeError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("No items were successfully processed")]
    BulkImportFailed(Vec<RowError>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("{service} request failed")]
    Upstream {
        service: &'static str,
        details: String,
    },

    #[error("Internal server error")]
    Internal(String),
}

impl WardrobeError {
    pub fn upstream(service: &'static str, details: impl ToString) -> Self {
        WardrobeError::Upstream {
            service,
            details: details.to_string(),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            WardrobeError::Upstream { details, .. } => Some(details.clone()),
            WardrobeError::Database(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<RowError>>,
}

impl ResponseError for WardrobeError {
    fn status_code(&self) -> StatusCode {
        match self {
            WardrobeError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            WardrobeError::Unauthorized => StatusCode::UNAUTHORIZED,
            WardrobeError::NotFound(_) => StatusCode::NOT_FOUND,
            WardrobeError::Validation(_) => StatusCode::BAD_REQUEST,
            WardrobeError::BulkImportFailed(_) => StatusCode::BAD_REQUEST,
            WardrobeError::Serialization(_) => StatusCode::BAD_REQUEST,
            WardrobeError::Conflict(_) => StatusCode::CONFLICT,
            WardrobeError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            WardrobeError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            WardrobeError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WardrobeError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WardrobeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WardrobeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{} ({:?})", self, self.details());
        }

        let errors = match self {
            WardrobeError::BulkImportFailed(errors) => Some(errors.clone()),
            _ => None,
        };

        let error_response = ErrorResponse {
            success: false,
            error: self.to_string(),
            details: self.details(),
            errors,
        };

        HttpResponse::build(status).json(error_response)
    }
}

pub type Result<T> = std::result::Result<T, WardrobeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            WardrobeError::NotFound("Item").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WardrobeError::Conflict("User already exists".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            WardrobeError::upstream("image host", "timeout").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            WardrobeError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn not_found_message_names_resource() {
        assert_eq!(WardrobeError::NotFound("Outfit").to_string(), "Outfit not found");
    }

    #[actix_web::test]
    async fn upstream_response_carries_details() {
        let resp = WardrobeError::upstream("AI service", "all keys exhausted").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "AI service request failed");
        assert_eq!(body["details"], "all keys exhausted");
    }
}
