use std::future::{ready, Ready};

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{Payload, ServiceRequest, ServiceResponse},
    http::{
        header::{HeaderName, HeaderValue, AUTHORIZATION},
        Method,
    },
    middleware::Next,
    web, FromRequest, HttpMessage, HttpRequest, ResponseError,
};

use crate::{
    auth_token::{now_secs, AuthTokenService},
    error::WardrobeError,
};

pub const TOKEN_COOKIE: &str = "token";
const USER_ID_HEADER: &str = "userid";

/// Identity of the caller, placed in the request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = WardrobeError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedUser>()
                .cloned()
                .ok_or(WardrobeError::Unauthorized),
        )
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    from_header.or_else(|| {
        req.cookie(TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Rejects requests without a valid session token before any handler runs.
pub async fn auth_middleware(
    mut req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, actix_web::Error> {
    if req.method() == Method::OPTIONS {
        return Ok(next.call(req).await?.map_into_left_body());
    }

    let verified = match (
        bearer_token(&req),
        req.app_data::<web::Data<AuthTokenService>>(),
    ) {
        (Some(token), Some(tokens)) => tokens.verify(&token, now_secs()).map_err(|err| {
            log::debug!("Rejected session token: {}", err);
        }),
        (None, _) => Err(()),
        (_, None) => {
            log::error!("Auth token service not registered");
            Err(())
        }
    };

    let claims = match verified {
        Ok(claims) => claims,
        Err(()) => {
            let response = WardrobeError::Unauthorized.error_response();
            return Ok(req.into_response(response).map_into_right_body());
        }
    };

    match HeaderValue::from_str(&claims.user_id) {
        Ok(value) => {
            req.headers_mut()
                .insert(HeaderName::from_static(USER_ID_HEADER), value);
        }
        Err(_) => {
            let response = WardrobeError::Unauthorized.error_response();
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    req.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.user_id,
    });

    Ok(next.call(req).await?.map_into_left_body())
}
