use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    post, web, HttpResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth_token::{now_secs, AuthTokenService},
    config::AppConfig,
    db::{models::normalize_email, NewUser, Stores, User},
    error::{Result, WardrobeError},
    middleware::TOKEN_COOKIE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Signup,
    Login,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub action: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

impl AuthRequest {
    fn action(&self) -> Result<AuthAction> {
        match self.action.trim().to_ascii_lowercase().as_str() {
            "signup" => Ok(AuthAction::Signup),
            "login" => Ok(AuthAction::Login),
            _ => Err(WardrobeError::Validation("Invalid action".to_string())),
        }
    }
}

#[post("")]
pub async fn authenticate(
    req: web::Json<AuthRequest>,
    stores: web::Data<Stores>,
    auth_tokens: web::Data<AuthTokenService>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let action = req.action()?;

    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(WardrobeError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = match action {
        AuthAction::Signup => signup(&stores, email, req.password, config.auth.bcrypt_cost).await?,
        AuthAction::Login => login(&stores, &email, req.password).await?,
    };

    let token = auth_tokens
        .issue_session_token(&user.id, now_secs())
        .map_err(|err| WardrobeError::Internal(format!("Failed to issue auth token: {err}")))?;

    let cookie = Cookie::build(TOKEN_COOKIE, token.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.auth.secure_cookie)
        .max_age(CookieDuration::seconds(auth_tokens.ttl().as_secs() as i64))
        .finish();

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(AuthResponse { token }))
}

async fn signup(stores: &Stores, email: String, password: String, cost: u32) -> Result<User> {
    if stores.users.find_by_email(&email).await?.is_some() {
        log::info!("Signup rejected, account exists: {}", email);
        return Err(WardrobeError::Conflict("User already exists".to_string()));
    }

    let new_user = web::block(move || NewUser::new(&email, &password, cost))
        .await
        .map_err(|err| WardrobeError::Internal(format!("Password hashing task failed: {err}")))??;

    let user = stores.users.insert(new_user).await?;
    log::info!("Created account {} for {}", user.id, user.email);
    Ok(user)
}

async fn login(stores: &Stores, email: &str, password: String) -> Result<User> {
    let user = stores
        .users
        .find_by_email(email)
        .await?
        .ok_or(WardrobeError::InvalidCredentials)?;

    let candidate = user.clone();
    let valid = web::block(move || candidate.verify_password(&password))
        .await
        .map_err(|err| WardrobeError::Internal(format!("Password check task failed: {err}")))??;

    if !valid {
        log::warn!("Failed login attempt for user: {}", email);
        return Err(WardrobeError::InvalidCredentials);
    }

    log::info!("Successful login for user: {}", email);
    Ok(user)
}

#[post("/logout")]
pub async fn logout() -> Result<HttpResponse> {
    let cookie = Cookie::build(TOKEN_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(0))
        .finish();

    let response = LogoutResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok(HttpResponse::Ok().cookie(cookie).json(response))
}
