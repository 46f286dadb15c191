//! Shared fixtures for the HTTP integration tests: an in-memory app state
//! with fake image and completion services.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use server::auth_token::{now_secs, AuthTokenService};
use server::config::{AppConfig, Secret, StorageBackend};
use server::db::{ItemFields, NewItem, NewUser, Stores, WardrobeItem};
use server::middleware::RateLimiter;
use server::services::completion::{CompletionClient, CompletionError, FailoverCompleter};
use server::services::images::{
    BackgroundRemover, ImageData, ImageError, ImageFetcher, ImageHost, ImagePipeline,
};
use server::services::Stylist;
use server::AppState;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.backend = StorageBackend::Memory;
    config.auth.jwt_secret = Secret::new(JWT_SECRET);
    config.auth.bcrypt_cost = 4;
    config.auth.rate_limit_attempts = 100;
    config
}

pub struct PassThroughRemover;

#[async_trait]
impl BackgroundRemover for PassThroughRemover {
    async fn remove_background(&self, image: &ImageData) -> Result<ImageData, ImageError> {
        Ok(image.clone())
    }
}

/// Hands out sequential CDN URLs.
#[derive(Default)]
pub struct FakeHost {
    uploads: AtomicUsize,
}

#[async_trait]
impl ImageHost for FakeHost {
    async fn upload(&self, _image: &ImageData) -> Result<String, ImageError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://cdn.test/{n}.png"))
    }
}

/// Serves `good.test` URLs; everything else fails.
pub struct FakeFetcher;

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageData, ImageError> {
        if url.contains("good.test") {
            Ok(ImageData::new(b"png".to_vec(), "image/png"))
        } else {
            Err(ImageError::Status {
                status: 404,
                body: format!("Failed to fetch image from URL: {url}"),
            })
        }
    }
}

/// Completion client whose answers are scripted per API key. Keys without
/// a script fail with a 402 status.
#[derive(Default)]
pub struct ScriptedCompletion {
    answers: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn answering(key: &str, answer: impl Into<String>) -> Self {
        let mut answers = HashMap::new();
        answers.insert(key.to_string(), answer.into());
        Self {
            answers,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn keys_called(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, api_key: &str, _prompt: &str) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(api_key.to_string());
        self.answers
            .get(api_key)
            .cloned()
            .ok_or(CompletionError::Status(402))
    }
}

pub fn test_state_with(completion: Arc<ScriptedCompletion>, keys: &[&str]) -> AppState {
    let config = test_config();
    let auth_tokens = AuthTokenService::new(JWT_SECRET.as_bytes().to_vec(), config.token_ttl())
        .expect("valid secret");
    let images = ImagePipeline::new(
        Arc::new(PassThroughRemover),
        Arc::new(FakeHost::default()),
        Arc::new(FakeFetcher),
    );
    let completer = FailoverCompleter::new(
        completion,
        keys.iter().map(|key| Secret::new(*key)).collect(),
    );

    AppState {
        rate_limiter: RateLimiter::from_config(&config.auth),
        stores: Stores::in_memory(),
        auth_tokens,
        images,
        stylist: Stylist::new(completer),
        config,
    }
}

pub fn test_state() -> AppState {
    test_state_with(Arc::new(ScriptedCompletion::failing()), &["unused"])
}

/// Creates an account directly in storage and returns `(user_id, token)`.
pub async fn create_user(state: &AppState, email: &str) -> (String, String) {
    let user = state
        .stores
        .users
        .insert(NewUser::new(email, "password123", 4).unwrap())
        .await
        .unwrap();
    let token = state
        .auth_tokens
        .issue_session_token(&user.id, now_secs())
        .unwrap();
    (user.id, token)
}

pub async fn create_item(
    state: &AppState,
    owner_id: &str,
    title: &str,
    category: &str,
    occasion: &str,
    purpose: &str,
) -> WardrobeItem {
    let fields = ItemFields {
        title: Some(title.to_string()),
        category: Some(category.to_string()),
        occasion: Some(occasion.to_string()),
        purpose: Some(purpose.to_string()),
        ..ItemFields::default()
    };
    state
        .stores
        .items
        .insert(NewItem::new(
            owner_id,
            fields,
            format!("https://cdn.test/{}.png", title.to_lowercase().replace(' ', "-")),
        ))
        .await
        .unwrap()
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

pub const BOUNDARY: &str = "----wardrobe-test-boundary";

pub fn multipart_content_type() -> (&'static str, String) {
    (
        "Content-Type",
        format!("multipart/form-data; boundary={BOUNDARY}"),
    )
}

/// Encodes text fields and `(field, filename, content type, bytes)` files as
/// a multipart body.
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename, content_type, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Builds the full application, CORS included, for `test::init_service`.
macro_rules! test_app {
    ($state:expr) => {{
        let state = $state.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .configure(move |cfg| server::configure(&state, cfg))
                .wrap(actix_web::middleware::from_fn(
                    server::middleware::cors_middleware,
                )),
        )
        .await
    }};
}
