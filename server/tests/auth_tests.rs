#[macro_use]
mod support;

use actix_web::{http::StatusCode, test};
use serde_json::json;
use server::auth_token::now_secs;
use support::test_state;

#[actix_web::test]
async fn test_signup_issues_token_for_new_account() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth")
        .set_json(json!({"action": "signup", "email": "New@Example.com", "password": "secret-pass"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "token")
        .expect("token cookie");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));

    let body: serde_json::Value = test::read_body_json(resp).await;
    let token = body["token"].as_str().unwrap();
    assert_eq!(cookie.value(), token);

    let claims = state.auth_tokens.verify(token, now_secs()).unwrap();
    let stored = state
        .stores
        .users
        .find_by_email("new@example.com")
        .await
        .unwrap()
        .expect("stored user");
    assert_eq!(claims.user_id, stored.id);
}

#[actix_web::test]
async fn test_duplicate_signup_is_conflict() {
    let state = test_state();
    let app = test_app!(state);
    let body = json!({"action": "signup", "email": "dup@example.com", "password": "secret-pass"});

    let first = test::TestRequest::post().uri("/auth").set_json(&body).to_request();
    assert_eq!(test::call_service(&app, first).await.status(), StatusCode::OK);

    let second = test::TestRequest::post().uri("/auth").set_json(&body).to_request();
    let resp = test::call_service(&app, second).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "User already exists");
}

#[actix_web::test]
async fn test_login_with_correct_and_wrong_password() {
    let state = test_state();
    let app = test_app!(state);

    let signup = test::TestRequest::post()
        .uri("/auth")
        .set_json(json!({"action": "signup", "email": "login@example.com", "password": "right-pass"}))
        .to_request();
    let signup_body: serde_json::Value = test::call_and_read_body_json(&app, signup).await;
    let signup_id = state
        .auth_tokens
        .verify(signup_body["token"].as_str().unwrap(), now_secs())
        .unwrap()
        .user_id;

    let wrong = test::TestRequest::post()
        .uri("/auth")
        .set_json(json!({"action": "login", "email": "login@example.com", "password": "wrong-pass"}))
        .to_request();
    let resp = test::call_service(&app, wrong).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let right = test::TestRequest::post()
        .uri("/auth")
        .set_json(json!({"action": "login", "email": "LOGIN@example.com", "password": "right-pass"}))
        .to_request();
    let resp = test::call_service(&app, right).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let claims = state
        .auth_tokens
        .verify(body["token"].as_str().unwrap(), now_secs())
        .unwrap();
    assert_eq!(claims.user_id, signup_id);
}

#[actix_web::test]
async fn test_login_unknown_email_is_unauthorized() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth")
        .set_json(json!({"action": "login", "email": "ghost@example.com", "password": "whatever"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid credentials");
}

#[actix_web::test]
async fn test_invalid_action_and_missing_fields() {
    let state = test_state();
    let app = test_app!(state);

    for payload in [
        json!({"action": "delete", "email": "a@example.com", "password": "x"}),
        json!({"action": "signup", "email": "   ", "password": "x"}),
        json!({"action": "login", "email": "a@example.com"}),
        json!({"email": "a@example.com", "password": "x"}),
    ] {
        let req = test::TestRequest::post().uri("/auth").set_json(&payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload: {payload}");
    }
}

#[actix_web::test]
async fn test_logout_clears_cookie() {
    let state = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post().uri("/auth/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "token")
        .expect("token cookie");
    assert_eq!(cookie.value(), "");
    assert_eq!(
        cookie.max_age(),
        Some(actix_web::cookie::time::Duration::seconds(0))
    );
}

#[actix_web::test]
async fn test_auth_is_rate_limited() {
    let mut state = test_state();
    state.rate_limiter = server::middleware::RateLimiter::new(2, std::time::Duration::from_secs(60));
    let app = test_app!(state);

    let attempt = || {
        test::TestRequest::post()
            .uri("/auth")
            .peer_addr("10.1.2.3:4000".parse().unwrap())
            .set_json(json!({"action": "login", "email": "x@example.com", "password": "nope"}))
            .to_request()
    };

    assert_eq!(test::call_service(&app, attempt()).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(test::call_service(&app, attempt()).await.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, attempt()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Rate limit exceeded");
}
