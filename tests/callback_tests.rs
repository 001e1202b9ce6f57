// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth callback tests.
//!
//! These tests verify code exchange, redirect target resolution, the
//! new-user marker, and that the handler answers with a redirect no matter
//! what fails inside it.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use freelance_gate::error::BackendError;
use freelance_gate::models::{Session, User};
use freelance_gate::services::{IdentityProvider, MemoryBackend};
use std::sync::Arc;
use tower::ServiceExt;

mod common;
use common::{
    create_test_app, create_test_app_with_identity, find_cookie, find_cookies, location,
    session_cookie_header, session_from_set_cookie, set_cookie_headers,
};

const COOKIE: &str = "sb-testproj-auth-token";
const SITE: &str = "http://localhost:3000";

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Identity backend that succeeds the exchange and then panics on lookup.
struct PanickingLookup {
    inner: MemoryBackend,
}

#[async_trait]
impl IdentityProvider for PanickingLookup {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, BackendError> {
        self.inner.exchange_code(code, code_verifier).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.inner.refresh_session(refresh_token).await
    }

    async fn get_user(&self, _access_token: &str) -> Result<User, BackendError> {
        panic!("identity backend exploded");
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.inner.sign_out(access_token).await
    }
}

/// Identity backend that records the PKCE verifier it was given.
struct RecordingExchange {
    inner: MemoryBackend,
    verifier: std::sync::Mutex<Option<String>>,
}

#[async_trait]
impl IdentityProvider for RecordingExchange {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<Session, BackendError> {
        *self.verifier.lock().unwrap() = code_verifier.map(str::to_string);
        self.inner.exchange_code(code, code_verifier).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.inner.refresh_session(refresh_token).await
    }

    async fn get_user(&self, access_token: &str) -> Result<User, BackendError> {
        self.inner.get_user(access_token).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        self.inner.sign_out(access_token).await
    }
}

#[tokio::test]
async fn test_callback_with_next_redirects_there() {
    let app = create_test_app();
    let user = app.backend.create_user("dev@example.com");
    let code = app.backend.issue_code(user.id);

    let response = app
        .router
        .oneshot(get(&format!("/api/auth/callback?code={code}&next=/dashboard")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("{SITE}/dashboard"));

    let set_cookies = set_cookie_headers(&response);
    let cookie = find_cookie(&set_cookies, COOKIE).expect("session cookie");
    assert!(cookie.contains("HttpOnly"));
    let session = session_from_set_cookie(&cookie).unwrap();
    assert_eq!(
        app.backend.get_user(&session.access_token).await.unwrap().id,
        user.id
    );
}

#[tokio::test]
async fn test_code_is_single_use() {
    let app = create_test_app();
    let user = app.backend.create_user("dev@example.com");
    let code = app.backend.issue_code(user.id);
    let uri = format!("/api/auth/callback?code={code}&next=/dashboard");

    let first = app.router.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(location(&first), format!("{SITE}/dashboard"));

    let second = app.router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(second.status(), StatusCode::FOUND);
    assert!(location(&second).starts_with(&format!("{SITE}/sign-in?error=")));
    assert!(find_cookie(&set_cookie_headers(&second), COOKIE).is_none());
}

#[tokio::test]
async fn test_exchange_error_message_is_encoded() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(get("/auth/callback?code=bogus"))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        format!(
            "{SITE}/sign-in?error={}",
            "invalid%20flow%20state%2C%20no%20valid%20flow%20state%20found"
        )
    );
    assert!(set_cookie_headers(&response).is_empty());
}

#[tokio::test]
async fn test_email_confirmation_without_next() {
    let app = create_test_app();
    let user = app.backend.create_user_at(
        "dev@example.com",
        chrono::Utc::now() - chrono::Duration::days(3),
    );
    let code = app.backend.issue_code(user.id);

    let response = app
        .router
        .oneshot(get(&format!(
            "/api/auth/callback?code={code}&type=email_confirmation"
        )))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        format!("{SITE}/auth/confirmation-success")
    );
}

#[tokio::test]
async fn test_no_code_skips_exchange() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(get("/api/auth/callback?next=/projects"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("{SITE}/projects"));
    assert!(set_cookie_headers(&response).is_empty());
}

#[tokio::test]
async fn test_new_user_gets_verified_marker() {
    let app = create_test_app();
    let user = app.backend.create_user("new@example.com");
    let code = app.backend.issue_code(user.id);

    let response = app
        .router
        .oneshot(get(&format!("/api/auth/callback?code={code}")))
        .await
        .unwrap();

    assert_eq!(location(&response), format!("{SITE}/?email_verified=true"));
}

#[tokio::test]
async fn test_existing_user_lands_on_root() {
    let app = create_test_app();
    let user = app.backend.create_user_at(
        "old@example.com",
        chrono::Utc::now() - chrono::Duration::minutes(10),
    );
    let code = app.backend.issue_code(user.id);

    let response = app
        .router
        .oneshot(get(&format!("/api/auth/callback?code={code}")))
        .await
        .unwrap();

    assert_eq!(location(&response), format!("{SITE}/"));
}

#[tokio::test]
async fn test_panic_inside_callback_still_redirects() {
    let inner = MemoryBackend::default();
    let user = inner.create_user("dev@example.com");
    let code = inner.issue_code(user.id);
    let app = create_test_app_with_identity(Arc::new(PanickingLookup { inner }));

    let response = app
        .router
        .oneshot(get(&format!("/api/auth/callback?code={code}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        format!("{SITE}/sign-in?error=auth_callback_error")
    );
}

#[tokio::test]
async fn test_malformed_query_still_redirects() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(get("/api/auth/callback?code=%FF%FE"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with(&format!("{SITE}/sign-in?error=")));
}

#[tokio::test]
async fn test_code_verifier_cookie_is_used_and_cleared() {
    let inner = MemoryBackend::default();
    let user = inner.create_user("dev@example.com");
    let code = inner.issue_code(user.id);
    let identity = Arc::new(RecordingExchange {
        inner,
        verifier: std::sync::Mutex::new(None),
    });
    let app = create_test_app_with_identity(identity.clone());

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri(format!("/auth/callback?code={code}&next=/dashboard"))
                .header(header::COOKIE, format!("{COOKIE}-code-verifier=verifier123"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        identity.verifier.lock().unwrap().as_deref(),
        Some("verifier123")
    );
    let set_cookies = set_cookie_headers(&response);
    let cleared = find_cookie(&set_cookies, &format!("{COOKIE}-code-verifier")).unwrap();
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_sign_out_clears_session() {
    let app = create_test_app();
    let user = app.backend.create_user("dev@example.com");
    let session = app.backend.issue_session(user.id).unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/signout")
                .header(header::COOKIE, session_cookie_header(&session))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sign-in");

    let set_cookies = set_cookie_headers(&response);
    assert!(find_cookie(&set_cookies, COOKIE)
        .unwrap()
        .contains("Max-Age=0"));
    assert!(app.backend.get_user(&session.access_token).await.is_err());
}

fn callback_with_cookie(code: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/auth/callback?code={code}&next=/dashboard"))
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn sign_out_with_cookie(cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/signout")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_callback_over_revoked_cookie_keeps_new_session() {
    let app = create_test_app();
    let user = app.backend.create_user("dev@example.com");
    let stale = app.backend.issue_session(user.id).unwrap();
    app.backend.sign_out(&stale.access_token).await.unwrap();
    let code = app.backend.issue_code(user.id);

    let response = app
        .router
        .oneshot(callback_with_cookie(&code, &session_cookie_header(&stale)))
        .await
        .unwrap();

    assert_eq!(location(&response), format!("{SITE}/dashboard"));
    let written = find_cookies(&set_cookie_headers(&response), COOKIE);
    assert_eq!(written.len(), 1, "{written:?}");
    let session = session_from_set_cookie(&written[0]).expect("live session cookie");
    assert_eq!(
        app.backend.get_user(&session.access_token).await.unwrap().id,
        user.id
    );
}

#[tokio::test]
async fn test_callback_over_expired_cookie_switches_user() {
    let app = create_test_app();
    let alice = app.backend.create_user("alice@example.com");
    let bob = app.backend.create_user("bob@example.com");
    let mut stale = app.backend.issue_session(alice.id).unwrap();
    stale.expires_at = chrono::Utc::now().timestamp() - 60;
    let code = app.backend.issue_code(bob.id);

    let response = app
        .router
        .oneshot(callback_with_cookie(&code, &session_cookie_header(&stale)))
        .await
        .unwrap();

    let written = find_cookies(&set_cookie_headers(&response), COOKIE);
    assert_eq!(written.len(), 1, "{written:?}");
    let session = session_from_set_cookie(&written[0]).unwrap();
    assert_eq!(
        app.backend.get_user(&session.access_token).await.unwrap().id,
        bob.id
    );
}

#[tokio::test]
async fn test_sign_out_with_expired_cookie_stays_signed_out() {
    let app = create_test_app();
    let user = app.backend.create_user("dev@example.com");
    let mut stale = app.backend.issue_session(user.id).unwrap();
    stale.expires_at = chrono::Utc::now().timestamp() - 60;

    let response = app
        .router
        .oneshot(sign_out_with_cookie(&session_cookie_header(&stale)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let written = find_cookies(&set_cookie_headers(&response), COOKIE);
    assert!(!written.is_empty());
    assert!(
        written.iter().all(|c| c.contains("Max-Age=0")),
        "{written:?}"
    );
    assert!(written.iter().all(|c| session_from_set_cookie(c).is_none()));
}

#[tokio::test]
async fn test_sign_out_with_revoked_cookie_clears_it() {
    let app = create_test_app();
    let user = app.backend.create_user("dev@example.com");
    let stale = app.backend.issue_session(user.id).unwrap();
    app.backend.sign_out(&stale.access_token).await.unwrap();

    let response = app
        .router
        .oneshot(sign_out_with_cookie(&session_cookie_header(&stale)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let written = find_cookies(&set_cookie_headers(&response), COOKIE);
    assert_eq!(written.len(), 1, "{written:?}");
    assert!(written[0].contains("Max-Age=0"));
}
