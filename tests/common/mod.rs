// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::{header, HeaderValue, Response};
use freelance_gate::config::Config;
use freelance_gate::models::Session;
use freelance_gate::routes::create_router;
use freelance_gate::services::{IdentityProvider, MemoryBackend, ProfileService};
use freelance_gate::session_store::SessionCookies;
use freelance_gate::AppState;
use std::sync::Arc;

/// Router wired to an in-memory backend.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub backend: Arc<MemoryBackend>,
}

/// Create a test app with the in-memory backend for both identity and tables.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let backend = Arc::new(MemoryBackend::default());
    let state = Arc::new(AppState {
        config,
        identity: backend.clone(),
        profiles: ProfileService::new(backend.clone()),
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        backend,
    }
}

/// Create a test app whose identity backend is `identity`; tables stay in memory.
#[allow(dead_code)]
pub fn create_test_app_with_identity(identity: Arc<dyn IdentityProvider>) -> TestApp {
    let backend = Arc::new(MemoryBackend::default());
    let state = Arc::new(AppState {
        config: Config::test_default(),
        identity,
        profiles: ProfileService::new(backend.clone()),
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        backend,
    }
}

/// `Cookie` request header carrying `session`.
#[allow(dead_code)]
pub fn session_cookie_header(session: &Session) -> String {
    let config = Config::test_default();
    format!(
        "{}={}",
        config.session_cookie_name(),
        SessionCookies::encode(session).unwrap()
    )
}

#[allow(dead_code)]
pub fn set_cookie_headers<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
}

/// Every `Set-Cookie` header for `name`, in order.
#[allow(dead_code)]
pub fn find_cookies(headers: &[String], name: &str) -> Vec<String> {
    headers
        .iter()
        .filter(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .collect()
}

#[allow(dead_code)]
pub fn location<B>(response: &Response<B>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .map(HeaderValue::to_str)
        .expect("missing Location header")
        .unwrap()
        .to_string()
}

/// Decode the session written by a `Set-Cookie` header.
#[allow(dead_code)]
pub fn session_from_set_cookie(set_cookie: &str) -> Option<Session> {
    let value = set_cookie.split(';').next()?.split_once('=')?.1;
    SessionCookies::decode(value)
}
