// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Freelance Gate: session lifecycle and auth routing for the freelance
//! marketplace.
//!
//! This crate provides the server-side auth flow (code exchange, per-request
//! session revalidation, profile bootstrap) on top of a hosted identity and
//! table backend, plus a client-side auth state provider.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session_store;

use config::Config;
use services::{IdentityProvider, ProfileService};
use std::sync::Arc;

/// Shared application state.
///
/// Backends are injected at construction so tests can swap in the
/// in-memory backend.
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: ProfileService,
}
