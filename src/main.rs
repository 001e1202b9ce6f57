// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Freelance Gate API Server
//!
//! Serves the auth callback, profile creation endpoints and the session
//! gate in front of the marketplace pages.

use freelance_gate::{
    config::Config,
    db::TableClient,
    services::{IdentityClient, ProfileService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        production = config.production,
        "Starting Freelance Gate API"
    );

    let identity = IdentityClient::new(&config.backend_url, config.backend_anon_key.clone())?;
    let tables = TableClient::new(
        &config.backend_url,
        config.backend_anon_key.clone(),
        config.backend_service_role_key.clone(),
    )?;
    tracing::info!(
        backend = %config.backend_url,
        cookie = %config.session_cookie_name(),
        "Backend clients initialized"
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        identity: Arc::new(identity),
        profiles: ProfileService::new(Arc::new(tables)),
    });

    // Build router
    let app = freelance_gate::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("freelance_gate=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
