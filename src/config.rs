//! Application configuration loaded from environment variables.
//!
//! The service-role key is server-only and must never reach a browser.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public site URL used to build redirect targets
    pub site_url: String,
    /// Hosted backend base URL (identity under /auth/v1, tables under /rest/v1)
    pub backend_url: String,
    /// Public (anon) API key, sent with user-scoped requests
    pub backend_anon_key: String,
    /// Service-role key, bypasses row-level access policies
    pub backend_service_role_key: String,
    /// Server port
    pub port: u16,
    /// Production deployment (secure cookies, HSTS)
    pub production: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            site_url: env::var("SITE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            backend_url: env::var("BACKEND_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_URL"))?,
            backend_anon_key: env::var("BACKEND_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_ANON_KEY"))?,
            backend_service_role_key: env::var("BACKEND_SERVICE_ROLE_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_SERVICE_ROLE_KEY"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            production: env::var("APP_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            site_url: "http://localhost:3000".to_string(),
            backend_url: "http://testproj.localhost:54321".to_string(),
            backend_anon_key: "test_anon_key".to_string(),
            backend_service_role_key: "test_service_role_key".to_string(),
            port: 8080,
            production: false,
        }
    }

    /// Project reference: first DNS label of the backend host.
    pub fn project_ref(&self) -> &str {
        let host = self
            .backend_url
            .split("://")
            .nth(1)
            .unwrap_or(&self.backend_url);
        host.split(['.', ':', '/']).next().unwrap_or(host)
    }

    /// Name of the session cookie (chunks append `.0`, `.1`, ...).
    pub fn session_cookie_name(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref())
    }

    /// Absolute URL on this site for a site-relative path.
    pub fn site_path(&self, path_and_query: &str) -> String {
        format!("{}{}", self.site_url, path_and_query)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
