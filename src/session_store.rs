// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session persistence in browser cookies.
//!
//! The session is stored as `base64-` followed by base64url(JSON) under the
//! cookie `sb-<project-ref>-auth-token`. Values longer than
//! [`MAX_CHUNK_SIZE`] are split across `<name>.0`, `<name>.1`, ... so each
//! cookie stays under browser size limits.

use crate::config::Config;
use crate::models::Session;
use axum::http::{header, HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

/// Largest value written into a single cookie.
pub const MAX_CHUNK_SIZE: usize = 3180;
const BASE64_PREFIX: &str = "base64-";
const SESSION_MAX_AGE_DAYS: i64 = 400;

/// Reads and writes the session cookies for one site.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    secure: bool,
}

impl SessionCookies {
    pub fn new(config: &Config) -> Self {
        Self {
            name: config.session_cookie_name(),
            secure: config.production,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie holding the PKCE code verifier for a pending code exchange.
    pub fn verifier_name(&self) -> String {
        format!("{}-code-verifier", self.name)
    }

    /// Encode a session into a cookie value (before chunking).
    pub fn encode(session: &Session) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(session)?;
        Ok(format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(json)))
    }

    /// Decode a cookie value. Plain JSON values are accepted as well.
    pub fn decode(value: &str) -> Option<Session> {
        match value.strip_prefix(BASE64_PREFIX) {
            Some(encoded) => {
                let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
                serde_json::from_slice(&bytes).ok()
            }
            None => serde_json::from_str(value).ok(),
        }
    }

    fn chunk_name(&self, index: usize) -> String {
        format!("{}.{}", self.name, index)
    }

    /// Whether `cookie_name` is the session cookie or one of its chunks.
    pub fn is_session_cookie(&self, cookie_name: &str) -> bool {
        if cookie_name == self.name {
            return true;
        }
        cookie_name
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|index| index.parse::<usize>().is_ok())
    }

    /// Split an encoded value into cookie name/value pairs.
    fn chunks(&self, encoded: &str) -> Vec<(String, String)> {
        if encoded.len() <= MAX_CHUNK_SIZE {
            return vec![(self.name.clone(), encoded.to_string())];
        }
        // The encoded value is ASCII, so byte chunks are valid UTF-8.
        encoded
            .as_bytes()
            .chunks(MAX_CHUNK_SIZE)
            .enumerate()
            .map(|(i, chunk)| {
                (
                    self.chunk_name(i),
                    String::from_utf8_lossy(chunk).into_owned(),
                )
            })
            .collect()
    }

    fn cookie(&self, name: String, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::days(SESSION_MAX_AGE_DAYS))
            .build()
    }

    /// Removal cookie with the same attributes the cookie was created with.
    fn removal(&self, name: String) -> Cookie<'static> {
        Cookie::build((name, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }

    /// Read the session from request cookies. Missing or undecodable
    /// cookies yield `None`.
    pub fn read(&self, jar: &CookieJar) -> Option<Session> {
        let value = match jar.get(&self.name) {
            Some(cookie) => cookie.value().to_string(),
            None => {
                let mut joined = String::new();
                let mut index = 0;
                while let Some(chunk) = jar.get(&self.chunk_name(index)) {
                    joined.push_str(chunk.value());
                    index += 1;
                }
                if joined.is_empty() {
                    return None;
                }
                joined
            }
        };

        let session = Self::decode(&value);
        if session.is_none() {
            tracing::debug!(cookie = %self.name, "Ignoring undecodable session cookie");
        }
        session
    }

    /// Write `session` into the jar, removing stale chunks left over from a
    /// previous value of a different size.
    pub fn write(&self, jar: CookieJar, session: &Session) -> Result<CookieJar, serde_json::Error> {
        let chunks = self.chunks(&Self::encode(session)?);
        let keep: Vec<&str> = chunks.iter().map(|(name, _)| name.as_str()).collect();

        let stale: Vec<String> = jar
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| self.is_session_cookie(name) && !keep.contains(&name.as_str()))
            .collect();

        let mut jar = jar;
        for name in stale {
            jar = jar.remove(self.removal(name));
        }
        for (name, value) in chunks {
            jar = jar.add(self.cookie(name, value));
        }
        Ok(jar)
    }

    /// Remove every session cookie present in the jar.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let present: Vec<String> = jar
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| self.is_session_cookie(name))
            .collect();

        present
            .into_iter()
            .fold(jar, |jar, name| jar.remove(self.removal(name)))
    }

    /// Whether a response already writes (or removes) session cookies.
    pub fn sets_session_cookie(&self, headers: &HeaderMap) -> bool {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split_once('='))
            .any(|(name, _)| self.is_session_cookie(name.trim()))
    }

    pub fn code_verifier(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.verifier_name())
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn clear_code_verifier(&self, jar: CookieJar) -> CookieJar {
        if jar.get(&self.verifier_name()).is_none() {
            return jar;
        }
        jar.remove(self.removal(self.verifier_name()))
    }

    /// Replace the session cookies in a request's `Cookie` header so that
    /// downstream handlers see the current session, not the one the browser
    /// sent.
    pub fn rewrite_request_cookies(&self, headers: &mut HeaderMap, session: Option<&Session>) {
        let mut pairs: Vec<String> = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let name = pair.split_once('=').map_or(*pair, |(name, _)| name);
                !self.is_session_cookie(name)
            })
            .map(str::to_string)
            .collect();

        if let Some(session) = session {
            match Self::encode(session) {
                Ok(encoded) => pairs.extend(
                    self.chunks(&encoded)
                        .into_iter()
                        .map(|(name, value)| format!("{}={}", name, value)),
                ),
                Err(e) => tracing::error!(error = %e, "Failed to encode session cookie"),
            }
        }

        headers.remove(header::COOKIE);
        if pairs.is_empty() {
            return;
        }
        match HeaderValue::from_str(&pairs.join("; ")) {
            Ok(value) => {
                headers.insert(header::COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "Dropping unrepresentable Cookie header"),
        }
    }
}
