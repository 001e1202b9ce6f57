// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (session gate, security headers).

pub mod gate;
pub mod security;

pub use gate::{session_gate, RequestSession};
pub use security::add_security_headers;
