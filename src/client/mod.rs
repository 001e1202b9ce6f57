// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side session holder and auth state provider.

pub mod provider;

pub use provider::{AuthProvider, AuthState};

use crate::models::Session;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const EVENT_CAPACITY: usize = 16;

/// Kind of session change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Session-change notification. The payload is informational only;
/// listeners re-verify with the identity backend.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

/// Browser-side session holder, the source of [`AuthEvent`]s.
#[derive(Clone)]
pub struct ClientSession {
    current: Arc<RwLock<Option<Session>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl ClientSession {
    pub fn new(initial: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            current: Arc::new(RwLock::new(initial)),
            events,
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Store a new session and notify listeners.
    pub async fn set_session(&self, kind: AuthEventKind, session: Session) {
        *self.current.write().await = Some(session.clone());
        self.notify(kind, Some(session));
    }

    pub async fn sign_out(&self) {
        *self.current.write().await = None;
        self.notify(AuthEventKind::SignedOut, None);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn notify(&self, kind: AuthEventKind, session: Option<Session>) {
        // No receivers is fine: nothing is mounted yet.
        let _ = self.events.send(AuthEvent { kind, session });
    }
}
