// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reactive auth state for the UI tree.
//!
//! The provider fetches the verified user and profile on mount and again on
//! every session-change event. Fetches may overlap; each one takes a
//! generation number and only the newest generation may publish.

use crate::client::{AuthEvent, ClientSession};
use crate::db::Access;
use crate::error::BackendError;
use crate::models::{Profile, ProfileLookup, User};
use crate::services::{IdentityProvider, ProfileService};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

/// Auth state exposed to the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub profile: Option<Profile>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Mounted auth provider. Dropping it unsubscribes from session events and
/// aborts in-flight fetches.
pub struct AuthProvider {
    state: watch::Receiver<AuthState>,
    listener: JoinHandle<()>,
}

struct Loader {
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileService,
    session: ClientSession,
    generation: AtomicU64,
    state: watch::Sender<AuthState>,
}

impl AuthProvider {
    /// Mount the provider. Must be called from within a Tokio runtime.
    pub fn mount(
        identity: Arc<dyn IdentityProvider>,
        profiles: ProfileService,
        session: ClientSession,
    ) -> Self {
        let (tx, rx) = watch::channel(AuthState {
            loading: true,
            ..AuthState::default()
        });

        // Subscribe before the initial fetch so no event is missed.
        let events = session.subscribe();
        let loader = Arc::new(Loader {
            identity,
            profiles,
            session,
            generation: AtomicU64::new(0),
            state: tx,
        });

        Self {
            state: rx,
            listener: tokio::spawn(listen(loader, events)),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`.
    pub async fn wait_for(&self, predicate: impl FnMut(&AuthState) -> bool) -> AuthState {
        let mut rx = self.state.clone();
        let state = match rx.wait_for(predicate).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Tear the provider down.
    pub fn unmount(self) {}
}

impl Drop for AuthProvider {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(loader: Arc<Loader>, mut events: broadcast::Receiver<AuthEvent>) {
    let mut inflight = JoinSet::new();
    inflight.spawn(loader.clone().load());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    tracing::debug!(kind = ?event.kind, "Session changed, reloading auth state");
                    inflight.spawn(loader.clone().load());
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed session events, reloading auth state");
                    inflight.spawn(loader.clone().load());
                }
                Err(RecvError::Closed) => break,
            },
            Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
        }
    }

    while inflight.join_next().await.is_some() {}
}

impl Loader {
    async fn load(self: Arc<Self>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| state.loading = true);

        let next = self.fetch().await;

        // Checked under the channel lock, so an older fetch can never
        // overwrite the result of a newer one.
        let published = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next;
            true
        });

        if !published {
            tracing::debug!(generation, "Discarded stale auth state");
        }
    }

    async fn fetch(&self) -> AuthState {
        let Some(session) = self.session.current().await else {
            return AuthState::default();
        };

        // Never trust the user embedded in the session or event.
        let user = match self.identity.get_user(&session.access_token).await {
            Ok(user) => user,
            Err(BackendError::Unauthorized(_)) => return AuthState::default(),
            Err(e) => {
                return AuthState {
                    error: Some(e.to_string()),
                    ..AuthState::default()
                }
            }
        };

        let (profile, error) = match self
            .profiles
            .fetch_profile(Access::User(&session.access_token), user.id)
            .await
        {
            ProfileLookup::Found(profile) => (Some(profile), None),
            ProfileLookup::NotFound => (None, None),
            ProfileLookup::TransientError(msg) => (None, Some(msg)),
        };

        AuthState {
            user: Some(user),
            profile,
            loading: false,
            error,
        }
    }
}
