// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod identity;
pub mod memory;
pub mod profiles;

pub use identity::{IdentityClient, IdentityProvider};
pub use memory::{Fault, MemoryBackend};
pub use profiles::{ProfileService, RoleProfileOutcome};
