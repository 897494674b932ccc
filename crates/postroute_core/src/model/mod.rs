//! Domain model for correspondence routes.
//!
//! # Responsibility
//! - Define places, correspondents, postmarks and correspondence items.
//! - Define the derived route projection (waypoints and edges).
//!
//! # Invariants
//! - Every persisted record is identified by a stable UUID.
//! - Places are shared by reference; items never own place records.
//! - Routes are derived data and never the source of truth.

pub mod correspondence;
pub mod place;
pub mod route;
pub mod validation;
