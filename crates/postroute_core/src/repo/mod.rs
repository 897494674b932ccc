//! Repository layer over the archive schema.
//!
//! # Responsibility
//! - Define the data-access contracts consumed by services and the route core.
//! - Keep SQL details behind those contracts.
//!
//! # Invariants
//! - Writes validate model input before touching SQL.
//! - Reads reject invalid persisted state instead of masking it.

pub mod correspondence_repo;
pub mod place_repo;
