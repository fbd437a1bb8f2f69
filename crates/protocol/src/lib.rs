//! Wire types for the storefront analytics API.
//!
//! This crate contains the serde-serializable types exchanged with the
//! analytics service over REST, plus the consent record persisted in
//! browser local storage. These types represent the "protocol layer" -
//! the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with the API: Match the analytics service's JSON contract
//! * Stable: Changes only when the wire contract changes
//!
//! The session lifecycle built on top of these types lives in `beacon-core`.

pub mod consent;
pub mod endpoints;
pub mod session;

pub use consent::*;
pub use session::*;
