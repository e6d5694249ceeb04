//! Utility functions and helpers.
//!
//! - [`error`] - The error taxonomy shared by every Neoql crate
//! - [`hash`] - Deterministic hash map aliases

pub mod error;
pub mod hash;
