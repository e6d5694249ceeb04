//! Core type definitions for Neoql.
//!
//! This module contains the fundamental types shared by the schema model and
//! the translation engine:
//! - Argument and parameter values ([`Value`])
//! - The ordered parameter map handed to the external driver ([`ParameterMap`])
//! - Authorization vocabulary ([`AuthOperation`], [`AuthTiming`])

mod auth;
mod params;
mod value;

pub use auth::{AuthOperation, AuthTiming};
pub use params::ParameterMap;
pub use value::Value;
