//! Core domain + application logic for the topic relay.
//!
//! This crate is framework-agnostic. The Telegram client lives behind
//! [`ports::RelayPort`], implemented in the adapter crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod forward;
pub mod logging;
pub mod mapping;
pub mod media;
pub mod ports;
pub mod routing;
pub mod throttled;

pub use errors::{Error, Result};
