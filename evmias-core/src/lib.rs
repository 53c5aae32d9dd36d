// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # EVMIAS Core
//!
//! Core types shared by every crate of the EVMIAS session bridge:
//!
//! - [`CookieSet`] - the cookie mapping that identifies an upstream session
//! - [`Settings`] - the immutable configuration value handed to components
//! - [`CoreError`] - configuration and serialization failures

pub mod config;
pub mod cookies;
pub mod error;

pub use config::{
    CacheBackend, CacheSettings, Credentials, HttpSettings, Settings, UpstreamSettings,
};
pub use cookies::CookieSet;
pub use error::CoreError;
