// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # EVMIAS Session
//!
//! Session lifecycle for the EVMIAS bridge.
//!
//! - [`SessionManager`]: cache, probe, acquire, store
//! - [`AcquisitionProtocol`]: handshake, logon, token exchange
//! - [`SessionStore`] over a [`SessionCache`] backend (memory, file, redis)
//!
//! ## Usage
//!
//! ```ignore
//! use evmias_session::SessionManager;
//!
//! let manager = SessionManager::from_settings(&settings)?;
//! let cookies = manager.get_valid_session().await?;
//! ```

pub mod cache;
pub mod error;
pub mod file_cache;
pub mod manager;
pub mod protocol;
#[cfg(feature = "redis")]
pub mod redis_cache;
pub mod store;

#[cfg(test)]
mod test_support;

pub use cache::{MemorySessionCache, SessionCache, cache_from_settings};
pub use error::{CacheError, SessionError};
pub use file_cache::FileSessionCache;
pub use manager::SessionManager;
pub use protocol::{AcquisitionProtocol, AcquisitionState, ProtocolStep};
#[cfg(feature = "redis")]
pub use redis_cache::RedisSessionCache;
pub use store::SessionStore;
