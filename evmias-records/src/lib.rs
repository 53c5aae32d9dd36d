// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # EVMIAS Records
//!
//! Typed readers for the portal resources the bridge consumes.
//!
//! - [`UpstreamApi`]: one fetcher per resource, narrowing payloads into records
//! - [`fetch_bundle`]: all parts of one hospitalization, fetched concurrently
//! - [`SearchQuery`]: hospitalization search by patient name
//!
//! ## Usage
//!
//! ```ignore
//! let cookies = sessions.get_valid_session().await?;
//! let api = UpstreamApi::new(sessions.client().clone(), settings.upstream.clone());
//! let bundle = fetch_bundle(&api, &cookies, event_id, person_id, None).await;
//! ```

pub mod api;
pub mod bundle;
pub mod error;
pub mod records;
pub mod search;

#[cfg(test)]
mod test_support;

pub use api::UpstreamApi;
pub use bundle::{HospitalizationBundle, fetch_bundle};
pub use error::RecordError;
pub use records::{
    DiseaseRecord, HospitalizationSummary, MovementRecord, Operation, OrganizationRecord,
    PersonRecord, ReferralRecord, ServiceRecord, operations,
};
pub use search::SearchQuery;
