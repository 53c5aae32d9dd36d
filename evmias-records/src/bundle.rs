//! Hospitalization bundle.
//!
//! Collects everything known about one hospitalization in two concurrent
//! stages. The first stage needs only the identifiers; the second needs
//! keys found in the first (the movement's section id and the referral's
//! organization). A sub-fetch that fails leaves its part empty and is
//! listed in `failures`.

use evmias_core::CookieSet;
use evmias_fetch::{TaskOutcome, gather_all, gather_all_until};
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::api::UpstreamApi;
use crate::error::RecordError;
use crate::records::{
    DiseaseRecord, MovementRecord, Operation, OrganizationRecord, PersonRecord, ReferralRecord,
    ServiceRecord, operations,
};

/// Everything fetched for one hospitalization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HospitalizationBundle {
    /// Patient demographics.
    pub person: Option<PersonRecord>,
    /// First ward movement.
    pub movement: Option<MovementRecord>,
    /// Admission card.
    pub referral: Option<ReferralRecord>,
    /// Discharge form of the movement.
    pub disease: Option<DiseaseRecord>,
    /// Organization that referred the patient, if another one did.
    pub referring_organization: Option<OrganizationRecord>,
    /// All rendered services.
    pub services: Vec<ServiceRecord>,
    /// Operations among the services.
    pub operations: Vec<Operation>,
    /// Sub-fetches that produced nothing.
    pub failures: Vec<String>,
}

enum Fetched {
    Person(PersonRecord),
    Movement(MovementRecord),
    Referral(ReferralRecord),
    Services(Vec<ServiceRecord>),
    Disease(DiseaseRecord),
    Organization(OrganizationRecord),
}

type Task<'a> = BoxFuture<'a, Result<Fetched, RecordError>>;

/// Fetches the bundle for a hospitalization.
///
/// With a `deadline`, sub-fetches still running when it passes are
/// cancelled and reported as failures.
#[instrument(skip(api, cookies))]
pub async fn fetch_bundle(
    api: &UpstreamApi,
    cookies: &CookieSet,
    event_id: &str,
    person_id: &str,
    deadline: Option<Instant>,
) -> HospitalizationBundle {
    let mut bundle = HospitalizationBundle::default();

    let first: Vec<Task<'_>> = vec![
        Box::pin(async move { api.person(cookies, person_id).await.map(Fetched::Person) }),
        Box::pin(async move { api.movement(cookies, event_id).await.map(Fetched::Movement) }),
        Box::pin(async move { api.referral(cookies, event_id).await.map(Fetched::Referral) }),
        Box::pin(async move { api.services(cookies, event_id).await.map(Fetched::Services) }),
    ];
    let first = ["person", "movement", "referral", "services"]
        .into_iter()
        .zip(gather(first, deadline).await);
    for (label, outcome) in first {
        bundle.absorb(label, outcome);
    }

    let section_id = bundle.movement.as_ref().and_then(|m| m.section_id.clone());
    let org_id = bundle
        .referral
        .as_ref()
        .and_then(ReferralRecord::referring_org_lookup)
        .map(str::to_string);

    let mut second: Vec<(&'static str, Task<'_>)> = Vec::new();
    if let Some(section_id) = section_id {
        second.push((
            "disease",
            Box::pin(async move { api.disease(cookies, &section_id).await.map(Fetched::Disease) }),
        ));
    }
    if let Some(org_id) = org_id {
        second.push((
            "referring organization",
            Box::pin(async move {
                api.organization(cookies, &org_id)
                    .await
                    .map(Fetched::Organization)
            }),
        ));
    }
    let (labels, tasks): (Vec<_>, Vec<_>) = second.into_iter().unzip();
    for (label, outcome) in labels.into_iter().zip(gather(tasks, deadline).await) {
        bundle.absorb(label, outcome);
    }

    bundle.operations = operations(&bundle.services);
    info!(
        failures = bundle.failures.len(),
        services = bundle.services.len(),
        operations = bundle.operations.len(),
        "Bundle assembled"
    );
    bundle
}

async fn gather(tasks: Vec<Task<'_>>, deadline: Option<Instant>) -> Vec<TaskOutcome<Fetched>> {
    match deadline {
        Some(deadline) => gather_all_until(tasks, deadline).await,
        None => gather_all(tasks).await,
    }
}

impl HospitalizationBundle {
    fn absorb(&mut self, label: &str, outcome: TaskOutcome<Fetched>) {
        match outcome {
            TaskOutcome::Completed(fetched) => match fetched {
                Fetched::Person(v) => self.person = Some(v),
                Fetched::Movement(v) => self.movement = Some(v),
                Fetched::Referral(v) => self.referral = Some(v),
                Fetched::Services(v) => self.services = v,
                Fetched::Disease(v) => self.disease = Some(v),
                Fetched::Organization(v) => self.referring_organization = Some(v),
            },
            TaskOutcome::Failed(failure) => self.failures.push(format!("{label}: {failure}")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
