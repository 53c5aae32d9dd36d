//! Typed upstream records.
//!
//! The portal is inconsistent about scalar types: the same field may come
//! back as `"2"`, `2` or `null` depending on the endpoint. Every scalar is
//! therefore read through [`lenient_string`] into an `Option<String>`.
//! Fields not modelled here are kept in `extra`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `PrehospDirect_id` of a referral issued by another organization.
pub const REFERRAL_BY_OTHER_ORG: &str = "2";

/// `EvnClass_SysNick` fragment marking an operation.
const OPERATION_CLASS: &str = "EvnUslugaOper";

/// Reads a string, number or bool as a string. Null, empty strings and
/// nested values read as `None`.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Patient demographics (`Common/loadPersonData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Person identifier.
    #[serde(rename = "Person_id", default, deserialize_with = "lenient_string")]
    pub person_id: Option<String>,
    /// Last name.
    #[serde(rename = "Person_Surname", default, deserialize_with = "lenient_string")]
    pub last_name: Option<String>,
    /// First name.
    #[serde(rename = "Person_Firname", default, deserialize_with = "lenient_string")]
    pub first_name: Option<String>,
    /// Middle name.
    #[serde(rename = "Person_Secname", default, deserialize_with = "lenient_string")]
    pub middle_name: Option<String>,
    /// Birthday as shown by the portal (`dd.mm.yyyy`).
    #[serde(rename = "Person_Birthday", default, deserialize_with = "lenient_string")]
    pub birthday: Option<String>,
    /// Sex label.
    #[serde(rename = "Sex_Name", default, deserialize_with = "lenient_string")]
    pub sex: Option<String>,
    /// Unified insurance policy number.
    #[serde(rename = "Person_EdNum", default, deserialize_with = "lenient_string")]
    pub policy_number: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Ward movement within a hospitalization (`EvnSection/loadEvnSectionGrid`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    /// Movement identifier, keys the disease form.
    #[serde(rename = "EvnSection_id", default, deserialize_with = "lenient_string")]
    pub section_id: Option<String>,
    /// Department name.
    #[serde(rename = "LpuSection_Name", default, deserialize_with = "lenient_string")]
    pub department: Option<String>,
    /// Bed profile name.
    #[serde(rename = "LpuSectionBedProfile_Name", default, deserialize_with = "lenient_string")]
    pub bed_profile: Option<String>,
    /// Main diagnosis code.
    #[serde(rename = "Diag_Code", default, deserialize_with = "lenient_string")]
    pub diagnosis_code: Option<String>,
    /// Main diagnosis name.
    #[serde(rename = "Diag_Name", default, deserialize_with = "lenient_string")]
    pub diagnosis_name: Option<String>,
    /// Discharge type code.
    #[serde(rename = "LeaveType_Code", default, deserialize_with = "lenient_string")]
    pub leave_type_code: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Admission card (`EvnPS/loadEvnPSEditForm`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferralRecord {
    /// Hospitalization identifier.
    #[serde(rename = "EvnPS_id", default, deserialize_with = "lenient_string")]
    pub event_id: Option<String>,
    /// Who referred the patient.
    #[serde(rename = "PrehospDirect_id", default, deserialize_with = "lenient_string")]
    pub prehosp_direct_id: Option<String>,
    /// Admission type.
    #[serde(rename = "PrehospType_id", default, deserialize_with = "lenient_string")]
    pub prehosp_type_id: Option<String>,
    /// Referring organization identifier.
    #[serde(rename = "Org_did", default, deserialize_with = "lenient_string")]
    pub referring_org_id: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ReferralRecord {
    /// Organization to look up, when the referral came from another organization.
    pub fn referring_org_lookup(&self) -> Option<&str> {
        if self.prehosp_direct_id.as_deref() == Some(REFERRAL_BY_OTHER_ORG) {
            self.referring_org_id.as_deref()
        } else {
            None
        }
    }
}

/// Discharge form of a movement (`EvnSection/loadEvnSectionEditForm`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    /// Treatment outcome identifier.
    #[serde(rename = "ResultDesease_id", default, deserialize_with = "lenient_string")]
    pub outcome_id: Option<String>,
    /// Disease character identifier.
    #[serde(rename = "DeseaseType_id", default, deserialize_with = "lenient_string")]
    pub disease_type_id: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Organization (`Org/getOrgList`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    /// Organization identifier.
    #[serde(rename = "Org_id", default, deserialize_with = "lenient_string")]
    pub org_id: Option<String>,
    /// Full name.
    #[serde(rename = "Org_Name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Medical service rendered during a hospitalization (`EvnUsluga/loadEvnUslugaGrid`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Service class, e.g. `EvnUslugaOper`.
    #[serde(rename = "EvnClass_SysNick", default, deserialize_with = "lenient_string")]
    pub class: Option<String>,
    /// Service code.
    #[serde(rename = "Usluga_Code", default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    /// Service name.
    #[serde(rename = "Usluga_Name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ServiceRecord {
    /// Returns true for surgical operations.
    pub fn is_operation(&self) -> bool {
        self.class
            .as_deref()
            .is_some_and(|class| class.contains(OPERATION_CLASS))
    }
}

/// Code and name of a performed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Service code.
    pub code: String,
    /// Service name.
    pub name: String,
}

/// Picks the operations out of a service list. Entries without a code are skipped.
pub fn operations(services: &[ServiceRecord]) -> Vec<Operation> {
    services
        .iter()
        .filter(|s| s.is_operation())
        .filter_map(|s| {
            let code = s.code.as_deref()?.trim();
            Some(Operation {
                code: code.to_string(),
                name: s.name.as_deref().unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// One row of the hospitalization search (`Search/searchData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HospitalizationSummary {
    /// Person identifier.
    #[serde(rename = "Person_id", default, deserialize_with = "lenient_string")]
    pub person_id: Option<String>,
    /// Hospitalization identifier.
    #[serde(rename = "EvnPS_id", default, deserialize_with = "lenient_string")]
    pub event_id: Option<String>,
    /// Medical card number.
    #[serde(rename = "EvnPS_NumCard", default, deserialize_with = "lenient_string")]
    pub card_number: Option<String>,
    /// Admission date.
    #[serde(rename = "EvnPS_setDate", default, deserialize_with = "lenient_string")]
    pub admitted: Option<String>,
    /// Discharge date.
    #[serde(rename = "EvnPS_disDate", default, deserialize_with = "lenient_string")]
    pub discharged: Option<String>,
    /// Department name.
    #[serde(rename = "LpuSection_Name", default, deserialize_with = "lenient_string")]
    pub department: Option<String>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
