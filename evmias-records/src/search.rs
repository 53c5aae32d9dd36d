//! Hospitalization search parameters.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Payment type filter applied to every search.
const PAY_TYPE_ID: &str = "3010101000000048";

/// Hospital building filter applied to every search.
const LPU_BUILDING_ID: &str = "3010101000000467";

/// Date format used by the portal.
const PORTAL_DATE_FORMAT: &str = "%d.%m.%Y";

/// Search for a patient's hospitalizations by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Last name. Required.
    pub last_name: String,
    /// First name.
    pub first_name: Option<String>,
    /// Middle name.
    pub middle_name: Option<String>,
    /// Birthday as `dd.mm.yyyy`.
    pub birthday: Option<String>,
    /// Discharge range as `dd.mm.yyyy - dd.mm.yyyy`.
    pub discharge_range: Option<String>,
}

impl SearchQuery {
    /// Searches by last name only.
    pub fn new(last_name: impl Into<String>) -> Self {
        Self {
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// Sets the first name.
    #[must_use]
    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = Some(value.into());
        self
    }

    /// Sets the middle name.
    #[must_use]
    pub fn middle_name(mut self, value: impl Into<String>) -> Self {
        self.middle_name = Some(value.into());
        self
    }

    /// Sets the birthday.
    #[must_use]
    pub fn birthday(mut self, value: impl Into<String>) -> Self {
        self.birthday = Some(value.into());
        self
    }

    /// Sets the discharge range verbatim.
    #[must_use]
    pub fn discharge_range(mut self, value: impl Into<String>) -> Self {
        self.discharge_range = Some(value.into());
        self
    }

    /// Sets the discharge range from two dates.
    pub fn discharge_between(self, start: NaiveDate, end: NaiveDate) -> Result<Self, RecordError> {
        if start > end {
            return Err(RecordError::InvalidQuery(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(self.discharge_range(format_range(&start.format(PORTAL_DATE_FORMAT).to_string(), end)))
    }

    /// Builds the form posted to the search endpoint.
    ///
    /// Without an explicit range, the search covers `period_start` (or
    /// January 1st of the current year) through `today`.
    pub fn form_fields(
        &self,
        period_start: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<(String, String)>, RecordError> {
        let last_name = self.last_name.trim();
        if last_name.is_empty() {
            return Err(RecordError::InvalidQuery("last name is required".to_string()));
        }

        let range = match &self.discharge_range {
            Some(range) => range.clone(),
            None => {
                let start = period_start.map_or_else(
                    || format!("01.01.{}", today.year()),
                    ToString::to_string,
                );
                format_range(&start, today)
            }
        };

        let mut fields = vec![
            ("SearchFormType".to_string(), "EvnPS".to_string()),
            ("Person_Surname".to_string(), last_name.to_string()),
            ("PayType_id".to_string(), PAY_TYPE_ID.to_string()),
            ("LpuBuilding_cid".to_string(), LPU_BUILDING_ID.to_string()),
            ("EvnSection_disDate_Range".to_string(), range),
        ];
        let optional = [
            ("Person_Firname", &self.first_name),
            ("Person_Secname", &self.middle_name),
            ("Person_Birthday", &self.birthday),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                fields.push((name.to_string(), value.to_string()));
            }
        }
        Ok(fields)
    }
}

fn format_range(start: &str, end: NaiveDate) -> String {
    format!("{start} - {}", end.format(PORTAL_DATE_FORMAT))
}
