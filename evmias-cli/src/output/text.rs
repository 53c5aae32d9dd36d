//! Text output formatting with colors.

use evmias_records::{HospitalizationBundle, HospitalizationSummary};

use super::json::{ProbeOutput, SessionOutput};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Placeholder for fields the portal left empty.
const MISSING: &str = "-";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Formats a session: cache location and shortened cookies.
    pub fn format_session(&self, session: &SessionOutput) -> String {
        let mut lines = vec![format!(
            "{} {}",
            self.bold("Session"),
            self.dim(&format!("(key {}, ttl {}s)", session.cache_key, session.ttl_secs))
        )];
        for (name, value) in &session.cookies {
            lines.push(format!("  {name:<14} {value}"));
        }
        lines.join("\n")
    }

    /// Formats a probe result.
    pub fn format_probe(&self, probe: &ProbeOutput) -> String {
        let status = match (probe.cached, probe.valid) {
            (false, _) => self.color(YELLOW, "✗ No cached session"),
            (true, false) => self.color(RED, "✗ Rejected by the portal"),
            (true, true) => self.color(GREEN, "✓ Valid"),
        };
        format!("{:<15} {status}", probe.key)
    }

    /// Formats a hospitalization bundle.
    pub fn format_bundle(&self, bundle: &HospitalizationBundle) -> String {
        let mut lines = Vec::new();

        lines.push(self.bold("Patient"));
        match &bundle.person {
            Some(person) => {
                let name = [&person.last_name, &person.first_name, &person.middle_name]
                    .into_iter()
                    .filter_map(|part| part.as_deref())
                    .collect::<Vec<_>>()
                    .join(" ");
                lines.push(format!("  Name:      {}", or_missing(Some(name.as_str()))));
                lines.push(format!("  Birthday:  {}", or_missing(person.birthday.as_deref())));
                lines.push(format!("  Sex:       {}", or_missing(person.sex.as_deref())));
                lines.push(format!("  Policy:    {}", or_missing(person.policy_number.as_deref())));
            }
            None => lines.push(self.unavailable()),
        }

        lines.push(self.bold("Movement"));
        match &bundle.movement {
            Some(movement) => {
                lines.push(format!("  Department: {}", or_missing(movement.department.as_deref())));
                lines.push(format!("  Bed:        {}", or_missing(movement.bed_profile.as_deref())));
                lines.push(format!(
                    "  Diagnosis:  {} {}",
                    or_missing(movement.diagnosis_code.as_deref()),
                    movement.diagnosis_name.as_deref().unwrap_or_default()
                ));
            }
            None => lines.push(self.unavailable()),
        }

        lines.push(self.bold("Referral"));
        match &bundle.referral {
            Some(referral) => {
                let org = bundle
                    .referring_organization
                    .as_ref()
                    .and_then(|org| org.name.as_deref());
                lines.push(format!("  Type:      {}", or_missing(referral.prehosp_type_id.as_deref())));
                lines.push(format!("  Referred:  {}", or_missing(org)));
            }
            None => lines.push(self.unavailable()),
        }

        if let Some(disease) = &bundle.disease {
            lines.push(self.bold("Outcome"));
            lines.push(format!("  Result:    {}", or_missing(disease.outcome_id.as_deref())));
            lines.push(format!("  Type:      {}", or_missing(disease.disease_type_id.as_deref())));
        }

        lines.push(format!(
            "{} {}",
            self.bold("Services"),
            self.dim(&format!("({} total)", bundle.services.len()))
        ));
        for operation in &bundle.operations {
            lines.push(format!("  {:<12} {}", operation.code, operation.name));
        }

        if !bundle.failures.is_empty() {
            lines.push(self.color(YELLOW, "Incomplete"));
            for failure in &bundle.failures {
                lines.push(format!("  {}", self.dim(failure)));
            }
        }

        lines.join("\n")
    }

    /// Formats search results as a table.
    pub fn format_search(&self, rows: &[HospitalizationSummary]) -> String {
        if rows.is_empty() {
            return self.dim("No hospitalizations found");
        }

        let mut lines = vec![self.bold(&format!(
            "{:<20} {:<20} {:<12} {:<12} {:<12} {}",
            "Event", "Person", "Card", "Admitted", "Discharged", "Department"
        ))];
        for row in rows {
            lines.push(format!(
                "{:<20} {:<20} {:<12} {:<12} {:<12} {}",
                or_missing(row.event_id.as_deref()),
                or_missing(row.person_id.as_deref()),
                or_missing(row.card_number.as_deref()),
                or_missing(row.admitted.as_deref()),
                or_missing(row.discharged.as_deref()),
                or_missing(row.department.as_deref()),
            ));
        }
        lines.join("\n")
    }

    fn unavailable(&self) -> String {
        format!("  {}", self.dim("unavailable"))
    }

    fn bold(&self, text: &str) -> String {
        self.color(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.color(DIM, text)
    }

    fn color(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

fn or_missing(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(MISSING)
}
