//! Validator: required fields, primary-key uniqueness and numeric ranges.

use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use tracing::{info, warn};

use crate::skill::{fields, SkillRecord};

pub const COST_RANGE: RangeInclusive<i64> = 0..=7;
pub const ACCURACY_RANGE: RangeInclusive<i64> = 0..=100;

/// Placeholder used when a record has no id to report.
const UNKNOWN_ID: &str = "unknown";

/// A single problem found in the working set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingField {
        id: String,
        field: &'static str,
    },
    /// Present, but not the JSON type the field requires.
    InvalidType {
        id: String,
        field: &'static str,
    },
    DuplicateId {
        id: String,
    },
    OutOfRange {
        id: String,
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingField { id, field } => {
                write!(f, "missing required field: {id} - {field}")
            }
            Violation::InvalidType { id, field } => {
                write!(f, "invalid type: {id} - {field}")
            }
            Violation::DuplicateId { id } => write!(f, "duplicate id: {id}"),
            Violation::OutOfRange {
                id,
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "{field} out of range: {id} ({field}: {value}, expected {min}..={max})"
            ),
        }
    }
}

/// All violations found in one pass, in record order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub checked: usize,
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

/// What the import does when validation finds problems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Log the violations and continue to the replace phase.
    #[default]
    Warn,
    /// Refuse to touch the store unless the working set is clean.
    Gate,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(ValidationPolicy::Warn),
            "gate" | "strict" => Ok(ValidationPolicy::Gate),
            other => Err(format!("expected `warn` or `gate`, got `{other}`")),
        }
    }
}

/// Check every record. Never stops early and never filters records out.
pub fn validate(records: &[SkillRecord]) -> ValidationReport {
    let mut violations = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());

    for record in records {
        let id = record.id().unwrap_or(UNKNOWN_ID);

        violations.extend(record.missing_fields().map(|field| Violation::MissingField {
            id: id.to_string(),
            field,
        }));
        violations.extend(record.invalid_fields.iter().map(|&field| Violation::InvalidType {
            id: id.to_string(),
            field,
        }));

        if let Some(key) = record.id() {
            if !seen.insert(key) {
                violations.push(Violation::DuplicateId { id: key.to_string() });
            }
        }

        check_range(&mut violations, id, fields::COST, record.cost, &COST_RANGE);
        check_range(
            &mut violations,
            id,
            fields::ACCURACY,
            record.accuracy,
            &ACCURACY_RANGE,
        );
    }

    if violations.is_empty() {
        info!(records = records.len(), "validation passed");
    } else {
        warn!(
            records = records.len(),
            violations = violations.len(),
            "validation found problems"
        );
        for violation in &violations {
            warn!("  - {violation}");
        }
    }

    ValidationReport {
        checked: records.len(),
        violations,
    }
}

fn check_range(
    violations: &mut Vec<Violation>,
    id: &str,
    field: &'static str,
    value: Option<i64>,
    range: &RangeInclusive<i64>,
) {
    if let Some(value) = value.filter(|v| !range.contains(v)) {
        violations.push(Violation::OutOfRange {
            id: id.to_string(),
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        });
    }
}
