//! Formatting the canonical record into template slots.

use itertools::Itertools;
use serde::Serialize;

use crate::location::Facility;
use crate::patient::{ConditionValue, PatientRecord};

/// Flattened string form consumed by the plan template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptVariables {
    /// Symptom description.
    pub symptoms: String,
    /// Condition details as `key: value, key: value`.
    pub condition: String,
    /// Address, with a nearby-facility summary appended when available.
    pub location: String,
}

/// Format the canonical record plus nearby facilities into named template
/// slots. Deterministic, no external calls.
pub fn assemble(record: &PatientRecord, facilities: &[Facility]) -> PromptVariables {
    let condition = record
        .condition
        .iter()
        .map(|(key, value)| format!("{}: {}", key, flatten_value(value)))
        .join(", ");
    let location = if facilities.is_empty() {
        record.location.clone()
    } else {
        format!(
            "{} ({})",
            record.location,
            facilities.iter().map(summarize_facility).join("; ")
        )
    };
    PromptVariables {
        symptoms: record.symptoms.clone(),
        condition,
        location,
    }
}

fn flatten_value(value: &ConditionValue) -> String {
    match value {
        ConditionValue::One(value) => value.clone(),
        ConditionValue::Many(values) => values.join(", "),
    }
}

/// `name (rating) - address`; the rating is omitted when the source has none.
fn summarize_facility(facility: &Facility) -> String {
    match facility.rating {
        Some(rating) => format!("{} ({:.1}) - {}", facility.name, rating, facility.address),
        None => format!("{} - {}", facility.name, facility.address),
    }
}
