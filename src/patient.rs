//! Patient input: loosely-shaped raw records, validation, and the canonical
//! form consumed by the prompt assembler.

use core::fmt;

use itertools::Itertools;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Validation errors for raw patient input.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`symptoms` must be a non-empty description or list of symptoms")]
    EmptySymptoms,
    #[error("`location` must be a non-empty string")]
    EmptyLocation,
}

/// Validation result.
pub type Result<T> = core::result::Result<T, Error>;

/// Symptoms as supplied: one descriptive string, or a list of entries.
///
/// The canonical representation after [`normalize`] is a single string; list
/// input is joined with `", "`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Symptoms {
    /// A free-text description, ideally covering onset, duration, severity,
    /// character, and alleviating/aggravating factors.
    Text(String),
    /// Individual symptom entries.
    List(Vec<String>),
}

/// One condition value: a scalar or a list of scalars.
///
/// Numbers and booleans deserialize to their string form, so `age: 50` and
/// `age: "50"` are the same value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// A single value.
    One(String),
    /// Several values for the same key.
    Many(Vec<String>),
}

impl ConditionValue {
    /// Flatten to the string form used in prompt slots.
    pub fn flattened(&self) -> String {
        match self {
            ConditionValue::One(value) => value.clone(),
            ConditionValue::Many(values) => values.join(", "),
        }
    }

    fn trimmed(self) -> Self {
        match self {
            ConditionValue::One(value) => ConditionValue::One(value.trim().to_string()),
            ConditionValue::Many(values) => ConditionValue::Many(
                values
                    .into_iter()
                    .map(|value| value.trim().to_string())
                    .collect(),
            ),
        }
    }
}

/// Scalar that accepts strings, numbers, and booleans.
struct Scalar(String);

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScalarVisitor;

        impl<'de> Visitor<'de> for ScalarVisitor {
            type Value = Scalar;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string, number, or boolean")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> core::result::Result<Scalar, E> {
                Ok(Scalar(value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> core::result::Result<Scalar, E> {
                Ok(Scalar(value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> core::result::Result<Scalar, E> {
                Ok(Scalar(value.to_string()))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> core::result::Result<Scalar, E> {
                Ok(Scalar(value.to_string()))
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> core::result::Result<Scalar, E> {
                Ok(Scalar(value.to_string()))
            }
        }

        deserializer.deserialize_any(ScalarVisitor)
    }
}

impl<'de> Deserialize<'de> for ConditionValue {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = ConditionValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a scalar or a sequence of scalars")
            }

            fn visit_str<E: de::Error>(
                self,
                value: &str,
            ) -> core::result::Result<ConditionValue, E> {
                Ok(ConditionValue::One(value.to_string()))
            }

            fn visit_i64<E: de::Error>(
                self,
                value: i64,
            ) -> core::result::Result<ConditionValue, E> {
                Ok(ConditionValue::One(value.to_string()))
            }

            fn visit_u64<E: de::Error>(
                self,
                value: u64,
            ) -> core::result::Result<ConditionValue, E> {
                Ok(ConditionValue::One(value.to_string()))
            }

            fn visit_f64<E: de::Error>(
                self,
                value: f64,
            ) -> core::result::Result<ConditionValue, E> {
                Ok(ConditionValue::One(value.to_string()))
            }

            fn visit_bool<E: de::Error>(
                self,
                value: bool,
            ) -> core::result::Result<ConditionValue, E> {
                Ok(ConditionValue::One(value.to_string()))
            }

            fn visit_seq<A>(self, mut seq: A) -> core::result::Result<ConditionValue, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some(Scalar(value)) = seq.next_element()? {
                    values.push(value);
                }
                Ok(ConditionValue::Many(values))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Condition details as an insertion-ordered key-value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition(Vec<(String, ConditionValue)>);

impl Condition {
    /// Append an entry, keeping insertion order.
    pub fn push(&mut self, key: impl Into<String>, value: ConditionValue) {
        self.0.push((key.into(), value));
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, ConditionValue)> {
        self.0.iter()
    }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn trimmed(self) -> Self {
        Condition(
            self.0
                .into_iter()
                .map(|(key, value)| (key.trim().to_string(), value.trimmed()))
                .collect(),
        )
    }
}

impl FromIterator<(String, ConditionValue)> for Condition {
    fn from_iter<T: IntoIterator<Item = (String, ConditionValue)>>(entries: T) -> Self {
        Condition(entries.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ConditionVisitor;

        impl<'de> Visitor<'de> for ConditionVisitor {
            type Value = Condition;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping of condition details")
            }

            fn visit_map<A>(self, mut map: A) -> core::result::Result<Condition, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, ConditionValue>()? {
                    entries.push((key, value));
                }
                Ok(Condition(entries))
            }
        }

        deserializer.deserialize_map(ConditionVisitor)
    }
}

/// Raw patient input before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPatientInput {
    /// Symptom description or list.
    pub symptoms: Symptoms,
    /// Key-value condition details.
    pub condition: Condition,
    /// Free-text address.
    pub location: String,
}

/// Canonical patient record: trimmed, validated, symptoms flattened to one
/// string. Constructed per request and discarded after use.
#[derive(Debug, Clone)]
pub struct PatientRecord {
    /// Symptom description.
    pub symptoms: String,
    /// Condition details in insertion order.
    pub condition: Condition,
    /// Free-text address.
    pub location: String,
}

/// Validate and reshape raw input into the canonical record.
pub fn normalize(raw: RawPatientInput) -> Result<PatientRecord> {
    let symptoms = match raw.symptoms {
        Symptoms::Text(text) => text.trim().to_string(),
        Symptoms::List(entries) => entries
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .join(", "),
    };
    if symptoms.is_empty() {
        return Err(Error::EmptySymptoms);
    }
    let location = raw.location.trim().to_string();
    if location.is_empty() {
        return Err(Error::EmptyLocation);
    }
    Ok(PatientRecord {
        symptoms,
        condition: raw.condition.trimmed(),
        location,
    })
}

/// Parse semicolon-separated `key:value` condition segments.
///
/// Values that look like a bracketed list, or that contain commas, become
/// list values. Malformed segments (no `:`) are skipped with a warning
/// rather than failing the whole request.
pub fn parse_condition(raw: &str) -> Condition {
    let mut condition = Condition::default();
    for segment in raw.split(';') {
        if segment.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = segment.split_once(':') else {
            tracing::warn!(segment = segment.trim(), "skipping malformed condition segment");
            continue;
        };
        condition.push(key.trim(), parse_condition_value(value.trim()));
    }
    condition
}

fn parse_condition_value(value: &str) -> ConditionValue {
    let bracketed = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'));
    if let Some(inner) = bracketed {
        return ConditionValue::Many(split_list(inner, true));
    }
    if value.contains(',') {
        return ConditionValue::Many(split_list(value, false));
    }
    ConditionValue::One(value.to_string())
}

fn split_list(raw: &str, quoted: bool) -> Vec<String> {
    raw.split(',')
        .map(|item| {
            let item = item.trim();
            if quoted {
                item.trim_matches(|c| c == '\'' || c == '"').trim()
            } else {
                item
            }
        })
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Split a comma-separated symptom line into entries, dropping blanks.
pub fn parse_symptom_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn condition_of(entries: &[(&str, ConditionValue)]) -> Condition {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn normalizes_text_symptoms() {
        let record = normalize(RawPatientInput {
            symptoms: Symptoms::Text("  chest pain  ".to_string()),
            condition: Condition::default(),
            location: " Covington, KY ".to_string(),
        })
        .unwrap();
        assert_eq!(record.symptoms, "chest pain");
        assert_eq!(record.location, "Covington, KY");
    }

    #[test]
    fn joins_symptom_list_into_one_string() {
        let record = normalize(RawPatientInput {
            symptoms: Symptoms::List(vec![
                "chest pain".to_string(),
                "  ".to_string(),
                " fever ".to_string(),
            ]),
            condition: Condition::default(),
            location: "x".to_string(),
        })
        .unwrap();
        assert_eq!(record.symptoms, "chest pain, fever");
    }

    #[test]
    fn rejects_empty_symptoms() {
        let result = normalize(RawPatientInput {
            symptoms: Symptoms::Text(String::new()),
            condition: Condition::default(),
            location: "x".to_string(),
        });
        assert!(matches!(result, Err(Error::EmptySymptoms)));
    }

    #[test]
    fn rejects_blank_symptom_list() {
        let result = normalize(RawPatientInput {
            symptoms: Symptoms::List(vec![" ".to_string()]),
            condition: Condition::default(),
            location: "x".to_string(),
        });
        assert!(matches!(result, Err(Error::EmptySymptoms)));
    }

    #[test]
    fn rejects_empty_location() {
        let result = normalize(RawPatientInput {
            symptoms: Symptoms::Text("fever".to_string()),
            condition: Condition::default(),
            location: "  ".to_string(),
        });
        assert!(matches!(result, Err(Error::EmptyLocation)));
    }

    #[test]
    fn parses_scalar_and_list_values() {
        let condition = parse_condition("age:65; allergies:penicillin, sulfa; mobility:limited");
        assert_eq!(
            condition,
            condition_of(&[
                ("age", ConditionValue::One("65".to_string())),
                (
                    "allergies",
                    ConditionValue::Many(vec!["penicillin".to_string(), "sulfa".to_string()])
                ),
                ("mobility", ConditionValue::One("limited".to_string())),
            ])
        );
    }

    #[test]
    fn parses_bracketed_list_values() {
        let condition = parse_condition("medications:['aspirin', \"ibuprofen\"]");
        assert_eq!(
            condition,
            condition_of(&[(
                "medications",
                ConditionValue::Many(vec!["aspirin".to_string(), "ibuprofen".to_string()])
            )])
        );
    }

    #[test]
    fn skips_malformed_segments() {
        let condition = parse_condition("age:65; nonsense; allergies:none");
        assert_eq!(condition.len(), 2);
        assert_eq!(
            condition.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>(),
            vec!["age", "allergies"]
        );
    }

    #[test]
    fn splits_symptom_lines() {
        assert_eq!(
            parse_symptom_list("chest pain, , shortness of breath "),
            vec!["chest pain", "shortness of breath"]
        );
    }

    #[test]
    fn deserializes_condition_preserving_order_and_scalars() {
        let condition: Condition =
            serde_yaml::from_str("age: 68\nmobility: limited\nallergies: [aspirin]\n").unwrap();
        assert_eq!(
            condition,
            condition_of(&[
                ("age", ConditionValue::One("68".to_string())),
                ("mobility", ConditionValue::One("limited".to_string())),
                ("allergies", ConditionValue::Many(vec!["aspirin".to_string()])),
            ])
        );
    }

    #[test]
    fn deserializes_symptoms_from_string_or_list() {
        let raw: RawPatientInput = serde_json::from_str(
            r#"{"symptoms": ["chest pain"], "condition": {"age": 50}, "location": "NY"}"#,
        )
        .unwrap();
        assert!(matches!(raw.symptoms, Symptoms::List(_)));
        let raw: RawPatientInput = serde_json::from_str(
            r#"{"symptoms": "chest pain", "condition": {}, "location": "NY"}"#,
        )
        .unwrap();
        assert!(matches!(raw.symptoms, Symptoms::Text(_)));
    }
}
