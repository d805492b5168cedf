//! Batch evaluation of generated plans against labeled reference text.
//!
//! Runs the full pipeline per case, scores each generated plan with the
//! metrics in [`metrics`], and writes a CSV results table. Purely
//! descriptive: no pass/fail gate.

pub mod metrics;

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::patient::{parse_condition, Condition, RawPatientInput, Symptoms};
use crate::TreatmentPipeline;

/// Evaluation harness errors.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read cases file {path}: {source}")]
    CasesFile {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse cases file: {0}")]
    CasesFormat(#[from] serde_yaml::Error),
    #[error("cannot write results to {path}: {source}")]
    ResultsFile {
        /// Path that could not be written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    #[error("case {id} failed: {source}")]
    CaseFailed {
        /// The failing case.
        id: String,
        /// The pipeline error.
        #[source]
        source: Box<crate::Error>,
    },
}

/// Evaluation result.
pub type Result<T> = core::result::Result<T, Error>;

/// Condition as written in a cases file: a mapping, or a raw
/// `key:value; ...` string parsed like the CLI input.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CaseCondition {
    /// Already a mapping.
    Mapping(Condition),
    /// Free-text segments.
    Raw(String),
}

impl CaseCondition {
    fn into_condition(self) -> Condition {
        match self {
            CaseCondition::Mapping(condition) => condition,
            CaseCondition::Raw(raw) => parse_condition(&raw),
        }
    }
}

/// One labeled test case.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalCase {
    /// Case identifier, carried into the results table.
    pub id: String,
    /// Symptom description, comma-separated for the urgency check.
    pub symptoms: String,
    /// Condition details.
    pub condition: CaseCondition,
    /// Free-text address.
    pub location: String,
    /// Reference plan to score against.
    pub gold_plan: String,
}

/// Scores for one evaluated case.
#[derive(Debug, Clone)]
pub struct CaseScores {
    /// Case identifier.
    pub id: String,
    /// Sentence-level BLEU against the reference plan.
    pub bleu: f64,
    /// ROUGE-L F-measure against the reference plan.
    pub rouge_l: f64,
    /// Required-section rubric score.
    pub completeness: f64,
    /// Urgency-tier match score.
    pub urgency: f64,
}

/// Per-metric aggregate over all cases.
#[derive(Debug, Clone)]
pub struct MetricSummary {
    /// Metric name.
    pub name: &'static str,
    /// Mean over cases.
    pub mean: f64,
    /// Smallest case score.
    pub min: f64,
    /// Largest case score.
    pub max: f64,
}

/// Load labeled cases from a YAML file.
pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let raw = fs::read_to_string(path).map_err(|source| Error::CasesFile {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(Error::CasesFormat)
}

/// Run the pipeline for one case and score the generated plan.
pub fn evaluate_case(pipeline: &TreatmentPipeline, case: &EvalCase) -> Result<CaseScores> {
    let raw = RawPatientInput {
        symptoms: Symptoms::Text(case.symptoms.clone()),
        condition: case.condition.clone().into_condition(),
        location: case.location.clone(),
    };
    let plan = pipeline
        .generate_plan(raw)
        .map_err(|source| Error::CaseFailed {
            id: case.id.clone(),
            source: Box::new(source),
        })?;
    Ok(score_plan(&case.id, &case.gold_plan, &plan, &case.symptoms))
}

/// Score a generated plan against its reference.
pub fn score_plan(id: &str, reference: &str, plan: &str, symptoms: &str) -> CaseScores {
    CaseScores {
        id: id.to_string(),
        bleu: metrics::bleu_score(reference, plan),
        rouge_l: metrics::rouge_l_score(reference, plan),
        completeness: metrics::completeness_score(plan),
        urgency: metrics::urgency_validation(plan, symptoms),
    }
}

/// Evaluate every case in order.
pub fn evaluate_all(pipeline: &TreatmentPipeline, cases: &[EvalCase]) -> Result<Vec<CaseScores>> {
    cases
        .iter()
        .map(|case| {
            tracing::info!(id = %case.id, "evaluating case");
            evaluate_case(pipeline, case)
        })
        .collect()
}

/// Mean/min/max per metric over all cases.
pub fn summarize(scores: &[CaseScores]) -> Vec<MetricSummary> {
    if scores.is_empty() {
        return Vec::new();
    }
    let columns: [(&'static str, fn(&CaseScores) -> f64); 4] = [
        ("bleu", |s| s.bleu),
        ("rouge_l", |s| s.rouge_l),
        ("completeness", |s| s.completeness),
        ("urgency", |s| s.urgency),
    ];
    columns
        .into_iter()
        .map(|(name, column)| {
            let values: Vec<f64> = scores.iter().map(column).collect();
            MetricSummary {
                name,
                mean: values.iter().sum::<f64>() / values.len() as f64,
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            }
        })
        .collect()
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render the results table as CSV text.
pub fn render_csv(scores: &[CaseScores]) -> String {
    let mut out = String::from("id,bleu,rouge_l,completeness,urgency\n");
    for score in scores {
        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "{},{:.4},{:.4},{:.4},{:.4}",
            csv_field(&score.id),
            score.bleu,
            score.rouge_l,
            score.completeness,
            score.urgency
        );
    }
    out
}

/// Write the results table to `path`.
pub fn write_csv(scores: &[CaseScores], path: &Path) -> Result<()> {
    fs::write(path, render_csv(scores)).map_err(|source| Error::ResultsFile {
        path: path.display().to_string(),
        source,
    })
}
