//! Scoring of generated plans: lexical overlap with reference text plus
//! rule-based rubric checks.

use std::collections::HashMap;

/// Section headers a complete plan must contain.
pub const REQUIRED_SECTIONS: &[&str] = &[
    "Immediate Action and Urgency Assessment",
    "Recommended Medical Actions",
];

/// Expected urgency tier per symptom, the coarse triage mapping used by
/// [`urgency_validation`].
const SYMPTOM_URGENCY: &[(&str, &str)] = &[
    ("chest pain", "immediate"),
    ("shortness of breath", "immediate"),
    ("fever", "24h"),
    ("headache", "48h"),
];

const BLEU_MAX_ORDER: usize = 4;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

fn ngram_counts<'a>(tokens: &'a [String], n: usize) -> HashMap<&'a [String], usize> {
    let mut counts = HashMap::new();
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

fn modified_precision(reference: &[String], hypothesis: &[String], n: usize) -> f64 {
    let reference_counts = ngram_counts(reference, n);
    let hypothesis_counts = ngram_counts(hypothesis, n);
    let total: usize = hypothesis_counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let clipped: usize = hypothesis_counts
        .iter()
        .map(|(gram, count)| (*count).min(reference_counts.get(gram).copied().unwrap_or(0)))
        .sum();
    clipped as f64 / total as f64
}

fn brevity_penalty(reference_len: usize, hypothesis_len: usize) -> f64 {
    if hypothesis_len >= reference_len {
        1.0
    } else {
        (1.0 - reference_len as f64 / hypothesis_len as f64).exp()
    }
}

/// Sentence-level BLEU of `hypothesis` against `reference`.
///
/// Clipped modified n-gram precision for n = 1..=4 with uniform weights,
/// combined as a geometric mean and scaled by the brevity penalty. Any order
/// with no match scores 0, so very short texts score 0.
pub fn bleu_score(reference: &str, hypothesis: &str) -> f64 {
    let reference = tokenize(reference);
    let hypothesis = tokenize(hypothesis);
    if reference.is_empty() || hypothesis.is_empty() {
        return 0.0;
    }
    let mut log_sum = 0.0;
    for n in 1..=BLEU_MAX_ORDER {
        let precision = modified_precision(&reference, &hypothesis, n);
        if precision == 0.0 {
            return 0.0;
        }
        log_sum += precision.ln();
    }
    let precision = (log_sum / BLEU_MAX_ORDER as f64).exp();
    brevity_penalty(reference.len(), hypothesis.len()) * precision
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            current[j + 1] = if x == y {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// ROUGE-L F-measure of `hypothesis` against `reference`.
///
/// Longest-common-subsequence over lowercased word tokens; recall against
/// the reference, precision against the hypothesis, combined harmonically.
pub fn rouge_l_score(reference: &str, hypothesis: &str) -> f64 {
    let reference = tokenize(reference);
    let hypothesis = tokenize(hypothesis);
    if reference.is_empty() || hypothesis.is_empty() {
        return 0.0;
    }
    let lcs = lcs_len(&reference, &hypothesis) as f64;
    if lcs == 0.0 {
        return 0.0;
    }
    let precision = lcs / hypothesis.len() as f64;
    let recall = lcs / reference.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Fraction of [`REQUIRED_SECTIONS`] found in the plan, case-insensitively.
pub fn completeness_score(plan: &str) -> f64 {
    let plan = plan.to_lowercase();
    let hits = REQUIRED_SECTIONS
        .iter()
        .filter(|section| plan.contains(&section.to_lowercase()))
        .count();
    hits as f64 / REQUIRED_SECTIONS.len() as f64
}

/// Fraction of the comma-separated `symptoms` whose expected urgency tier
/// appears as a substring of the plan. A symptom outside the mapping counts
/// against the score; an empty symptom list scores 1.0.
pub fn urgency_validation(plan: &str, symptoms: &str) -> f64 {
    let listed: Vec<String> = symptoms
        .split(',')
        .map(|symptom| symptom.trim().to_lowercase())
        .filter(|symptom| !symptom.is_empty())
        .collect();
    if listed.is_empty() {
        return 1.0;
    }
    let plan = plan.to_lowercase();
    let correct = listed
        .iter()
        .filter(|symptom| {
            SYMPTOM_URGENCY
                .iter()
                .find(|(name, _)| *name == symptom.as_str())
                .is_some_and(|(_, tier)| plan.contains(tier))
        })
        .count();
    correct as f64 / listed.len() as f64
}
