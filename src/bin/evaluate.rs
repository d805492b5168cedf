//! Batch evaluation entry point: runs the pipeline over the labeled cases
//! file, prints a per-metric summary, and writes the results table as CSV.

use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use careplan::config::Config;
use careplan::eval;
use careplan::TreatmentPipeline;

const DEFAULT_CASES_PATH: &str = "./eval/cases.yaml";
const DEFAULT_RESULTS_PATH: &str = "./eval/results.csv";

fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let pipeline = TreatmentPipeline::from_config(&config)?;

    let cases_path =
        std::env::var("EVAL_CASES_PATH").unwrap_or_else(|_| DEFAULT_CASES_PATH.to_string());
    let results_path =
        std::env::var("EVAL_RESULTS_PATH").unwrap_or_else(|_| DEFAULT_RESULTS_PATH.to_string());

    let cases = eval::load_cases(Path::new(&cases_path))?;
    let scores = eval::evaluate_all(&pipeline, &cases)?;

    for summary in eval::summarize(&scores) {
        println!(
            "{:<14} mean {:.4}  min {:.4}  max {:.4}",
            summary.name, summary.mean, summary.min, summary.max
        );
    }

    eval::write_csv(&scores, Path::new(&results_path))?;
    tracing::info!(path = %results_path, cases = scores.len(), "wrote evaluation results");
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(error) = run() {
        eprintln!("Evaluation failed: {error}");
        std::process::exit(1);
    }
}
