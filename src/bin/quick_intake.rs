//! Quick intake: gathers symptoms as a comma-separated list instead of a
//! free-text statement, echoes the parsed condition, and prints the plan.

use std::io::{self, Write};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use careplan::config::Config;
use careplan::patient::{parse_condition, parse_symptom_list, RawPatientInput, Symptoms};
use careplan::TreatmentPipeline;

fn prompt_line(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let pipeline = TreatmentPipeline::from_config(&config)?;

    let symptoms = parse_symptom_list(&prompt_line("Enter patient symptoms (comma-separated): ")?);
    let condition = parse_condition(&prompt_line(
        "Enter physical condition details as key:value pairs \
         (e.g. age:65; allergies:penicillin, sulfa; medications:aspirin,ibuprofen): ",
    )?);
    println!("Parsed condition: {condition:?}");
    let location = prompt_line("Enter geographic location (City, State/Region, Country): ")?;

    let plan = pipeline.generate_plan(RawPatientInput {
        symptoms: Symptoms::List(symptoms),
        condition,
        location,
    })?;
    println!("\n{plan}");
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(error) = run() {
        eprintln!("Error generating treatment plan: {error}");
        std::process::exit(1);
    }
}
