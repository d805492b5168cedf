//! Interactive intake: gathers a descriptive symptom statement, condition
//! details, and a location, then prints the generated treatment plan.

use std::io::{self, Write};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use careplan::config::Config;
use careplan::patient::{parse_condition, RawPatientInput, Symptoms};
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

    let symptoms = prompt_line(
        "\nEnter patient symptoms (include onset, duration, severity, character, \
         alleviating/aggravating factors): ",
    )?;
    let condition = parse_condition(&prompt_line(
        "Enter physical condition details as key:value pairs separated by ';' \
         (e.g. age:65; allergies:penicillin; medications:aspirin,ibuprofen): ",
    )?);
    let location = prompt_line("Enter geographic location (City, State/Region, Country): ")?;

    let plan = pipeline.generate_plan(RawPatientInput {
        symptoms: Symptoms::Text(symptoms),
        condition,
        location,
    })?;
    println!("\nGenerated Treatment Plan:\n\n{plan}");
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
