//! Form-based UI: a form page collects structured patient fields, a
//! "Generate Plan" action runs the pipeline, and the plan is shown on a
//! second page whose back link returns to a fresh form.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use careplan::config::Config;
use careplan::patient::{parse_symptom_list, Condition, ConditionValue, RawPatientInput, Symptoms};
use careplan::utils::join_nonempty;
use careplan::TreatmentPipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<TreatmentPipeline>,
}

/// Fields posted by the form page. Tag fields arrive comma-separated.
#[derive(Debug, Deserialize)]
struct PlanForm {
    symptoms: String,
    age: String,
    #[serde(default)]
    allergies: String,
    #[serde(default)]
    medications: String,
    #[serde(default)]
    preexisting: String,
    #[serde(default)]
    family_history: String,
    #[serde(default)]
    other_details: String,
    addr1: String,
    #[serde(default)]
    addr2: String,
    city: String,
    state: String,
    country: String,
    #[serde(default)]
    zip_code: String,
    #[serde(default)]
    postal_code: String,
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn build_input(form: &PlanForm) -> Result<RawPatientInput, String> {
    let symptoms = parse_symptom_list(&form.symptoms);
    if symptoms.is_empty() {
        return Err("Please add at least one symptom.".to_string());
    }
    let age: u8 = form
        .age
        .trim()
        .parse()
        .ok()
        .filter(|age| *age <= 120)
        .ok_or_else(|| "Age must be a number between 0 and 120.".to_string())?;
    if form.addr1.trim().is_empty()
        || form.city.trim().is_empty()
        || form.state.trim().is_empty()
        || form.country.trim().is_empty()
    {
        return Err("Please fill in Address Line 1, City, State, and Country.".to_string());
    }

    let mut condition = Condition::default();
    condition.push("age", ConditionValue::One(age.to_string()));
    let tag_fields = [
        ("allergies", &form.allergies),
        ("medications", &form.medications),
        ("pre_existing_conditions", &form.preexisting),
        ("family_history", &form.family_history),
        ("other_details", &form.other_details),
    ];
    for (key, raw) in tag_fields {
        let values = parse_symptom_list(raw);
        if !values.is_empty() {
            condition.push(key, ConditionValue::Many(values));
        }
    }

    let location = join_nonempty(
        [
            form.addr1.as_str(),
            form.addr2.as_str(),
            form.city.as_str(),
            form.state.as_str(),
            form.country.as_str(),
            form.zip_code.as_str(),
            form.postal_code.as_str(),
        ],
        ", ",
    );

    Ok(RawPatientInput {
        symptoms: Symptoms::Text(symptoms.join("; ")),
        condition,
        location,
    })
}

fn render_form(error: Option<&str>) -> String {
    let banner = error
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();
    format!(
        r#"<!doctype html>
<html>
<head>
<title>Treatment Plan Generator</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; }}
fieldset {{ margin-bottom: 1rem; }}
label {{ display: block; margin-top: 0.5rem; }}
input {{ width: 100%; box-sizing: border-box; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<h1>Treatment Plan Generator</h1>
<p>Fill out the sections below and press <strong>Generate Plan</strong>.</p>
{banner}
<form method="post" action="/generate">
<fieldset>
<legend>1. Symptoms</legend>
<label>Symptoms (comma-separated)
<input name="symptoms" placeholder="e.g. headache, nausea"></label>
</fieldset>
<fieldset>
<legend>2. Physical Condition</legend>
<label>Age <input name="age" type="number" min="0" max="120" value="30"></label>
<label>Allergies <input name="allergies" placeholder="e.g. penicillin"></label>
<label>Medications <input name="medications" placeholder="e.g. aspirin"></label>
<label>Pre-existing Conditions <input name="preexisting" placeholder="e.g. asthma"></label>
<label>Family History <input name="family_history" placeholder="e.g. hypertension"></label>
<label>Other Details <input name="other_details" placeholder="Any other details"></label>
</fieldset>
<fieldset>
<legend>3. Location</legend>
<label>Address Line 1 <input name="addr1" placeholder="123 Main St"></label>
<label>Address Line 2 (optional) <input name="addr2"></label>
<label>City <input name="city"></label>
<label>State/Region <input name="state"></label>
<label>Country <input name="country"></label>
<label>ZIP Code <input name="zip_code"></label>
<label>Postal Code (optional) <input name="postal_code"></label>
</fieldset>
<button type="submit">Generate Plan</button>
</form>
</body>
</html>"#
    )
}

fn render_plan(plan: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
<title>Preliminary Treatment Plan</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; }}
pre {{ white-space: pre-wrap; background: #f6f6f6; padding: 1rem; }}
</style>
</head>
<body>
<h1>Preliminary Treatment Plan</h1>
<pre>{}</pre>
<p><a href="/">&#8592; Back to Form</a></p>
</body>
</html>"#,
        escape_html(plan)
    )
}

async fn form_page() -> Html<String> {
    Html(render_form(None))
}

async fn generate(State(state): State<AppState>, Form(form): Form<PlanForm>) -> Html<String> {
    let raw = match build_input(&form) {
        Ok(raw) => raw,
        Err(message) => return Html(render_form(Some(&message))),
    };
    let pipeline = state.pipeline.clone();
    match tokio::task::spawn_blocking(move || pipeline.generate_plan(raw)).await {
        Ok(Ok(plan)) => Html(render_plan(&plan)),
        Ok(Err(error)) => Html(render_form(Some(&format!(
            "Error generating plan: {error}"
        )))),
        Err(error) => {
            tracing::error!(%error, "plan generation task panicked");
            Html(render_form(Some("Plan generation failed unexpectedly.")))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let pipeline = Arc::new(TreatmentPipeline::from_config(&config)?);
    let addr = std::env::var("WEBFORM_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    let app = Router::new()
        .route("/", get(form_page))
        .route("/generate", post(generate))
        .with_state(AppState { pipeline });

    tracing::info!("serving treatment-plan form on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
