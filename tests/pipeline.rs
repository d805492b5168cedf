//! End-to-end pipeline test with substituted service handles: a fixed
//! geocoder, the compiled-in facility directory, and a canned chat backend.

use std::sync::{Arc, Mutex};

use careplan::location::{
    Coordinates, Geocode, LocationResolver, Result as LocationResult, StaticDirectory,
};
use careplan::openai::chat::{
    ChatCompletion, ChatCompletionArgs, ChatCompletionChoice, ChatCompletionMessage,
    ChatCompletionMessageRole, ChatCompletionModel, ChatCompletionResponse,
};
use careplan::openai::Result as OpenAiResult;
use careplan::patient::{parse_condition, RawPatientInput, Symptoms};
use careplan::prompt::plan::Planner;
use careplan::TreatmentPipeline;

struct FixedGeocoder(Coordinates);

impl Geocode for FixedGeocoder {
    fn geocode(&self, _address: &str) -> LocationResult<Coordinates> {
        Ok(self.0)
    }
}

struct CannedChat {
    reply: String,
    seen_prompts: Arc<Mutex<Vec<String>>>,
}

impl ChatCompletion for CannedChat {
    fn complete(&self, args: &ChatCompletionArgs) -> OpenAiResult<ChatCompletionResponse> {
        let prompt = args
            .messages
            .last()
            .and_then(|message| message.content.clone())
            .unwrap_or_default();
        self.seen_prompts.lock().unwrap().push(prompt);
        Ok(ChatCompletionResponse {
            choices: vec![ChatCompletionChoice {
                message: ChatCompletionMessage {
                    role: ChatCompletionMessageRole::Assistant,
                    content: Some(self.reply.clone()),
                },
                finish_reason: None,
            }],
        })
    }
}

const CANNED_PLAN: &str = "\
Immediate Action and Urgency Assessment
Chest pain requires immediate medical attention.

Recommended Medical Actions
Visit St. Elizabeth Hospital for an electrocardiogram.

Self-Care and Monitoring
Rest and avoid exertion until evaluated.";

const TEMPLATE: &str = "\
Patient symptoms: {symptoms}
Physical condition: {condition}
Location and nearby facilities: {location}

Write a treatment plan with an Immediate Action and Urgency Assessment
section and a Recommended Medical Actions section.";

fn pipeline_with(seen_prompts: &Arc<Mutex<Vec<String>>>) -> TreatmentPipeline {
    let resolver = LocationResolver::new(
        Box::new(FixedGeocoder(Coordinates {
            lat: 40.7128,
            lng: -74.0060,
        })),
        Box::new(StaticDirectory::northern_kentucky()),
    );
    let planner = Planner::with_template(
        TEMPLATE.to_string(),
        ChatCompletionModel::Gpt4oMini,
        0.7,
        Box::new(CannedChat {
            reply: CANNED_PLAN.to_string(),
            seen_prompts: seen_prompts.clone(),
        }),
    );
    TreatmentPipeline::new(resolver, planner)
}

#[test]
fn generates_plan_for_example_record() {
    let seen_prompts = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline_with(&seen_prompts);

    let plan = pipeline
        .generate_plan(RawPatientInput {
            symptoms: Symptoms::Text("chest pain".to_string()),
            condition: parse_condition("age:50; allergy:none"),
            location: "NY, NY, USA".to_string(),
        })
        .unwrap();

    assert!(!plan.is_empty());
    assert!(plan.contains("Immediate Action"));
}

#[test]
fn prompt_carries_assembled_variables() {
    let seen_prompts = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline_with(&seen_prompts);

    pipeline
        .generate_plan(RawPatientInput {
            symptoms: Symptoms::List(vec![
                "chest pain".to_string(),
                "shortness of breath".to_string(),
            ]),
            condition: parse_condition("age:68; mobility:limited; allergies:['aspirin']"),
            location: "Covington, KY".to_string(),
        })
        .unwrap();

    let seen = seen_prompts.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let prompt = &seen[0];
    assert!(prompt.contains("Patient symptoms: chest pain, shortness of breath"));
    assert!(prompt.contains("age: 68, mobility: limited, allergies: aspirin"));
    assert!(prompt.contains("Covington, KY ("));
    assert!(prompt.contains("St. Elizabeth Hospital"));
}

#[test]
fn validation_errors_surface_before_any_service_call() {
    let seen_prompts = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline_with(&seen_prompts);

    let result = pipeline.generate_plan(RawPatientInput {
        symptoms: Symptoms::Text(String::new()),
        condition: parse_condition(""),
        location: "x".to_string(),
    });

    assert!(matches!(result, Err(careplan::Error::Validation(_))));
    assert!(seen_prompts.lock().unwrap().is_empty());
}
