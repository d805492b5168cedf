//! Environment-provided configuration.

use std::env;
use std::path::PathBuf;

use crate::openai::chat::ChatCompletionModel;

/// Default location of the plan template, relative to the working directory.
pub const DEFAULT_TEMPLATE_PATH: &str = "./prompts/treatment_plan_template.txt";

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Configuration errors.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("unknown model name: {0}")]
    UnknownModel(String),
    #[error("PLAN_TEMPERATURE is not a number: {0}")]
    BadTemperature(String),
}

/// Configuration result.
pub type Result<T> = core::result::Result<T, Error>;

/// Settings for the generation pipeline, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key for the text-generation provider.
    pub api_key: String,
    /// Model to generate plans with.
    pub model: ChatCompletionModel,
    /// Sampling temperature.
    pub temperature: f32,
    /// Path to the plan template file.
    pub template_path: PathBuf,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// `OPENAI_API_KEY` is required; `OPENAI_MODEL`, `PLAN_TEMPERATURE`, and
    /// `PLAN_TEMPLATE_PATH` fall back to defaults.
    pub fn from_env() -> Result<Config> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(Error::MissingApiKey)?;
        let model = match env::var("OPENAI_MODEL") {
            Ok(name) => {
                ChatCompletionModel::parse(&name).ok_or_else(|| Error::UnknownModel(name))?
            }
            Err(_) => ChatCompletionModel::Gpt4oMini,
        };
        let temperature = match env::var("PLAN_TEMPERATURE") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::BadTemperature(raw))?,
            Err(_) => DEFAULT_TEMPERATURE,
        };
        let template_path = env::var("PLAN_TEMPLATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TEMPLATE_PATH));
        Ok(Config {
            api_key,
            model,
            temperature,
            template_path,
        })
    }
}
