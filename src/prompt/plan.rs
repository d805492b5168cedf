//! The treatment-plan generation call.

use std::fs;
use std::path::Path;

use crate::openai::chat::{
    completion_text, ChatCompletion, ChatCompletionArgs, ChatCompletionMessage,
    ChatCompletionModel,
};
use crate::utils::render_template;

use super::assemble::PromptVariables;

/// Plan generation errors.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read plan template {path}: {source}")]
    TemplateFile {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    TemplateRender(#[from] crate::utils::Error),
    #[error(transparent)]
    OpenAIError(#[from] crate::openai::Error),
}

/// Plan generation result.
pub type Result<T> = core::result::Result<T, Error>;

/// Generates treatment-plan narratives from assembled prompt variables.
///
/// The template is read once at construction; a missing file fails fast so a
/// misconfigured deployment never reaches the first request.
pub struct Planner {
    template: String,
    model: ChatCompletionModel,
    temperature: f32,
    chat: Box<dyn ChatCompletion>,
}

impl Planner {
    /// Build a planner from a template file.
    pub fn from_template_file(
        path: &Path,
        model: ChatCompletionModel,
        temperature: f32,
        chat: Box<dyn ChatCompletion>,
    ) -> Result<Self> {
        let template = fs::read_to_string(path).map_err(|source| Error::TemplateFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::with_template(template, model, temperature, chat))
    }

    /// Build a planner from an in-memory template.
    pub fn with_template(
        template: String,
        model: ChatCompletionModel,
        temperature: f32,
        chat: Box<dyn ChatCompletion>,
    ) -> Self {
        Self {
            template,
            model,
            temperature,
            chat,
        }
    }

    /// Bind `variables` into the template and request one completion,
    /// returning the response text unchanged.
    pub fn generate(&self, variables: &PromptVariables) -> Result<String> {
        let prompt = render_template(&self.template, variables)?;
        let args = ChatCompletionArgs::new()
            .with_model(self.model.clone())
            .with_temperature(self.temperature)
            .with_message(ChatCompletionMessage::user(prompt));
        let response = self.chat.complete(&args)?;
        completion_text(response).map_err(Error::OpenAIError)
    }
}
