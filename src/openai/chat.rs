//! Blocking chat-completions client.

use serde::{Deserialize, Serialize};
use tap::Pipe;

use super::{Error, FinishReason, Result};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Who authored a chat message.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatCompletionMessageRole {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

/// One message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionMessage {
    /// Message author.
    pub role: ChatCompletionMessageRole,
    /// Message text; absent in some provider responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletionMessage {
    /// A user message with the given text.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatCompletionMessageRole::User,
            content: Some(content.into()),
        }
    }
}

/// One returned completion choice.
#[derive(Debug, PartialEq, Deserialize)]
pub struct ChatCompletionChoice {
    /// The generated message.
    pub message: ChatCompletionMessage,
    /// Why generation stopped.
    pub finish_reason: Option<FinishReason>,
}

/// A chat-completion response.
#[derive(Debug, PartialEq, Deserialize)]
pub struct ChatCompletionResponse {
    /// Completion choices; the first one carries the generated text.
    pub choices: Vec<ChatCompletionChoice>,
}

/// Supported chat models.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatCompletionModel {
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl ChatCompletionModel {
    /// Parse a model identifier as configured in the environment.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "gpt-4o-mini" => Some(Self::Gpt4oMini),
            "gpt-4o" => Some(Self::Gpt4o),
            "gpt-3.5-turbo" => Some(Self::Gpt35Turbo),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: ChatCompletionModel,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Arguments for one completion request.
#[derive(Debug, Clone)]
pub struct ChatCompletionArgs {
    /// Conversation so far.
    pub messages: Vec<ChatCompletionMessage>,
    /// Model to complete with.
    pub model: ChatCompletionModel,
    /// Completion length cap.
    pub max_tokens: Option<u16>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl ChatCompletionArgs {
    /// Arguments with no messages and the default model.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            model: ChatCompletionModel::Gpt4oMini,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Replace the model.
    pub fn with_model(mut self, model: ChatCompletionModel) -> Self {
        self.model = model;
        self
    }

    /// Append a message.
    pub fn with_message(mut self, message: ChatCompletionMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Cap the completion length.
    pub fn with_max_tokens(mut self, max_tokens: u16) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl Default for ChatCompletionArgs {
    fn default() -> Self {
        Self::new()
    }
}

/// A chat-completion backend. The production implementation is
/// [`OpenAiChat`]; tests substitute their own.
pub trait ChatCompletion: Send + Sync {
    /// Request one completion, blocking until response or error.
    fn complete(&self, args: &ChatCompletionArgs) -> Result<ChatCompletionResponse>;
}

/// Blocking client for the OpenAI chat-completions endpoint.
pub struct OpenAiChat {
    url: String,
    key: String,
    client: reqwest::blocking::Client,
}

impl OpenAiChat {
    /// A client for the public endpoint with the given API key.
    pub fn new(key: String) -> Self {
        Self::with_url(CHAT_COMPLETIONS_URL, key)
    }

    /// A client for a specific endpoint URL.
    pub fn with_url(url: &str, key: String) -> Self {
        Self {
            url: url.to_string(),
            key,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl ChatCompletion for OpenAiChat {
    fn complete(&self, args: &ChatCompletionArgs) -> Result<ChatCompletionResponse> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.key)
            .json(&ChatCompletionRequest {
                model: args.model.clone(),
                messages: args.messages.clone(),
                max_tokens: args.max_tokens,
                temperature: args.temperature,
            })
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::RejectedChatCompletion {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<ChatCompletionResponse>()
            .map_err(Error::InvalidChatCompletion)?
            .pipe(Ok)
    }
}

/// The text content of a response's first choice.
pub fn completion_text(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(Error::EmptyChatCompletion)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serializes_request_with_model_name() {
        let request = ChatCompletionRequest {
            model: ChatCompletionModel::Gpt4oMini,
            messages: vec![ChatCompletionMessage::user("hello")],
            max_tokens: None,
            temperature: Some(0.7),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""model":"gpt-4o-mini""#));
        assert!(json.contains(r#""temperature":0.7"#));
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn deserializes_response() {
        let json = r#"{
            "choices": [
                {
                    "message": {"role": "assistant", "content": "a plan"},
                    "finish_reason": "stop"
                }
            ]
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            completion_text(response).unwrap(),
            "a plan".to_string()
        );
    }

    #[test]
    fn empty_response_is_an_error() {
        let response = ChatCompletionResponse { choices: Vec::new() };
        assert!(matches!(
            completion_text(response),
            Err(Error::EmptyChatCompletion)
        ));
    }

    #[test]
    fn parses_model_names() {
        assert_eq!(
            ChatCompletionModel::parse("gpt-4o-mini"),
            Some(ChatCompletionModel::Gpt4oMini)
        );
        assert_eq!(ChatCompletionModel::parse(" gpt-4o "), Some(ChatCompletionModel::Gpt4o));
        assert_eq!(ChatCompletionModel::parse("gpt-5"), None);
    }
}
