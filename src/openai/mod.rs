//! Interact with OpenAI's chat models.

pub mod chat;

use serde::{Deserialize, Serialize};
use thiserror;

/// Chat completion errors.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to request chat completion: {0}")]
    InvalidChatCompletion(#[from] reqwest::Error),
    #[error("chat completion rejected ({status}): {body}")]
    RejectedChatCompletion {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Provider error body, when readable.
        body: String,
    },
    #[error("chat completion returned no messages")]
    EmptyChatCompletion,
}

/// Chat completion result.
pub type Result<T> = core::result::Result<T, Error>;

/// Why the model stopped generating.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The model finished its answer.
    Stop,
    /// The token limit cut the answer short.
    Length,
    /// The provider filtered the content.
    #[serde(rename = "content_filter")]
    ContentFilter,
}
