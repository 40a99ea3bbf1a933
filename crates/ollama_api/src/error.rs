use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum OllamaApiError {
    /// The server could not be reached at all (connectivity failure).
    Request(reqwest::Error),
    /// The server answered with a non-success status.
    Status(StatusCode, String),
    /// The server answered with an empty body where one was required.
    EmptyResponse,
    /// A response body could not be decoded.
    Serde(JsonError),
    /// The server is reachable but does not serve the requested model.
    ModelNotFound {
        requested: String,
        available: Vec<String>,
    },
    /// Failure outside the HTTP exchange itself.
    Unknown(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    pub error: Option<String>,
}

impl fmt::Display for OllamaApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(error) => write!(f, "could not connect to Ollama: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::EmptyResponse => write!(f, "empty response from Ollama"),
            Self::Serde(error) => write!(f, "malformed response from Ollama: {error}"),
            Self::ModelNotFound {
                requested,
                available,
            } => {
                let mut names = available.clone();
                names.sort();
                write!(
                    f,
                    "Model '{requested}' not found. Available: {}",
                    names.join(", ")
                )
            }
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for OllamaApiError {}

impl From<reqwest::Error> for OllamaApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for OllamaApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

impl OllamaApiError {
    /// True for the startup failure mode where the endpoint itself is
    /// unreachable, as opposed to reachable-but-missing-model.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

/// Extracts a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.error.filter(|message| !message.is_empty()) {
            return message;
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
