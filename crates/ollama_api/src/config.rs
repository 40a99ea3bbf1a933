use std::time::Duration;

use crate::url::DEFAULT_OLLAMA_BASE_URL;

/// Transport configuration for Ollama API requests.
#[derive(Debug, Clone)]
pub struct OllamaApiConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Optional request timeout applied to every call.
    pub timeout: Option<Duration>,
}

impl Default for OllamaApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl OllamaApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
