use reqwest::Client;

use crate::config::OllamaApiConfig;
use crate::error::{parse_error_message, OllamaApiError};
use crate::payload::{ChatRequest, ChatResponse, TagsResponse};
use crate::url::{chat_url, tags_url};

#[derive(Debug)]
pub struct OllamaApiClient {
    http: Client,
    config: OllamaApiConfig,
}

impl OllamaApiClient {
    pub fn new(config: OllamaApiConfig) -> Result<Self, OllamaApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(OllamaApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OllamaApiConfig {
        &self.config
    }

    /// Lists the model identifiers installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, OllamaApiError> {
        let response = self.http.get(tags_url(&self.config.base_url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    /// Verifies that `model` is served, returning `ModelNotFound` (carrying
    /// the available set) when the server is reachable but lacks it.
    pub async fn validate_model(&self, model: &str) -> Result<(), OllamaApiError> {
        let available = self.list_models().await?;
        if available.iter().any(|name| name == model) {
            Ok(())
        } else {
            Err(OllamaApiError::ModelNotFound {
                requested: model.to_string(),
                available,
            })
        }
    }

    /// Sends one non-streaming chat request and decodes the full response.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, OllamaApiError> {
        let response = self
            .http
            .post(chat_url(&self.config.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(OllamaApiError::Status(
                status,
                parse_error_message(status, &body),
            ));
        }

        if body.is_empty() {
            return Err(OllamaApiError::EmptyResponse);
        }

        let chat_response: ChatResponse = serde_json::from_str(&body)?;
        Ok(chat_response)
    }
}
