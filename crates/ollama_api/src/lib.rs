//! Transport-only Ollama API client primitives.
//!
//! This crate owns request/response building and parsing for the two Ollama
//! endpoints the agent consumes: `/api/tags` (the model registry queried once
//! at startup) and `/api/chat` with tool declarations (one request per model
//! round trip, non-streaming). It intentionally contains no turn
//! orchestration and no runtime UI coupling.

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod url;

pub use client::OllamaApiClient;
pub use config::OllamaApiConfig;
pub use error::OllamaApiError;
pub use payload::{
    ChatMessage, ChatRequest, ChatResponse, FunctionCall, FunctionSpec, ModelEntry, TagsResponse,
    ToolCall, ToolSpec,
};
pub use url::normalize_base_url;
