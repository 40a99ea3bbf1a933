/// Default base URL of a local Ollama server.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Normalize a base URL for endpoint construction: fall back to the default
/// when blank and strip any trailing slashes.
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_OLLAMA_BASE_URL
    } else {
        input.trim()
    };

    base.trim_end_matches('/').to_string()
}

/// Endpoint listing the models installed on the server.
pub fn tags_url(base_url: &str) -> String {
    format!("{}/api/tags", normalize_base_url(base_url))
}

/// Chat-completion endpoint with tool-calling support.
pub fn chat_url(base_url: &str) -> String {
    format!("{}/api/chat", normalize_base_url(base_url))
}
