use reqwest::StatusCode;

use ollama_api::error::parse_error_message;
use ollama_api::OllamaApiError;

#[test]
fn model_not_found_lists_available_models_sorted() {
    let error = OllamaApiError::ModelNotFound {
        requested: "qwen3-coder:30b".to_string(),
        available: vec!["llama3.2:latest".to_string(), "gemma3:4b".to_string()],
    };

    assert_eq!(
        error.to_string(),
        "Model 'qwen3-coder:30b' not found. Available: gemma3:4b, llama3.2:latest"
    );
    assert!(!error.is_connectivity());
}

#[test]
fn error_body_message_is_extracted() {
    let message = parse_error_message(
        StatusCode::NOT_FOUND,
        r#"{"error":"model \"nope\" not found, try pulling it first"}"#,
    );

    assert_eq!(message, "model \"nope\" not found, try pulling it first");
}

#[test]
fn empty_error_body_falls_back_to_canonical_reason() {
    let message = parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, "");

    assert_eq!(message, "Internal Server Error");
}

#[test]
fn non_json_error_body_is_passed_through() {
    let message = parse_error_message(StatusCode::BAD_GATEWAY, "upstream unavailable");

    assert_eq!(message, "upstream unavailable");
}
