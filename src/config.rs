//! Configuration defaults for incant.

use std::time::Duration;

/// Base URL used when `--api-url` is not given.
pub const DEFAULT_API_URL: &str = "http://localhost:11434";

/// Model used when `--model` is not given.
pub const DEFAULT_MODEL: &str = "qwen3-coder:30b";

/// Timeout applied to every model request. A slow local model can legitimately
/// take a while; code execution itself is never subject to this.
pub const MODEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variable selecting the turn provider (`ollama` or `mock`).
pub const PROVIDER_ENV_VAR: &str = "INCANT_PROVIDER";

/// Environment variable overriding the built-in system instructions.
pub const SYSTEM_INSTRUCTIONS_ENV_VAR: &str = "INCANT_SYSTEM_INSTRUCTIONS";
