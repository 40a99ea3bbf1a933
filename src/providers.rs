//! Provider selection at startup.

use std::sync::Arc;

use model_provider::TurnProvider;
use model_provider_mock::{MockProvider, MOCK_PROVIDER_ID};
use model_provider_ollama::{OllamaProvider, OllamaProviderConfig, OLLAMA_PROVIDER_ID};

use crate::config::{MODEL_REQUEST_TIMEOUT, PROVIDER_ENV_VAR};

/// Resolves the provider id from the environment, defaulting to `ollama`.
pub fn provider_id_from_env() -> String {
    std::env::var(PROVIDER_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| OLLAMA_PROVIDER_ID.to_string())
}

/// Constructs the selected provider. The `mock` provider needs no server and
/// skips startup validation entirely.
pub fn provider_for_id(
    provider_id: &str,
    api_url: &str,
    model: &str,
) -> Result<Arc<dyn TurnProvider>, String> {
    match provider_id {
        OLLAMA_PROVIDER_ID => {
            let config = OllamaProviderConfig::new(api_url, model)
                .with_timeout(MODEL_REQUEST_TIMEOUT);
            let provider =
                OllamaProvider::new(config).map_err(|error| error.message().to_string())?;
            Ok(Arc::new(provider))
        }
        MOCK_PROVIDER_ID => Ok(Arc::new(MockProvider::default())),
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {OLLAMA_PROVIDER_ID}, {MOCK_PROVIDER_ID}"
        )),
    }
}
