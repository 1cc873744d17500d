//! Provider configuration helpers.
//!
//! Resolves base URLs and model names for the providers this SDK talks to, with
//! environment-variable overrides taking priority over hardcoded defaults. This mirrors
//! how every adapter in the pack resolves its endpoint: check the environment first, fall
//! back to a sensible default for local development.

use std::env;

/// Supported LLM providers.
///
/// `LMStudio`, `Ollama`, `LlamaCpp`, and `VLLM` are local OpenAI-compatible servers.
/// `Anthropic` and `OpenAiCloud` are the two hosted, Anthropic-style and OpenAI-style
/// chat APIs named in the engine's scope (§1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LMStudio,
    Ollama,
    LlamaCpp,
    VLLM,
    Anthropic,
    OpenAiCloud,
}

impl Provider {
    /// The environment variable consulted for this provider's base URL override.
    fn base_url_env_var(self) -> &'static str {
        match self {
            Provider::LMStudio => "LMSTUDIO_BASE_URL",
            Provider::Ollama => "OLLAMA_BASE_URL",
            Provider::LlamaCpp => "LLAMACPP_BASE_URL",
            Provider::VLLM => "VLLM_BASE_URL",
            Provider::Anthropic => "ANTHROPIC_BASE_URL",
            Provider::OpenAiCloud => "OPENAI_BASE_URL",
        }
    }

    /// The provider's default base URL when no environment override is set.
    fn default_base_url(self) -> &'static str {
        match self {
            Provider::LMStudio => "http://localhost:1234/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::LlamaCpp => "http://localhost:8080/v1",
            Provider::VLLM => "http://localhost:8000/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::OpenAiCloud => "https://api.openai.com/v1",
        }
    }

    /// The environment variable holding this provider's API key, if any.
    pub fn api_key_env_var(self) -> Option<&'static str> {
        match self {
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::OpenAiCloud => Some("OPENAI_API_KEY"),
            _ => None,
        }
    }

    /// The environment variable consulted for this provider's default model name.
    fn model_env_var(self) -> &'static str {
        match self {
            Provider::LMStudio => "LMSTUDIO_MODEL",
            Provider::Ollama => "OLLAMA_MODEL",
            Provider::LlamaCpp => "LLAMACPP_MODEL",
            Provider::VLLM => "VLLM_MODEL",
            Provider::Anthropic => "ANTHROPIC_MODEL",
            Provider::OpenAiCloud => "OPENAI_MODEL",
        }
    }
}

/// Resolve the base URL to use for requests.
///
/// Priority: environment variable override > provider default > `fallback`.
pub fn get_base_url(provider: Provider, fallback: Option<&str>) -> String {
    if let Ok(url) = env::var(provider.base_url_env_var()) {
        if !url.is_empty() {
            return url;
        }
    }
    fallback
        .map(|s| s.to_string())
        .unwrap_or_else(|| provider.default_base_url().to_string())
}

/// Resolve the model name to use for requests.
///
/// When `prefer_env` is true, the provider's model environment variable takes priority
/// over `fallback`; when false, `fallback` is used whenever it is `Some`, and the
/// environment variable is only a last resort.
pub fn get_model(provider: Provider, fallback: Option<&str>, prefer_env: bool) -> Option<String> {
    let env_value = env::var(provider.model_env_var()).ok().filter(|v| !v.is_empty());

    if prefer_env {
        env_value.or_else(|| fallback.map(|s| s.to_string()))
    } else {
        fallback.map(|s| s.to_string()).or(env_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn base_url_falls_back_to_provider_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("LMSTUDIO_BASE_URL");
        assert_eq!(get_base_url(Provider::LMStudio, None), "http://localhost:1234/v1");
    }

    #[test]
    fn base_url_prefers_env_over_default_and_fallback() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("OLLAMA_BASE_URL", "http://custom:9999/v1");
        assert_eq!(
            get_base_url(Provider::Ollama, Some("http://fallback/v1")),
            "http://custom:9999/v1"
        );
        env::remove_var("OLLAMA_BASE_URL");
    }

    #[test]
    fn model_prefer_env_true_uses_env_first() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("VLLM_MODEL", "env-model");
        assert_eq!(
            get_model(Provider::VLLM, Some("fallback-model"), true),
            Some("env-model".to_string())
        );
        env::remove_var("VLLM_MODEL");
    }

    #[test]
    fn model_prefer_env_false_uses_fallback_first() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("VLLM_MODEL", "env-model");
        assert_eq!(
            get_model(Provider::VLLM, Some("fallback-model"), false),
            Some("fallback-model".to_string())
        );
        env::remove_var("VLLM_MODEL");
    }
}
