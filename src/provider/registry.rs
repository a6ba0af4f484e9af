//! Resolves a named provider entry from [`Config`] into a concrete
//! [`Provider`] adapter. The agent loop and CLI only ever see the trait
//! object this returns — provider selection is the one place that knows
//! about the four wire-protocol structs.

use super::anthropic::AnthropicProvider;
use super::openai_chat::OpenAiChatProvider;
use super::openai_responses::OpenAiResponsesProvider;
use super::thread_run::ThreadRunProvider;
use super::Provider;
use crate::config::{Config, ProviderConfig};
use crate::error::{CaretForgeError, Result};

/// A resolved provider instance plus the model id to use with it.
pub struct Resolved {
    pub provider_name: String,
    pub provider: Box<dyn Provider>,
    pub model: String,
}

/// Pick a provider by name (falling back to `config.defaultProvider`),
/// look up its entry in `config.providers`, and construct the matching
/// adapter. `requested_model` overrides the provider's `defaultModel`.
pub fn resolve(
    config: &Config,
    requested_provider: Option<&str>,
    requested_model: Option<&str>,
) -> Result<Resolved> {
    let provider_name = requested_provider
        .map(str::to_string)
        .or_else(|| config.default_provider.clone())
        .ok_or_else(|| {
            CaretForgeError::config("no provider specified and no defaultProvider configured")
        })?;

    let provider_cfg = config
        .providers
        .as_ref()
        .and_then(|m| m.get(&provider_name))
        .cloned()
        .ok_or_else(|| CaretForgeError::config(format!("unknown provider '{provider_name}'")))?;

    let provider = build(&provider_name, &provider_cfg)?;

    let model = requested_model
        .map(str::to_string)
        .or_else(|| provider_cfg.default_model.clone())
        .ok_or_else(|| {
            CaretForgeError::config(format!(
                "provider '{provider_name}' has no defaultModel and none was given"
            ))
        })?;

    Ok(Resolved {
        provider_name,
        provider,
        model,
    })
}

/// Resolve just the provider adapter, with no model requirement — used by
/// `model list`, which doesn't need a `defaultModel` to already be set.
pub fn resolve_provider_only(config: &Config, requested_provider: Option<&str>) -> Result<(String, Box<dyn Provider>)> {
    let provider_name = requested_provider
        .map(str::to_string)
        .or_else(|| config.default_provider.clone())
        .ok_or_else(|| {
            CaretForgeError::config("no provider specified and no defaultProvider configured")
        })?;

    let provider_cfg = config
        .providers
        .as_ref()
        .and_then(|m| m.get(&provider_name))
        .cloned()
        .ok_or_else(|| CaretForgeError::config(format!("unknown provider '{provider_name}'")))?;

    let provider = build(&provider_name, &provider_cfg)?;
    Ok((provider_name, provider))
}

fn build(name: &str, cfg: &ProviderConfig) -> Result<Box<dyn Provider>> {
    let kind = cfg.kind.as_deref().unwrap_or(name);
    let api_key = cfg.api_key.clone().unwrap_or_default();

    match kind {
        "anthropic" => {
            let base_url = require_base_url(name, cfg)?;
            Ok(Box::new(AnthropicProvider::new(base_url, api_key)))
        }
        "openai" | "openai-chat" => {
            let base_url = require_base_url(name, cfg)?;
            Ok(Box::new(OpenAiChatProvider::new(
                base_url,
                api_key,
                cfg.api_version.clone(),
                cfg.path.clone(),
            )))
        }
        "openai-responses" => {
            let base_url = require_base_url(name, cfg)?;
            Ok(Box::new(OpenAiResponsesProvider::new(base_url, api_key)))
        }
        "thread-run" => {
            let base_url = require_base_url(name, cfg)?;
            let key = if api_key.is_empty() { None } else { Some(api_key) };
            Ok(Box::new(ThreadRunProvider::new(base_url, key)))
        }
        other => Err(CaretForgeError::config(format!(
            "provider '{name}' has unknown kind '{other}'"
        ))),
    }
}

fn require_base_url(name: &str, cfg: &ProviderConfig) -> Result<String> {
    cfg.base_url
        .clone()
        .ok_or_else(|| CaretForgeError::config(format!("provider '{name}' is missing baseUrl")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(providers: HashMap<String, ProviderConfig>, default: Option<&str>) -> Config {
        Config {
            default_provider: default.map(str::to_string),
            providers: Some(providers),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_named_provider_and_model() {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                kind: Some("openai".to_string()),
                base_url: Some("https://host".to_string()),
                api_key: Some("sk-test".to_string()),
                default_model: Some("gpt-4o".to_string()),
                ..Default::default()
            },
        );
        let config = config_with(providers, None);

        let resolved = resolve(&config, Some("openai"), None).unwrap();
        assert_eq!(resolved.provider_name, "openai");
        assert_eq!(resolved.model, "gpt-4o");
    }

    #[test]
    fn falls_back_to_default_provider() {
        let mut providers = HashMap::new();
        providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                kind: Some("anthropic".to_string()),
                base_url: Some("https://api.anthropic.com".to_string()),
                default_model: Some("claude-sonnet-4".to_string()),
                ..Default::default()
            },
        );
        let config = config_with(providers, Some("anthropic"));

        let resolved = resolve(&config, None, None).unwrap();
        assert_eq!(resolved.provider_name, "anthropic");
    }

    #[test]
    fn unknown_provider_name_is_a_config_error() {
        let config = config_with(HashMap::new(), None);
        assert!(resolve(&config, Some("nope"), None).is_err());
    }

    #[test]
    fn missing_base_url_is_a_config_error() {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                kind: Some("openai".to_string()),
                default_model: Some("gpt-4o".to_string()),
                ..Default::default()
            },
        );
        let config = config_with(providers, None);
        assert!(resolve(&config, Some("openai"), None).is_err());
    }
}
