//! Configuration loading and merging.
//!
//! Sources, in increasing precedence:
//! - Global config file (`~/.config/caretforge/config.json`)
//! - Project config file (`./caretforge.jsonc` or `./caretforge.json`,
//!   searched from the current directory up through its parents)
//! - Environment variables (`CARETFORGE_*`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// `{defaultProvider, providers, telemetry}` — the entire on-disk schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<HashMap<String, ProviderConfig>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<bool>,
}

/// Per-provider entry in the `providers` map. `apiKey` typically arrives via
/// `{env:VAR}` substitution rather than as a literal in the file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    /// One of `openai`, `anthropic`, `openai-responses`, `thread-run`.
    /// Defaults to the provider's map key when omitted.
    pub kind: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub default_model: Option<String>,
    /// Azure-style `api-version` query parameter (variants A and C).
    pub api_version: Option<String>,
    /// Wire path appended after the deployment segment (variant A only;
    /// defaults to `/chat/completions`).
    pub path: Option<String>,
}

impl Config {
    pub async fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_file(&global_path).await? {
                config = config.merge(global_config);
            }
        }

        if let Some(project_path) = Self::find_project_config().await? {
            if let Some(project_config) = Self::load_file(&project_path).await? {
                config = config.merge(project_config);
            }
        }

        Ok(config.apply_env_overrides())
    }

    pub fn global_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("caretforge"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|p| p.join("config.json"))
    }

    async fn find_project_config() -> Result<Option<PathBuf>> {
        let mut current = std::env::current_dir()?;

        loop {
            for filename in &["caretforge.jsonc", "caretforge.json"] {
                let config_path = current.join(filename);
                if config_path.exists() {
                    return Ok(Some(config_path));
                }
            }

            let dotdir = current.join(".caretforge");
            if dotdir.exists() {
                for filename in &["config.jsonc", "config.json"] {
                    let config_path = dotdir.join(filename);
                    if config_path.exists() {
                        return Ok(Some(config_path));
                    }
                }
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    async fn load_file(path: &Path) -> Result<Option<Config>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file: {path:?}"))?;

        if content.trim().is_empty() {
            return Ok(Some(Config::default()));
        }

        let content = Self::strip_jsonc_comments(&content);
        let content = Self::strip_trailing_commas(&content);
        let content = Self::substitute_env_vars(&content);

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file: {path:?}"))?;

        Ok(Some(config))
    }

    /// Strip `//` and `/* */` comments while respecting string literals.
    fn strip_jsonc_comments(content: &str) -> String {
        let mut result = String::new();
        let mut in_string = false;
        let mut in_line_comment = false;
        let mut in_block_comment = false;
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            if in_line_comment {
                if c == '\n' {
                    in_line_comment = false;
                    result.push(c);
                }
                continue;
            }

            if in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_block_comment = false;
                }
                continue;
            }

            if c == '"' && !in_string {
                in_string = true;
                result.push(c);
                continue;
            }

            if c == '"' && in_string {
                let mut backslash_count = 0;
                for ch in result.chars().rev() {
                    if ch == '\\' {
                        backslash_count += 1;
                    } else {
                        break;
                    }
                }
                if backslash_count % 2 == 0 {
                    in_string = false;
                }
                result.push(c);
                continue;
            }

            if !in_string {
                if c == '/' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_line_comment = true;
                    continue;
                }

                if c == '/' && chars.peek() == Some(&'*') {
                    chars.next();
                    in_block_comment = true;
                    continue;
                }
            }

            result.push(c);
        }

        result
    }

    fn strip_trailing_commas(content: &str) -> String {
        let re = regex::Regex::new(r",(\s*[}\]])").unwrap();
        re.replace_all(content, "$1").to_string()
    }

    /// Substitute `{env:VAR_NAME}` tokens with the named environment
    /// variable, or the empty string if it is unset.
    fn substitute_env_vars(content: &str) -> String {
        let re = regex::Regex::new(r"\{env:([^}]+)\}").unwrap();
        re.replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .to_string()
    }

    /// Merge `other` on top of `self`; `other`'s values take precedence.
    pub fn merge(mut self, other: Config) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.default_provider.is_some() {
            self.default_provider = other.default_provider;
        }
        if let Some(other_providers) = other.providers {
            let providers = self.providers.get_or_insert_with(HashMap::new);
            providers.extend(other_providers);
        }
        if other.telemetry.is_some() {
            self.telemetry = other.telemetry;
        }
        self
    }

    fn apply_env_overrides(mut self) -> Self {
        if let Ok(provider) = std::env::var("CARETFORGE_PROVIDER") {
            self.default_provider = Some(provider);
        }
        self
    }

    /// Write a starter config to the global config path, creating the
    /// directory if needed. Does nothing if a file already exists there.
    pub async fn init() -> Result<PathBuf> {
        let config_dir = Self::global_config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

        fs::create_dir_all(&config_dir)
            .await
            .context("failed to create config directory")?;

        let config_path = config_dir.join("config.json");

        if !config_path.exists() {
            let default_config = Config {
                schema: Some("https://caretforge.dev/schema/config.json".to_string()),
                default_provider: None,
                providers: Some(HashMap::new()),
                telemetry: Some(false),
            };

            let content = serde_json::to_string_pretty(&default_config)?;
            fs::write(&config_path, content)
                .await
                .context("failed to write default config file")?;
        }

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_and_block_comments() {
        let input = r#"{
            // leading comment
            "defaultProvider": "openai", // inline comment
            /* block
               comment */
            "telemetry": false
        }"#;

        let result = Config::strip_jsonc_comments(input);
        assert!(!result.contains("//"));
        assert!(!result.contains("/*"));
        assert!(result.contains(r#""defaultProvider": "openai""#));
    }

    #[test]
    fn substitutes_env_var_tokens() {
        std::env::set_var("CARETFORGE_TEST_VAR", "test_value");
        let input = r#"{"apiKey": "{env:CARETFORGE_TEST_VAR}"}"#;
        let result = Config::substitute_env_vars(input);
        assert_eq!(result, r#"{"apiKey": "test_value"}"#);
    }

    #[test]
    fn merge_prefers_other() {
        let config1 = Config {
            default_provider: Some("openai".to_string()),
            ..Default::default()
        };
        let config2 = Config {
            default_provider: Some("anthropic".to_string()),
            telemetry: Some(true),
            ..Default::default()
        };

        let merged = config1.merge(config2);
        assert_eq!(merged.default_provider, Some("anthropic".to_string()));
        assert_eq!(merged.telemetry, Some(true));
    }

    #[test]
    fn strips_trailing_commas_before_closing_brackets() {
        let input = r#"{
            "defaultProvider": "openai",
            "providers": {
                "openai": {},
            },
        }"#;

        let result = Config::strip_trailing_commas(input);
        assert!(!result.contains(",}"));
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str(&result);
        assert!(parsed.is_ok());
    }

    #[test]
    fn empty_content_is_empty() {
        assert!("".trim().is_empty());
        assert!("   \n  \t  ".trim().is_empty());
    }
}
