//! `config init` / `config show` — on-disk config management.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::Config;
use crate::redact::{is_secret_key, redact};

pub async fn init(with_secrets: bool) -> Result<()> {
    let path = Config::init().await.context("failed to write default config")?;
    println!("Created default configuration file at: {}", path.display());
    if !with_secrets {
        println!("\nAdd a provider entry and set its apiKey (or use {{env:VAR}}) to get started.");
    } else {
        println!("\nExample provider entry with a literal key (prefer {{env:VAR}} in shared files):");
        println!(
            r#"
{{
  "defaultProvider": "anthropic",
  "providers": {{
    "anthropic": {{
      "kind": "anthropic",
      "baseUrl": "https://api.anthropic.com",
      "apiKey": "sk-ant-...",
      "defaultModel": "claude-sonnet-4-20250514"
    }}
  }}
}}
"#
        );
    }
    Ok(())
}

/// `--json` is accepted for parity with the other subcommands but doesn't
/// change the output here: a config is already a JSON document, so the
/// pretty-printed form serves both modes.
pub async fn show(_json: bool) -> Result<()> {
    let config = Config::load().await.context("failed to load config")?;
    let mut value = serde_json::to_value(&config).context("failed to serialize config")?;
    redact_secrets(&mut value);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Walk the serialized config and redact any string value whose key looks
/// like it names a secret, recursively (covers the `providers` map).
fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if is_secret_key(key) {
                    if let Value::String(s) = v {
                        *s = redact(s);
                        continue;
                    }
                }
                redact_secrets(v);
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_secrets(item);
            }
        }
        _ => {}
    }
}
