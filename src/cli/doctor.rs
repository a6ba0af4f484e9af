//! `doctor` — environment and configuration sanity checks. Exits non-zero
//! (via the returned `bool`) if any check fails, per the invocation surface.

use anyhow::Result;
use owo_colors::OwoColorize;
use tokio::process::Command;

use crate::config::Config;

struct Check {
    label: String,
    ok: bool,
    detail: String,
}

/// Runs every check and prints a pass/fail line for each. Returns `true`
/// iff every check passed.
pub async fn run() -> Result<bool> {
    let mut checks = Vec::new();

    checks.push(check_config_loads().await);
    checks.push(check_default_provider(&Config::load().await.unwrap_or_default()));
    checks.push(check_binary("git").await);
    checks.push(check_binary("bash").await);
    checks.push(check_binary_any(&["rg", "grep"]).await);

    let mut all_ok = true;
    for check in &checks {
        if check.ok {
            println!("[{}] {}: {}", "ok".green(), check.label, check.detail);
        } else {
            println!("[{}] {}: {}", "FAIL".red().bold(), check.label, check.detail);
        }
        all_ok &= check.ok;
    }

    Ok(all_ok)
}

async fn check_config_loads() -> Check {
    match Config::load().await {
        Ok(_) => Check {
            label: "config".to_string(),
            ok: true,
            detail: "loaded without error".to_string(),
        },
        Err(e) => Check {
            label: "config".to_string(),
            ok: false,
            detail: e.to_string(),
        },
    }
}

fn check_default_provider(config: &Config) -> Check {
    match &config.default_provider {
        Some(name) if config.providers.as_ref().is_some_and(|p| p.contains_key(name)) => Check {
            label: "default provider".to_string(),
            ok: true,
            detail: format!("'{name}' is configured"),
        },
        Some(name) => Check {
            label: "default provider".to_string(),
            ok: false,
            detail: format!("'{name}' has no matching entry in providers"),
        },
        None => Check {
            label: "default provider".to_string(),
            ok: false,
            detail: "no defaultProvider set".to_string(),
        },
    }
}

async fn check_binary(name: &str) -> Check {
    let found = Command::new(name).arg("--version").output().await.is_ok();
    Check {
        label: format!("`{name}` on PATH"),
        ok: found,
        detail: if found { "found".to_string() } else { "not found".to_string() },
    }
}

async fn check_binary_any(names: &[&str]) -> Check {
    for name in names {
        if Command::new(*name).arg("--version").output().await.is_ok() {
            return Check {
                label: format!("one of {names:?} on PATH"),
                ok: true,
                detail: format!("found `{name}`"),
            };
        }
    }
    Check {
        label: format!("one of {names:?} on PATH"),
        ok: false,
        detail: "none found".to_string(),
    }
}
