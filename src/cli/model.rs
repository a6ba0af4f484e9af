//! `model list` — prints the models the resolved provider advertises.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::provider::registry;

pub async fn list(provider: Option<&str>) -> Result<()> {
    let config = Config::load().await.context("failed to load config")?;
    let (provider_name, provider) =
        registry::resolve_provider_only(&config, provider).map_err(|e| anyhow::anyhow!(e))?;

    let models = provider.list_models().await.map_err(|e| anyhow::anyhow!(e))?;
    if models.is_empty() {
        println!("(no models advertised by '{provider_name}')");
        return Ok(());
    }
    for model in models {
        println!("{}  {}", model.id, model.display_name);
    }
    Ok(())
}
