use super::ui;
use crate::orchestrator::RateOrchestrator;
use anyhow::{Context, Result};

pub async fn clear(orchestrator: &RateOrchestrator, key: Option<&str>) -> Result<()> {
    orchestrator
        .clear_cache(key)
        .await
        .context("Failed to clear cache")?;

    let message = match key {
        Some(key) => format!("Cache for {key} cleared successfully!"),
        None => "Cache cleared successfully!".to_string(),
    };
    println!("{}", ui::style_text(&message, ui::StyleType::Success));
    Ok(())
}
