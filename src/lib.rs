pub mod cache;
pub mod cli;
pub mod core;
pub mod orchestrator;
pub mod providers;
pub mod store;

use crate::cache::RateCache;
use crate::cli::show::OutputFormat;
use crate::core::config::AppConfig;
use crate::core::rate::RateSide;
use crate::orchestrator::{FetchOptions, RateOrchestrator};
use crate::providers::http::PageClient;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Show {
        banks: Vec<String>,
        currency: Option<String>,
        format: OutputFormat,
        no_cache: bool,
    },
    Convert {
        amount: Decimal,
        from: String,
        to: String,
        bank: Option<String>,
        side: RateSide,
    },
    ListProviders,
    ClearCache {
        bank: Option<String>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("getcurcur starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let orchestrator = build_orchestrator(&config)?;

    match command {
        AppCommand::Show {
            banks,
            currency,
            format,
            no_cache,
        } => {
            let keys = if banks.is_empty() {
                vec![config.default_provider.clone()]
            } else {
                banks
            };
            cli::show::run(
                &orchestrator,
                &keys,
                currency.as_deref(),
                format,
                no_cache || config.force_refresh,
            )
            .await
        }
        AppCommand::Convert {
            amount,
            from,
            to,
            bank,
            side,
        } => {
            let key = bank.unwrap_or_else(|| config.default_provider.clone());
            cli::convert::run(
                &orchestrator,
                &key,
                amount,
                &from,
                &to,
                side,
                config.force_refresh,
            )
            .await
        }
        AppCommand::ListProviders => {
            cli::providers::run(&orchestrator.list_providers());
            Ok(())
        }
        AppCommand::ClearCache { bank } => cli::cache::clear(&orchestrator, bank.as_deref()).await,
    }
}

/// Wires the registry, cache and fetch options described by `config`.
pub fn build_orchestrator(config: &AppConfig) -> Result<RateOrchestrator> {
    let options = FetchOptions::from_config(config);

    // The HTTP client must not cut off a provider before its own timeout does.
    let client_timeout = options
        .timeouts
        .values()
        .copied()
        .chain([options.timeout])
        .max()
        .unwrap_or(Duration::from_secs(config.fetch.timeout_secs));
    let client = PageClient::new(client_timeout).context("Failed to build HTTP client")?;

    let registry =
        providers::builtin_registry(config, &client).context("Failed to register providers")?;

    let data_path = config.default_data_path()?;
    let collection = store::open_collection(&config.cache, &data_path)
        .with_context(|| format!("Failed to open cache in {}", data_path.display()))?;
    debug!(
        "Cache backend {:?} at {}",
        config.cache.backend,
        data_path.display()
    );

    Ok(RateOrchestrator::new(
        Arc::new(registry),
        RateCache::new(collection),
        options,
    ))
}
