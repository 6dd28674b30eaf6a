use super::ui;
use crate::core::convert::{Conversion, convert};
use crate::core::rate::RateSide;
use crate::orchestrator::{ProviderStatus, RateOrchestrator};
use anyhow::{Result, anyhow};
use rust_decimal::Decimal;

pub async fn run(
    orchestrator: &RateOrchestrator,
    key: &str,
    amount: Decimal,
    from: &str,
    to: &str,
    side: RateSide,
    force_refresh: bool,
) -> Result<()> {
    let pb = ui::new_spinner("Calculating...");
    let mut report = orchestrator.get_rates(&[key], force_refresh).await;
    pb.finish_and_clear();

    if let Some((_, err)) = report.errors.pop_first() {
        return Err(anyhow!(err).context("Failed to fetch exchange rates"));
    }
    let (_, rates) = report
        .results
        .pop_first()
        .ok_or_else(|| anyhow!("No exchange rates available from {key}"))?;

    if let ProviderStatus::Degraded { reason } = &rates.status {
        eprintln!(
            "{}",
            ui::style_text(
                &format!("Using cached rates from {} ({reason})", rates.stored_at),
                ui::StyleType::Warning
            )
        );
    }

    let conversion = convert(
        &rates.records,
        &rates.descriptor.quote_currency,
        amount,
        from,
        to,
        side,
    )
    .map_err(|e| anyhow!("Cannot convert {} to {}: {e}", from.to_uppercase(), to.to_uppercase()))?;

    println!(
        "{}",
        ui::style_text(&summary_line(&conversion), ui::StyleType::Success)
    );
    println!("{}", ui::style_text(&format!("Rate type: {side}"), ui::StyleType::Subtle));
    println!(
        "{}",
        ui::style_text(
            &format!("Provider: {}", rates.descriptor.display_name),
            ui::StyleType::Subtle
        )
    );
    Ok(())
}

fn summary_line(conversion: &Conversion) -> String {
    format!(
        "{} {} = {} {}",
        ui::format_amount(conversion.amount),
        conversion.from,
        ui::format_amount(conversion.result),
        conversion.to
    )
}
