use super::ui;
use crate::core::rate::RateRecord;
use crate::orchestrator::{ProviderRates, ProviderStatus, RateOrchestrator, RateReport};
use anyhow::{Result, bail};
use clap::ValueEnum;
use comfy_table::{Cell, Color};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

pub async fn run(
    orchestrator: &RateOrchestrator,
    keys: &[String],
    currency: Option<&str>,
    format: OutputFormat,
    force_refresh: bool,
) -> Result<()> {
    let pb = ui::new_spinner(&format!("Fetching rates from {}...", keys.join(", ")));
    let report = orchestrator.get_rates(keys, force_refresh).await;
    pb.finish_and_clear();

    report_problems(&report);
    if report.is_empty() {
        bail!("No exchange rate data could be retrieved");
    }

    let currency = currency.map(|c| c.trim().to_uppercase());
    let sections = filter_results(&report, currency.as_deref());
    if sections.iter().all(|(_, records)| records.is_empty()) {
        match currency {
            Some(code) => println!(
                "{}",
                ui::style_text(&format!("No data found for currency: {code}"), ui::StyleType::Warning)
            ),
            None => println!(
                "{}",
                ui::style_text("No exchange rate data found.", ui::StyleType::Warning)
            ),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => {
            for (rates, records) in &sections {
                println!("{}", render_table(rates, records));
            }
        }
        OutputFormat::Json => println!("{}", render_json(&sections)?),
        OutputFormat::Csv => print!("{}", render_csv(&sections)?),
    }
    Ok(())
}

/// Prints provider errors and degraded results to stderr.
fn report_problems(report: &RateReport) {
    for (key, err) in &report.errors {
        eprintln!(
            "{}",
            ui::style_text(&format!("Error from {key}: {err}"), ui::StyleType::Error)
        );
    }
    for rates in report.results.values() {
        if let ProviderStatus::Degraded { reason } = &rates.status {
            eprintln!(
                "{}",
                ui::style_text(
                    &format!(
                        "Showing cached rates for {} from {} ({reason})",
                        rates.descriptor.key,
                        rates.stored_at.format("%Y-%m-%d %H:%M:%S UTC")
                    ),
                    ui::StyleType::Warning
                )
            );
        }
    }
}

fn filter_results<'a>(
    report: &'a RateReport,
    currency: Option<&str>,
) -> Vec<(&'a ProviderRates, Vec<&'a RateRecord>)> {
    report
        .results
        .values()
        .map(|rates| {
            let records = rates
                .records
                .iter()
                .filter(|r| currency.is_none_or(|code| r.currency_code == code))
                .collect();
            (rates, records)
        })
        .collect()
}

pub fn render_table(rates: &ProviderRates, records: &[&RateRecord]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Code"),
        ui::header_cell("Unit"),
        ui::header_cell("Cash Buy"),
        ui::header_cell("Cash Sell"),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.currency_name).fg(Color::Cyan),
            Cell::new(&record.currency_code).fg(Color::Magenta),
            Cell::new(record.unit),
            ui::rate_cell(record.cash_buy, Color::Green),
            ui::rate_cell(record.cash_sell, Color::Yellow),
        ]);
    }

    let status = match &rates.status {
        ProviderStatus::Fresh => "fetched",
        ProviderStatus::Cached => "cached",
        ProviderStatus::Degraded { .. } => "stale",
    };
    format!(
        "\n{}\n{}\n{table}",
        ui::style_text(
            &format!("Exchange Rates from {}", rates.descriptor.display_name),
            ui::StyleType::Title
        ),
        ui::style_text(
            &format!(
                "Quoted in {} · {status} at {}",
                rates.descriptor.quote_currency,
                rates.stored_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            ui::StyleType::Subtle
        ),
    )
}

pub fn render_json(sections: &[(&ProviderRates, Vec<&RateRecord>)]) -> Result<String> {
    let records: Vec<&RateRecord> = sections
        .iter()
        .flat_map(|(_, records)| records.iter().copied())
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

pub fn render_csv(sections: &[(&ProviderRates, Vec<&RateRecord>)]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Currency",
        "Code",
        "Unit",
        "Cash Buy",
        "Cash Sell",
        "Provider",
        "Country",
        "Fetched At",
    ])?;
    for record in sections.iter().flat_map(|(_, records)| records.iter()) {
        writer.write_record([
            record.currency_name.clone(),
            record.currency_code.clone(),
            record.unit.to_string(),
            record.cash_buy.map(|v| v.to_string()).unwrap_or_default(),
            record.cash_sell.map(|v| v.to_string()).unwrap_or_default(),
            record.provider_id.clone(),
            record.country.clone(),
            record.fetched_at.to_rfc3339(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate::ProviderDescriptor;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn report() -> RateReport {
        let fetched_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let record = |code: &str, name: &str, buy, sell| RateRecord {
            currency_name: name.to_string(),
            currency_code: code.to_string(),
            unit: 1,
            cash_buy: buy,
            cash_sell: sell,
            provider_id: "korea.hana".to_string(),
            country: "KR".to_string(),
            fetched_at,
        };
        let rates = ProviderRates {
            descriptor: ProviderDescriptor::new("korea.hana", "KEB Hana Bank (Korea)", "KR", "KRW"),
            records: vec![
                record("USD", "미국, 달러", Some(dec!(1300.00)), Some(dec!(1350.00))),
                record("EUR", "유로", None, Some(dec!(1500.5))),
            ],
            stored_at: fetched_at,
            status: ProviderStatus::Fresh,
        };
        RateReport {
            results: BTreeMap::from([("korea.hana".to_string(), rates)]),
            errors: BTreeMap::new(),
        }
    }

    #[test]
    fn test_filter_by_currency() {
        let report = report();
        let sections = filter_results(&report, Some("EUR"));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].1.len(), 1);
        assert_eq!(sections[0].1[0].currency_code, "EUR");

        assert!(filter_results(&report, Some("GBP"))[0].1.is_empty());
        assert_eq!(filter_results(&report, None)[0].1.len(), 2);
    }

    #[test]
    fn test_render_csv_quotes_and_blanks() {
        let report = report();
        let csv = render_csv(&filter_results(&report, None)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Currency,Code,Unit,Cash Buy,Cash Sell,Provider,Country,Fetched At"
        );
        assert_eq!(
            lines[1],
            "\"미국, 달러\",USD,1,1300.00,1350.00,korea.hana,KR,2026-03-02T09:00:00+00:00"
        );
        assert!(lines[2].starts_with("유로,EUR,1,,1500.5,"));
    }

    #[test]
    fn test_render_json_is_a_record_array() {
        let report = report();
        let json = render_json(&filter_results(&report, Some("USD"))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["currency_code"], "USD");
        assert_eq!(value[0]["cash_sell"], "1350.00");
        assert_eq!(value[0]["provider_id"], "korea.hana");
    }

    #[test]
    fn test_render_table_mentions_provider_and_rates() {
        let report = report();
        let sections = filter_results(&report, None);
        let table = render_table(sections[0].0, &sections[0].1);

        assert!(table.contains("KEB Hana Bank (Korea)"));
        assert!(table.contains("1,300.00"));
        assert!(table.contains("1,500.50"));
    }
}
