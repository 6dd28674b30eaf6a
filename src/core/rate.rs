//! Canonical exchange rate shapes shared by providers, cache and callers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity of a registered rate source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Stable `country.bank` key, e.g. `korea.hana`.
    pub key: String,
    pub display_name: String,
    /// ISO-3166 alpha-2 country code.
    pub country: String,
    /// Currency every rate of this provider is quoted in.
    pub quote_currency: String,
    pub source_url: String,
}

impl ProviderDescriptor {
    pub fn new(key: &str, display_name: &str, country: &str, quote_currency: &str) -> Self {
        Self {
            key: key.to_lowercase(),
            display_name: display_name.to_string(),
            country: country.to_uppercase(),
            quote_currency: quote_currency.to_uppercase(),
            source_url: String::new(),
        }
    }

    pub fn with_source_url(mut self, url: &str) -> Self {
        self.source_url = url.to_string();
        self
    }

    /// Bank part of the key (`hana` for `korea.hana`).
    pub fn bank(&self) -> &str {
        self.key.rsplit('.').next().unwrap_or(&self.key)
    }
}

/// A single table row as scraped from a source, before any validation.
///
/// Every field keeps the page's own formatting; the normalizer owns the
/// interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRateRow {
    pub currency_name: String,
    pub currency_code: String,
    pub cash_buy: String,
    pub cash_sell: String,
}

/// Validated exchange rate observation for one currency from one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecord {
    pub currency_name: String,
    /// Uppercase ISO-4217 code.
    pub currency_code: String,
    /// Amount of foreign currency the quoted price refers to (100 for JPY at Korean banks).
    #[serde(default = "default_unit")]
    pub unit: u32,
    pub cash_buy: Option<Decimal>,
    pub cash_sell: Option<Decimal>,
    pub provider_id: String,
    pub country: String,
    pub fetched_at: DateTime<Utc>,
}

fn default_unit() -> u32 {
    1
}

impl RateRecord {
    /// Rate for the requested side, per single unit of the foreign currency.
    pub fn per_unit(&self, side: RateSide) -> Option<Decimal> {
        let rate = match side {
            RateSide::Buy => self.cash_buy,
            RateSide::Sell => self.cash_sell,
        }?;
        Some(rate / Decimal::from(self.unit.max(1)))
    }
}

/// Which side of a bank quote to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSide {
    Buy,
    Sell,
}

impl std::str::FromStr for RateSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "cash_buy" => Ok(RateSide::Buy),
            "sell" | "cash_sell" => Ok(RateSide::Sell),
            _ => Err(anyhow::anyhow!(
                "Invalid transaction type: {}. Must be 'buy' or 'sell'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for RateSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateSide::Buy => write!(f, "Cash Buy"),
            RateSide::Sell => write!(f, "Cash Sell"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_descriptor_key_parts() {
        let descriptor = ProviderDescriptor::new("Korea.Hana", "KEB Hana Bank (Korea)", "kr", "krw");
        assert_eq!(descriptor.key, "korea.hana");
        assert_eq!(descriptor.bank(), "hana");
        assert_eq!(descriptor.country, "KR");
        assert_eq!(descriptor.quote_currency, "KRW");
    }

    #[test]
    fn test_per_unit_divides_by_quotation_unit() {
        let record = RateRecord {
            currency_name: "일본 JPY 100".to_string(),
            currency_code: "JPY".to_string(),
            unit: 100,
            cash_buy: Some(dec!(950.00)),
            cash_sell: None,
            provider_id: "korea.hana".to_string(),
            country: "KR".to_string(),
            fetched_at: Utc::now(),
        };
        assert_eq!(record.per_unit(RateSide::Buy), Some(dec!(9.5)));
        assert_eq!(record.per_unit(RateSide::Sell), None);
    }

    #[test]
    fn test_rate_side_from_str() {
        assert_eq!("buy".parse::<RateSide>().unwrap(), RateSide::Buy);
        assert_eq!("SELL".parse::<RateSide>().unwrap(), RateSide::Sell);
        assert!("hold".parse::<RateSide>().is_err());
    }
}
