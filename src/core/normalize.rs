//! Turns scraped table rows into validated [`RateRecord`]s.
//!
//! Everything here is pure: the same rows and timestamp always yield the same
//! records. Rows that cannot be interpreted are dropped and reported; a set
//! with no usable row at all means the source no longer looks like we expect.

use crate::core::error::{FetchError, MalformedRecord};
use crate::core::provider::ParsedRow;
use crate::core::rate::{ProviderDescriptor, RateRecord, RawRateRow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

/// Records that survived validation plus the rows that did not.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub records: Vec<RateRecord>,
    pub rejected: Vec<MalformedRecord>,
}

pub fn normalize(
    descriptor: &ProviderDescriptor,
    rows: Vec<ParsedRow>,
    fetched_at: DateTime<Utc>,
) -> Result<Normalized, FetchError> {
    let mut records: Vec<RateRecord> = Vec::with_capacity(rows.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rejected = Vec::new();

    for (index, row) in rows.into_iter().enumerate() {
        let record = row.and_then(|raw| to_record(index, &raw, descriptor, fetched_at));
        match record {
            Ok(record) => match positions.get(&record.currency_code) {
                Some(&slot) => {
                    debug!(
                        provider = %descriptor.key,
                        code = %record.currency_code,
                        "Duplicate currency row, keeping the later one"
                    );
                    records[slot] = record;
                }
                None => {
                    positions.insert(record.currency_code.clone(), records.len());
                    records.push(record);
                }
            },
            Err(malformed) => {
                warn!(provider = %descriptor.key, %malformed, "Dropping row");
                rejected.push(malformed);
            }
        }
    }

    if records.is_empty() {
        return Err(FetchError::shape_changed(
            &descriptor.key,
            format!("no valid rate rows ({} rejected)", rejected.len()),
        ));
    }

    Ok(Normalized { records, rejected })
}

fn to_record(
    row: usize,
    raw: &RawRateRow,
    descriptor: &ProviderDescriptor,
    fetched_at: DateTime<Utc>,
) -> Result<RateRecord, MalformedRecord> {
    let (currency_code, unit) = split_code_and_unit(&raw.currency_code)
        .ok_or_else(|| MalformedRecord::new(row, format!("invalid currency code '{}'", raw.currency_code)))?;

    let cash_buy = parse_locale_decimal(&raw.cash_buy)
        .map_err(|e| MalformedRecord::new(row, format!("cash buy: {e}")))?;
    let cash_sell = parse_locale_decimal(&raw.cash_sell)
        .map_err(|e| MalformedRecord::new(row, format!("cash sell: {e}")))?;

    let currency_name = match raw.currency_name.trim() {
        "" => currency_code.clone(),
        name => name.split_whitespace().collect::<Vec<_>>().join(" "),
    };

    let record = RateRecord {
        currency_name,
        currency_code,
        unit,
        cash_buy,
        cash_sell,
        provider_id: descriptor.key.clone(),
        country: descriptor.country.clone(),
        fetched_at,
    };
    validate_record(&record).map_err(|reason| MalformedRecord::new(row, reason))?;
    Ok(record)
}

/// Checks the invariants every surfaced record must hold.
pub fn validate_record(record: &RateRecord) -> Result<(), String> {
    if !is_currency_code(&record.currency_code) {
        return Err(format!("invalid currency code '{}'", record.currency_code));
    }
    match (record.cash_buy, record.cash_sell) {
        (None, None) => return Err("no cash rate present".to_string()),
        (Some(buy), Some(sell)) if buy > sell => {
            return Err(format!("cash buy {buy} exceeds cash sell {sell}"));
        }
        _ => {}
    }
    for rate in [record.cash_buy, record.cash_sell].into_iter().flatten() {
        if rate <= Decimal::ZERO {
            return Err(format!("non-positive rate {rate}"));
        }
    }
    if record.unit == 0 {
        return Err("quotation unit is zero".to_string());
    }
    Ok(())
}

pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

/// Extracts an ISO code and its quotation unit from cells such as `USD`,
/// `jpy (100)`, `JPY100` or `미국 USD`.
pub fn split_code_and_unit(cell: &str) -> Option<(String, u32)> {
    let upper = cell.to_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        let letters: String = token.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
        if letters.len() != 3 {
            continue;
        }
        let suffix = &token[letters.len()..];
        let unit = if !suffix.is_empty() {
            suffix.parse::<u32>().ok()?
        } else {
            tokens
                .get(i + 1)
                .and_then(|next| next.parse::<u32>().ok())
                .unwrap_or(1)
        };
        return Some((letters, unit));
    }
    None
}

/// Parses a bank-formatted number. Blank cells and dashes mean "not quoted".
///
/// Accepts `1,300.50`, `1.300,50`, `1 300,50`, `1300` and `1'300.50`. With a
/// single separator, a comma followed by exactly three digits is read as a
/// thousands separator, otherwise as the decimal point; a single period is
/// always the decimal point.
pub fn parse_locale_decimal(text: &str) -> Result<Option<Decimal>, String> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '-') || cleaned.eq_ignore_ascii_case("n/a") {
        return Ok(None);
    }
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || c == ',' || c == '.' || c == '-' || c == '+')
    {
        return Err(format!("not a number: '{}'", text.trim()));
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let canonical = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            let commas = cleaned.matches(',').count();
            let decimals = cleaned.len() - comma - 1;
            if commas == 1 && decimals != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    Decimal::from_str(&canonical)
        .map(Some)
        .map_err(|e| format!("not a number: '{}' ({e})", text.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor::new("korea.hana", "KEB Hana Bank (Korea)", "KR", "KRW")
    }

    fn row(name: &str, code: &str, buy: &str, sell: &str) -> ParsedRow {
        Ok(RawRateRow {
            currency_name: name.to_string(),
            currency_code: code.to_string(),
            cash_buy: buy.to_string(),
            cash_sell: sell.to_string(),
        })
    }

    #[test]
    fn test_parse_locale_decimal_variants() {
        assert_eq!(parse_locale_decimal("1,300.50").unwrap(), Some(dec!(1300.50)));
        assert_eq!(parse_locale_decimal("1.300,50").unwrap(), Some(dec!(1300.50)));
        assert_eq!(parse_locale_decimal(" 1 300,5 ").unwrap(), Some(dec!(1300.5)));
        assert_eq!(parse_locale_decimal("1,300").unwrap(), Some(dec!(1300)));
        assert_eq!(parse_locale_decimal("1.234.567").unwrap(), Some(dec!(1234567)));
        assert_eq!(parse_locale_decimal("9.52").unwrap(), Some(dec!(9.52)));
        assert_eq!(parse_locale_decimal("12,5").unwrap(), Some(dec!(12.5)));
        assert_eq!(parse_locale_decimal("1'300.50").unwrap(), Some(dec!(1300.50)));
        assert_eq!(parse_locale_decimal("1\u{a0}300,50").unwrap(), Some(dec!(1300.50)));
    }

    #[test]
    fn test_parse_locale_decimal_absent_and_invalid() {
        assert_eq!(parse_locale_decimal("").unwrap(), None);
        assert_eq!(parse_locale_decimal("  - ").unwrap(), None);
        assert_eq!(parse_locale_decimal("N/A").unwrap(), None);
        assert!(parse_locale_decimal("abc").is_err());
        assert!(parse_locale_decimal("1,2,3.4.5").is_err());
    }

    #[test]
    fn test_split_code_and_unit() {
        assert_eq!(split_code_and_unit("USD"), Some(("USD".to_string(), 1)));
        assert_eq!(split_code_and_unit(" usd "), Some(("USD".to_string(), 1)));
        assert_eq!(split_code_and_unit("JPY (100)"), Some(("JPY".to_string(), 100)));
        assert_eq!(split_code_and_unit("JPY100"), Some(("JPY".to_string(), 100)));
        assert_eq!(split_code_and_unit("미국 USD"), Some(("USD".to_string(), 1)));
        assert_eq!(split_code_and_unit("US"), None);
        assert_eq!(split_code_and_unit("DOLLAR"), None);
        assert_eq!(split_code_and_unit(""), None);
    }

    #[test]
    fn test_normalize_builds_records() {
        let fetched_at = Utc::now();
        let rows = vec![
            row("미국", "usd", "1,300.00", "1,350.00"),
            row("일본", "JPY (100)", "950.10", "985.40"),
        ];

        let normalized = normalize(&descriptor(), rows, fetched_at).unwrap();

        assert!(normalized.rejected.is_empty());
        assert_eq!(normalized.records.len(), 2);
        let usd = &normalized.records[0];
        assert_eq!(usd.currency_code, "USD");
        assert_eq!(usd.currency_name, "미국");
        assert_eq!(usd.cash_buy, Some(dec!(1300.00)));
        assert_eq!(usd.cash_sell, Some(dec!(1350.00)));
        assert_eq!(usd.provider_id, "korea.hana");
        assert_eq!(usd.country, "KR");
        assert_eq!(usd.fetched_at, fetched_at);
        assert_eq!(normalized.records[1].unit, 100);
    }

    #[test]
    fn test_normalize_drops_invalid_rows() {
        let rows = vec![
            row("미국", "USD", "1,300.00", "1,350.00"),
            row("역전", "EUR", "1,500.00", "1,400.00"),
            row("코드없음", "??", "1.00", "2.00"),
            row("빈값", "GBP", "-", "-"),
            row("음수", "CAD", "-5", "10"),
            Err(MalformedRecord::new(5, "expected 5 cells, found 2")),
        ];

        let normalized = normalize(&descriptor(), rows, Utc::now()).unwrap();

        assert_eq!(normalized.records.len(), 1);
        assert_eq!(normalized.records[0].currency_code, "USD");
        let rejected_rows: Vec<usize> = normalized.rejected.iter().map(|m| m.row).collect();
        assert_eq!(rejected_rows, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_normalize_single_sided_quote_is_kept() {
        let rows = vec![row("중국", "CNY", "", "195.20")];
        let normalized = normalize(&descriptor(), rows, Utc::now()).unwrap();
        assert_eq!(normalized.records[0].cash_buy, None);
        assert_eq!(normalized.records[0].cash_sell, Some(dec!(195.20)));
    }

    #[test]
    fn test_normalize_last_duplicate_wins_in_first_slot() {
        let rows = vec![
            row("미국", "USD", "1,300.00", "1,350.00"),
            row("유로", "EUR", "1,400.00", "1,450.00"),
            row("미국 (송금)", "USD", "1,310.00", "1,340.00"),
        ];

        let normalized = normalize(&descriptor(), rows, Utc::now()).unwrap();

        let codes: Vec<&str> = normalized
            .records
            .iter()
            .map(|r| r.currency_code.as_str())
            .collect();
        assert_eq!(codes, vec!["USD", "EUR"]);
        assert_eq!(normalized.records[0].cash_buy, Some(dec!(1310.00)));
        assert_eq!(normalized.records[0].currency_name, "미국 (송금)");
    }

    #[test]
    fn test_normalize_escalates_when_nothing_valid() {
        let rows = vec![row("역전", "EUR", "2", "1"), row("", "", "1", "2")];

        let err = normalize(&descriptor(), rows, Utc::now()).unwrap_err();

        assert!(matches!(err, FetchError::SourceShapeChanged { .. }));
        assert!(err.to_string().contains("2 rejected"));
    }

    #[test]
    fn test_validate_record_invariants() {
        let mut record = RateRecord {
            currency_name: "미국".to_string(),
            currency_code: "USD".to_string(),
            unit: 1,
            cash_buy: Some(dec!(1300)),
            cash_sell: Some(dec!(1300)),
            provider_id: "korea.hana".to_string(),
            country: "KR".to_string(),
            fetched_at: Utc::now(),
        };
        assert!(validate_record(&record).is_ok());

        record.currency_code = "usd".to_string();
        assert!(validate_record(&record).is_err());
        record.currency_code = "USD".to_string();

        record.cash_buy = Some(dec!(1301));
        assert!(validate_record(&record).is_err());
    }
}
