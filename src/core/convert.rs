//! Amount conversion over one provider's rate set.

use crate::core::rate::{RateRecord, RateSide};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Currency {0} not found in available rates")]
    UnknownCurrency(String),

    #[error("No {side} rate available for {code}")]
    MissingRate { code: String, side: RateSide },

    #[error("Converting {amount} {from} to {to} overflows")]
    Overflow {
        amount: Decimal,
        from: String,
        to: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
    pub side: RateSide,
    /// Units of `to` per single unit of `from`.
    pub rate: Decimal,
    pub result: Decimal,
}

/// Converts `amount` of `from` into `to`.
///
/// Rates are quoted in `quote_currency` per `unit` of the foreign currency.
/// Conversions between two foreign currencies go through the quote currency
/// using the same side for both legs.
pub fn convert(
    records: &[RateRecord],
    quote_currency: &str,
    amount: Decimal,
    from: &str,
    to: &str,
    side: RateSide,
) -> Result<Conversion, ConvertError> {
    if amount < Decimal::ZERO {
        return Err(ConvertError::NegativeAmount);
    }

    let from = from.trim().to_uppercase();
    let to = to.trim().to_uppercase();
    let quote = quote_currency.to_uppercase();

    let from_value = value_in_quote(records, &quote, &from, side)?;
    let to_value = value_in_quote(records, &quote, &to, side)?;
    let overflow = || ConvertError::Overflow {
        amount,
        from: from.clone(),
        to: to.clone(),
    };
    let result = amount
        .checked_mul(from_value)
        .and_then(|v| v.checked_div(to_value))
        .ok_or_else(overflow)?;
    let rate = from_value.checked_div(to_value).ok_or_else(overflow)?;
    Ok(Conversion {
        amount,
        result,
        rate,
        from,
        to,
        side,
    })
}

/// Price of one unit of `code` expressed in the quote currency.
fn value_in_quote(
    records: &[RateRecord],
    quote: &str,
    code: &str,
    side: RateSide,
) -> Result<Decimal, ConvertError> {
    if code == quote {
        return Ok(Decimal::ONE);
    }
    let record = records
        .iter()
        .find(|r| r.currency_code == code)
        .ok_or_else(|| ConvertError::UnknownCurrency(code.to_string()))?;
    record
        .per_unit(side)
        .filter(|rate| !rate.is_zero())
        .ok_or_else(|| ConvertError::MissingRate {
            code: code.to_string(),
            side,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn record(code: &str, unit: u32, buy: Option<Decimal>, sell: Option<Decimal>) -> RateRecord {
        RateRecord {
            currency_name: code.to_string(),
            currency_code: code.to_string(),
            unit,
            cash_buy: buy,
            cash_sell: sell,
            provider_id: "korea.hana".to_string(),
            country: "KR".to_string(),
            fetched_at: Utc::now(),
        }
    }

    fn rates() -> Vec<RateRecord> {
        vec![
            record("USD", 1, Some(dec!(1300)), Some(dec!(1350))),
            record("JPY", 100, Some(dec!(900)), Some(dec!(950))),
            record("EUR", 1, None, Some(dec!(1500))),
        ]
    }

    #[test]
    fn test_foreign_to_quote_currency() {
        let buy = convert(&rates(), "KRW", dec!(100), "usd", "KRW", RateSide::Buy).unwrap();
        assert_eq!(buy.result, dec!(130000));
        assert_eq!(buy.from, "USD");

        let sell = convert(&rates(), "KRW", dec!(100), "USD", "KRW", RateSide::Sell).unwrap();
        assert_eq!(sell.result, dec!(135000));
    }

    #[test]
    fn test_quotation_unit_is_honoured() {
        let result = convert(&rates(), "KRW", dec!(1000), "JPY", "KRW", RateSide::Buy).unwrap();
        assert_eq!(result.result, dec!(9000));
    }

    #[test]
    fn test_cross_rate_goes_through_quote_currency() {
        let result = convert(&rates(), "KRW", dec!(1300), "JPY", "USD", RateSide::Buy).unwrap();
        assert_eq!(result.result, dec!(9));
        assert_eq!(result.rate, dec!(9) / dec!(1300));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            convert(&rates(), "KRW", dec!(-1), "USD", "KRW", RateSide::Buy),
            Err(ConvertError::NegativeAmount)
        );
        assert_eq!(
            convert(&rates(), "KRW", dec!(1), "GBP", "KRW", RateSide::Buy),
            Err(ConvertError::UnknownCurrency("GBP".to_string()))
        );
        assert_eq!(
            convert(&rates(), "KRW", dec!(1), "EUR", "KRW", RateSide::Buy),
            Err(ConvertError::MissingRate {
                code: "EUR".to_string(),
                side: RateSide::Buy
            })
        );
    }

    #[test]
    fn test_huge_amount_reports_overflow() {
        assert_eq!(
            convert(&rates(), "KRW", Decimal::MAX, "USD", "KRW", RateSide::Buy),
            Err(ConvertError::Overflow {
                amount: Decimal::MAX,
                from: "USD".to_string(),
                to: "KRW".to_string(),
            })
        );
        // Shrinking through a smaller rate stays representable
        let result = convert(&rates(), "KRW", Decimal::MAX, "KRW", "USD", RateSide::Buy);
        assert!(result.is_ok(), "{result:?}");
    }
}
