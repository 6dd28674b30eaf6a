//! `scraper` helpers shared by the bank providers.

use crate::core::error::{FetchError, MalformedRecord};
use crate::core::provider::ParsedRow;
use crate::core::rate::RawRateRow;
use scraper::{ElementRef, Html, Selector};

fn selector(provider: &str, css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css)
        .map_err(|e| FetchError::shape_changed(provider, format!("invalid selector '{css}': {e}")))
}

/// Text cells of every row matched by `row_selector`.
///
/// Fails with `SourceShapeChanged` when the selector matches nothing, which
/// is how a redesigned page shows up.
pub fn table_rows(
    provider: &str,
    document: &Html,
    row_selector: &str,
) -> Result<Vec<Vec<String>>, FetchError> {
    let rows = selector(provider, row_selector)?;
    let cells = selector(provider, "td")?;

    let table: Vec<Vec<String>> = document
        .select(&rows)
        .map(|row| row.select(&cells).map(cell_text).collect())
        .collect();

    if table.is_empty() {
        return Err(FetchError::shape_changed(
            provider,
            format!("missing anchor '{row_selector}'"),
        ));
    }
    Ok(table)
}

/// Checks that a downloaded page still contains the rate table.
pub fn ensure_anchor(provider: &str, body: &str, row_selector: &str) -> Result<(), FetchError> {
    let document = Html::parse_document(body);
    let rows = selector(provider, row_selector)?;
    if document.select(&rows).next().is_none() {
        return Err(FetchError::shape_changed(
            provider,
            format!("missing anchor '{row_selector}'"),
        ));
    }
    Ok(())
}

/// Column positions of the fields inside a rate table row.
#[derive(Debug, Clone, Copy)]
pub struct ColumnLayout {
    pub name: usize,
    pub code: usize,
    pub cash_buy: usize,
    pub cash_sell: usize,
}

impl ColumnLayout {
    fn width(&self) -> usize {
        [self.name, self.code, self.cash_buy, self.cash_sell]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Maps every table row to a [`RawRateRow`].
    ///
    /// Rows that are too short are reported as malformed. Rows without a
    /// currency code (separators, sub-headers) are skipped.
    pub fn extract(
        &self,
        provider: &str,
        body: &str,
        row_selector: &str,
    ) -> Result<Vec<ParsedRow>, FetchError> {
        let document = Html::parse_document(body);
        let rows = table_rows(provider, &document, row_selector)?;
        let width = self.width();

        Ok(rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, cells)| {
                if cells.len() < width {
                    return Some(Err(MalformedRecord::new(
                        index,
                        format!("expected at least {width} cells, found {}", cells.len()),
                    )));
                }
                let code = cells[self.code].trim();
                if code.is_empty() || code == "-" {
                    return None;
                }
                Some(Ok(RawRateRow {
                    currency_name: cells[self.name].clone(),
                    currency_code: code.to_string(),
                    cash_buy: cells[self.cash_buy].clone(),
                    cash_sell: cells[self.cash_sell].clone(),
                }))
            })
            .collect())
    }
}

/// Visible text of a cell with whitespace runs collapsed.
pub fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
