//! Rate source abstraction

use crate::core::error::{FetchError, MalformedRecord};
use crate::core::rate::{ProviderDescriptor, RawRateRow};
use async_trait::async_trait;

/// Page content exactly as retrieved from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub url: String,
    pub body: String,
}

/// Outcome of parsing one table row.
pub type ParsedRow = Result<RawRateRow, MalformedRecord>;

/// A single external rate source.
///
/// `fetch_raw` is the only method allowed to do I/O. `parse` must be pure so
/// it can be exercised against captured pages.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn identify(&self) -> ProviderDescriptor;

    async fn fetch_raw(&self) -> Result<RawPayload, FetchError>;

    /// Splits a payload into rows. Fails as a whole only when the page no
    /// longer has the expected structure.
    fn parse(&self, payload: &RawPayload) -> Result<Vec<ParsedRow>, FetchError>;
}
