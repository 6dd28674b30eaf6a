//! Core rate model, provider contract and fetch building blocks

pub mod breaker;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod log;
pub mod normalize;
pub mod provider;
pub mod rate;
pub mod registry;
pub mod retry;

// Re-export main types for cleaner imports
pub use error::{CacheError, ErrorKind, FetchError, MalformedRecord};
pub use provider::{ParsedRow, RateProvider, RawPayload};
pub use rate::{ProviderDescriptor, RateRecord, RateSide, RawRateRow};
pub use registry::ProviderRegistry;
