//! Quote Provider Adapters
//!
//! HTTP implementation of `QuoteFetcherPort` against a Yahoo-style quote API.

mod yahoo;

pub use yahoo::{QUOTE_FIELDS, YahooQuoteFetcher};
