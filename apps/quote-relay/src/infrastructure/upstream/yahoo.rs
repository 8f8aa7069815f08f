//! Yahoo Finance Quote Fetcher
//!
//! Fetches a batch of quotes in one `GET {base}/v7/finance/quote` call and
//! maps each result row onto a [`Quote`]. Fields the provider leaves out stay
//! `None`. A row that cannot be decoded is skipped without failing the batch.
//!
//! # Session
//!
//! The public Yahoo endpoint only answers clients holding a session cookie
//! and the matching crumb. With a session URL configured the fetcher:
//!
//! 1. visits the session URL so the cookie store picks up the cookie,
//! 2. reads the crumb from `GET {base}/v1/test/getcrumb`,
//! 3. sends `crumb=` with every quote request,
//! 4. drops the crumb and repeats the handshake once on 401/403.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

use crate::application::ports::{QuoteFetcherPort, UpstreamError};
use crate::domain::quote::{Quote, Symbol};

/// Fields requested from the provider.
pub const QUOTE_FIELDS: &str =
    "regularMarketPrice,regularMarketChangePercent,longName,shortName,symbol,exchange,currency";

/// Longest error body kept in an `UpstreamError`.
const MAX_ERROR_BODY: usize = 512;

const USER_AGENT: &str = concat!("quote-relay/", env!("CARGO_PKG_VERSION"));

/// Cookie and crumb state for the Yahoo session handshake.
#[derive(Debug)]
struct YahooSession {
    session_url: String,
    crumb: RwLock<Option<String>>,
}

/// Quote fetcher backed by the Yahoo Finance quote endpoint.
#[derive(Debug, Clone)]
pub struct YahooQuoteFetcher {
    http_client: reqwest::Client,
    base_url: String,
    session: Option<Arc<YahooSession>>,
}

impl YahooQuoteFetcher {
    /// Create a fetcher for the given base URL.
    ///
    /// The fetcher sends plain quote requests until
    /// [`YahooQuoteFetcher::with_session`] enables the crumb handshake.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: None,
        })
    }

    /// Enable the cookie and crumb handshake, priming cookies from
    /// `session_url`.
    #[must_use]
    pub fn with_session(mut self, session_url: impl Into<String>) -> Self {
        self.session = Some(Arc::new(YahooSession {
            session_url: session_url.into(),
            crumb: RwLock::new(None),
        }));
        self
    }

    fn quote_url(&self) -> String {
        format!("{}/v7/finance/quote", self.base_url)
    }

    fn crumb_url(&self) -> String {
        format!("{}/v1/test/getcrumb", self.base_url)
    }

    /// Current crumb, running the handshake when none is held.
    async fn crumb(&self, session: &YahooSession) -> Result<String, UpstreamError> {
        let cached = session.crumb.read().clone();
        if let Some(crumb) = cached {
            return Ok(crumb);
        }

        // The session URL answers with an error status but still sets the cookie.
        self.http_client
            .get(&session.session_url)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let response = self
            .http_client
            .get(self.crumb_url())
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let response = error_for_status(response).await?;

        let crumb = response
            .text()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?
            .trim()
            .to_string();
        if crumb.is_empty() {
            return Err(UpstreamError::Provider("empty crumb".to_string()));
        }

        tracing::debug!("Acquired upstream session crumb");
        *session.crumb.write() = Some(crumb.clone());
        Ok(crumb)
    }

    async fn request_quotes(
        &self,
        joined: &str,
        crumb: Option<&str>,
    ) -> Result<Vec<Quote>, UpstreamError> {
        let mut request = self
            .http_client
            .get(self.quote_url())
            .query(&[("symbols", joined), ("fields", QUOTE_FIELDS)]);
        if let Some(crumb) = crumb {
            request = request.query(&[("crumb", crumb)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let response = error_for_status(response).await?;

        let envelope: QuoteEnvelope = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        let body = envelope.quote_response;
        if let Some(error) = body.error.filter(|e| !e.is_null()) {
            return Err(UpstreamError::Provider(describe_provider_error(&error)));
        }

        Ok(body.result.into_iter().filter_map(decode_row).collect())
    }
}

#[async_trait]
impl QuoteFetcherPort for YahooQuoteFetcher {
    async fn fetch(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, UpstreamError> {
        if symbols.is_empty() {
            return Ok(vec![]);
        }

        let joined = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let Some(session) = self.session.as_deref() else {
            return self.request_quotes(&joined, None).await;
        };

        let crumb = self.crumb(session).await?;
        match self.request_quotes(&joined, Some(&crumb)).await {
            Err(UpstreamError::Status { status: 401 | 403, .. }) => {
                tracing::info!("Upstream rejected session crumb, refreshing");
                *session.crumb.write() = None;
                let crumb = self.crumb(session).await?;
                self.request_quotes(&joined, Some(&crumb)).await
            }
            result => result,
        }
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let mut body = response.text().await.unwrap_or_default();
    truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
    Err(UpstreamError::Status { status, body })
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponseBody,
}

#[derive(Debug, Deserialize)]
struct QuoteResponseBody {
    #[serde(default)]
    result: Vec<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuote {
    symbol: String,
    long_name: Option<String>,
    short_name: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_change_percent: Option<f64>,
    exchange: Option<String>,
    currency: Option<String>,
}

impl From<YahooQuote> for Quote {
    fn from(row: YahooQuote) -> Self {
        Self {
            symbol: row.symbol,
            display_name: row.long_name.or(row.short_name),
            price: row.regular_market_price,
            change_percent: row.regular_market_change_percent,
            exchange: row.exchange,
            currency: row.currency,
        }
    }
}

fn decode_row(row: serde_json::Value) -> Option<Quote> {
    match serde_json::from_value::<YahooQuote>(row) {
        Ok(row) => Some(row.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping undecodable quote row");
            None
        }
    }
}

fn describe_provider_error(error: &serde_json::Value) -> String {
    error
        .get("description")
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| error.to_string(), ToString::to_string)
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn symbols(list: &[&str]) -> Vec<Symbol> {
        list.iter().filter_map(|s| Symbol::parse(s)).collect()
    }

    async fn fetcher_for(server: &MockServer) -> YahooQuoteFetcher {
        YahooQuoteFetcher::new(server.uri(), Some(Duration::from_secs(5))).unwrap()
    }

    #[tokio::test]
    async fn maps_result_rows_in_one_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", "TCS.NS,INFY.NS"))
            .and(query_param("fields", QUOTE_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteResponse": {
                    "result": [
                        {
                            "symbol": "TCS.NS",
                            "longName": "Tata Consultancy Services Limited",
                            "regularMarketPrice": 3850.5,
                            "regularMarketChangePercent": 1.25,
                            "exchange": "NSI",
                            "currency": "INR"
                        },
                        {
                            "symbol": "INFY.NS",
                            "shortName": "INFOSYS LIMITED",
                            "regularMarketPrice": 1450.0
                        }
                    ],
                    "error": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let quotes = fetcher_for(&server)
            .await
            .fetch(&symbols(&["TCS.NS", "INFY.NS"]))
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "TCS.NS");
        assert_eq!(
            quotes[0].display_name.as_deref(),
            Some("Tata Consultancy Services Limited")
        );
        assert_eq!(quotes[0].price, Some(3850.5));
        assert_eq!(quotes[0].currency.as_deref(), Some("INR"));

        assert_eq!(quotes[1].display_name.as_deref(), Some("INFOSYS LIMITED"));
        assert_eq!(quotes[1].change_percent, None);
        assert_eq!(quotes[1].exchange, None);
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .await
            .fetch(&symbols(&["AAA"]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            UpstreamError::Status {
                status: 429,
                body: "Too Many Requests".to_string()
            }
        );
    }

    #[tokio::test]
    async fn provider_error_payload_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteResponse": {
                    "result": [],
                    "error": { "code": "Bad Request", "description": "Missing value for the \"symbols\" argument" }
                }
            })))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .await
            .fetch(&symbols(&["AAA"]))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Provider(msg) if msg.contains("symbols")));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .await
            .fetch(&symbols(&["AAA"]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let fetcher = YahooQuoteFetcher::new("http://127.0.0.1:1", Some(Duration::from_secs(1))).unwrap();
        let err = fetcher.fetch(&symbols(&["AAA"])).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn empty_symbol_list_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let quotes = fetcher_for(&server).await.fetch(&[]).await.unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn undecodable_row_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteResponse": {
                    "result": [
                        { "symbol": "AAA", "regularMarketPrice": 1.0 },
                        { "regularMarketPrice": 2.0 },
                        { "symbol": "CCC", "regularMarketPrice": "n/a" },
                        { "symbol": "DDD", "currency": "USD" }
                    ],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let quotes = fetcher_for(&server)
            .await
            .fetch(&symbols(&["AAA", "BBB", "CCC", "DDD"]))
            .await
            .unwrap();

        let names: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(names, ["AAA", "DDD"]);
        assert_eq!(quotes[0].price, Some(1.0));
        assert_eq!(quotes[1].price, None);
    }

    fn quote_body(symbol: &str) -> serde_json::Value {
        json!({
            "quoteResponse": {
                "result": [{ "symbol": symbol, "regularMarketPrice": 10.0 }],
                "error": null
            }
        })
    }

    #[tokio::test]
    async fn session_handshake_sends_cookie_and_crumb() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(404).insert_header("set-cookie", "A3=abc; Path=/"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .and(header("cookie", "A3=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("crumb-1"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("crumb", "crumb-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("AAA")))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server)
            .await
            .with_session(format!("{}/session", server.uri()));

        for _ in 0..2 {
            let quotes = fetcher.fetch(&symbols(&["AAA"])).await.unwrap();
            assert_eq!(quotes.len(), 1);
        }
    }

    #[tokio::test]
    async fn rejected_crumb_is_refreshed_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string("stale"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("crumb", "stale"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Crumb"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("crumb", "fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("AAA")))
            .expect(1)
            .mount(&server)
            .await;

        let quotes = fetcher_for(&server)
            .await
            .with_session(format!("{}/session", server.uri()))
            .fetch(&symbols(&["AAA"]))
            .await
            .unwrap();

        assert_eq!(quotes[0].symbol, "AAA");
    }

    #[tokio::test]
    async fn crumb_failure_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/test/getcrumb"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("AAA")))
            .expect(0)
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .await
            .with_session(format!("{}/session", server.uri()))
            .fetch(&symbols(&["AAA"]))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Status { status: 429, .. }));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut s = "ééé".to_string();
        truncate_on_char_boundary(&mut s, 3);
        assert_eq!(s, "é");
    }
}
