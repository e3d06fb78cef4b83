// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! Upstream rate feed client.
//!
//! The HTTP implementation queries a CoinGecko-compatible `simple/price`
//! endpoint for the HBAR price in both USD and NGN, then derives the
//! USD/NGN pivot from the two quotes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use super::OracleError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HBAR_PRICE_ID: &str = "hedera-hashgraph";

/// One upstream quote: the two numbers every snapshot derives from.
#[derive(Debug, Clone)]
pub struct FeedQuote {
    /// HBAR price in USD.
    pub hbar_usd: Decimal,
    /// USD/NGN pivot rate.
    pub usd_ngn: Decimal,
}

/// Upstream price source.
#[async_trait]
pub trait RateFeed: Send + Sync {
    async fn fetch(&self) -> Result<FeedQuote, OracleError>;
}

/// CoinGecko-compatible HTTP rate feed.
#[derive(Debug, Clone)]
pub struct HttpRateFeed {
    base_url: String,
    http: Client,
}

impl HttpRateFeed {
    pub fn new(base_url: impl Into<String>) -> Result<Self, OracleError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OracleError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    fn price_url(&self) -> String {
        format!(
            "{}/simple/price?ids={HBAR_PRICE_ID}&vs_currencies=usd,ngn",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RateFeed for HttpRateFeed {
    async fn fetch(&self) -> Result<FeedQuote, OracleError> {
        let response = self
            .http
            .get(self.price_url())
            .send()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OracleError::Request(format!(
                "rate source returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let hbar_usd = extract_price(&body, "usd")?;
        let hbar_ngn = extract_price(&body, "ngn")?;

        if hbar_usd <= Decimal::ZERO {
            return Err(OracleError::InvalidResponse(
                "non-positive USD price".to_string(),
            ));
        }

        Ok(FeedQuote {
            hbar_usd,
            usd_ngn: hbar_ngn / hbar_usd,
        })
    }
}

fn extract_price(body: &Value, currency: &str) -> Result<Decimal, OracleError> {
    let raw = body
        .pointer(&format!("/{HBAR_PRICE_ID}/{currency}"))
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            OracleError::InvalidResponse(format!("missing {currency} price in response"))
        })?;
    Decimal::try_from(raw)
        .map_err(|e| OracleError::InvalidResponse(format!("bad {currency} price: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn extract_price_reads_nested_quote() {
        let body = json!({ "hedera-hashgraph": { "usd": 0.2, "ngn": 330.0 } });
        assert_eq!(extract_price(&body, "usd").unwrap(), dec!(0.2));
        assert_eq!(extract_price(&body, "ngn").unwrap(), dec!(330));
    }

    #[test]
    fn extract_price_errors_on_missing_currency() {
        let body = json!({ "hedera-hashgraph": { "usd": 0.2 } });
        assert!(extract_price(&body, "ngn").is_err());
    }

    #[test]
    fn price_url_includes_both_currencies() {
        let feed = HttpRateFeed::new("https://example.com/api/v3/").unwrap();
        assert_eq!(
            feed.price_url(),
            "https://example.com/api/v3/simple/price?ids=hedera-hashgraph&vs_currencies=usd,ngn"
        );
    }
}
