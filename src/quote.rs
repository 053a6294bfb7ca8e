//! # quote
//!
//! Current share prices for ASX codes.
//!
//! The network lookup sits behind [`QuoteSource`] so the rest of the program can
//! be driven by a stub. [`PriceFetcher`] puts a per run cache in front of it: a
//! code is looked up at most once per run no matter how many books mention it.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::debug;

use crate::fraction::{Fraction, MAX_DENOMINATOR};

/// Suffix Yahoo uses for the Australian exchange.
const EXCHANGE_SUFFIX: &str = ".AX";

/// Something that can tell us what a share costs right now.
pub trait QuoteSource {
    /// Current price of `code` (an exchange code such as `BHP`, without suffix).
    fn quote(&self, code: &str) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
}

/// Quotes from Yahoo Finance's v8 chart endpoint.
pub struct YahooQuotes {
    client: reqwest::blocking::Client,
}

impl YahooQuotes {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36")
            .build()
            .context("could not build HTTP client")?;

        Ok(Self { client })
    }

    fn chart_url(symbol: &str) -> String {
        format!("https://query1.finance.yahoo.com/v8/finance/chart/{symbol}?range=1d&interval=1d")
    }
}

impl QuoteSource for YahooQuotes {
    fn quote(&self, code: &str) -> Result<f64> {
        let symbol = format!("{}{}", code.to_ascii_uppercase(), EXCHANGE_SUFFIX);
        let url = Self::chart_url(&symbol);
        debug!(%url, "requesting quote");

        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .with_context(|| format!("request for {symbol} failed"))?;

        let resp: ChartResponse = serde_json::from_str(&body)
            .with_context(|| format!("unexpected response for {symbol}"))?;

        price_from_chart(resp).with_context(|| format!("no price for {symbol}"))
    }
}

/// Pulls the last traded price out of a chart response.
/// Falls back to the middle of the day's range, with a missing end counted as zero.
fn price_from_chart(resp: ChartResponse) -> Result<f64> {
    let Some(data) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        if let Some(err) = resp.chart.error {
            bail!("{}: {}", err.code, err.description);
        }
        bail!("empty result");
    };

    let meta = data.meta;
    if let Some(price) = meta.regular_market_price {
        return Ok(price);
    }

    let high = meta.regular_market_day_high.unwrap_or(0.0);
    let low = meta.regular_market_day_low.unwrap_or(0.0);
    Ok((high + low) / 2.0)
}

/// A fetched price, both as quoted and as written into a book.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPrice {
    pub value: f64,
    pub formatted: String,
}

/// Caching front end to a [`QuoteSource`]. Lives for one run.
pub struct PriceFetcher<Q> {
    source: Q,
    cache: HashMap<String, CachedPrice>,
}

impl<Q: QuoteSource> PriceFetcher<Q> {
    pub fn new(source: Q) -> Self {
        Self { source, cache: HashMap::new() }
    }

    /// Price for `code`. Codes are cached upper cased, so `bhp` and `BHP` share an entry.
    /// Failures are not cached.
    pub fn fetch(&mut self, code: &str) -> Result<&CachedPrice> {
        let key = code.to_ascii_uppercase();

        if !self.cache.contains_key(&key) {
            let value = self.source.quote(&key)?;
            let formatted = Fraction::approximate(value, MAX_DENOMINATOR)
                .ok_or_else(|| anyhow!("price {value} cannot be stored"))?
                .to_string();
            self.cache.insert(key.clone(), CachedPrice { value, formatted });
        }

        Ok(&self.cache[&key])
    }

    #[cfg(test)]
    pub fn source(&self) -> &Q {
        &self.source
    }
}
