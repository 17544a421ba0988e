//! Yahoo Finance provider over the v8 chart API.
//!
//! Blocking `reqwest`, exponential-backoff retries, and a shared circuit
//! breaker: 403 trips it immediately, 429 and 5xx count toward the threshold.
//! The endpoint is unofficial and changes shape without notice, so every
//! parse failure is a typed [`DataError::ResponseFormatChanged`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{non_empty, DataError, MarketDataProvider};
use crate::domain::{Bar, Quote, Resolution};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
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
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(symbol: &str, resolution: Resolution, window_days: u32, now: DateTime<Utc>) -> String {
        let end_ts = now.timestamp();
        let start_ts = end_ts - i64::from(window_days) * 86_400;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval={}",
            resolution.yahoo_interval()
        )
    }

    fn first_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;
        result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
    }

    fn parse_bars(symbol: &str, data: ChartData) -> Result<Vec<Bar>, DataError> {
        let timestamps = data.timestamp.unwrap_or_default();
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            // Rows with no close are holidays or halted sessions.
            let Some(close) = field(&quote.close) else {
                continue;
            };
            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: field(&quote.open).unwrap_or(close),
                high: field(&quote.high).unwrap_or(close),
                low: field(&quote.low).unwrap_or(close),
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }
        Ok(bars)
    }

    fn fetch_chart(&self, symbol: &str, url: &str) -> Result<ChartData, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying chart request");
                std::thread::sleep(delay);
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status == reqwest::StatusCode::FORBIDDEN {
                        warn!(symbol, "provider returned 403, tripping circuit breaker");
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }
                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }
                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::NetworkUnreachable(format!(
                            "HTTP {status} for {symbol}"
                        )));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;
                    self.circuit_breaker.record_success();
                    return Self::first_result(symbol, chart);
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::NetworkUnreachable("max retries exceeded".into())))
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        window_days: u32,
    ) -> Result<Vec<Bar>, DataError> {
        let url = Self::chart_url(symbol, resolution, window_days, Utc::now());
        let data = self.fetch_chart(symbol, &url)?;
        non_empty(symbol, resolution, Self::parse_bars(symbol, data)?)
    }

    fn get_last_price(&self, symbol: &str) -> Result<Quote, DataError> {
        let url = Self::chart_url(symbol, Resolution::Daily, 5, Utc::now());
        let data = self.fetch_chart(symbol, &url)?;
        let meta = data
            .meta
            .as_ref()
            .ok_or_else(|| DataError::ResponseFormatChanged("chart meta missing".into()))?;
        let price = meta.regular_market_price.ok_or_else(|| DataError::Empty {
            symbol: symbol.to_string(),
            resolution: Resolution::Daily,
        })?;
        let previous_close = meta
            .previous_close
            .or(meta.chart_previous_close)
            .unwrap_or(price);
        Ok(Quote {
            price,
            previous_close,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"regularMarketPrice": 101.5, "chartPreviousClose": 99.0},
                "timestamp": [1717421400, 1717507800, 1717594200],
                "indicators": {"quote": [{
                    "open":   [100.0, null, 101.0],
                    "high":   [102.0, null, 103.0],
                    "low":    [ 99.0, null, 100.5],
                    "close":  [101.0, null, 102.5],
                    "volume": [1000,  null, 1500]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_bars_and_skips_empty_rows() {
        let resp: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let data = YahooProvider::first_result("NVDA", resp).unwrap();
        let bars = YahooProvider::parse_bars("NVDA", data).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 102.5);
        assert_eq!(bars[1].volume, 1500);
    }

    #[test]
    fn not_found_maps_to_symbol_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data"}}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            YahooProvider::first_result("ZZZZ", resp),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn url_carries_interval_and_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let url = YahooProvider::chart_url("^VIX", Resolution::Hourly, 10, now);
        assert!(url.contains("interval=1h"));
        assert!(url.contains(&format!("period1={}", now.timestamp() - 864_000)));
    }
}
