//! Upbit quote provider.
//!
//! Uses the public REST quotation API:
//! - `GET /v1/candles/{minutes/N|days|weeks|months}` for OHLCV history
//!   (newest first, at most 200 candles per request, paged with `to=`)
//! - `GET /v1/ticker?markets=...` for current prices
//! - `GET /v1/market/all` for the instrument list
//!
//! Every call is attempted once. Rate limiting is reported as
//! [`FetchError::RateLimited`] and left to the caller.

use super::provider::{FetchError, QuoteClient};
use crate::domain::{Bar, Interval, Ticker};
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const UPBIT_BASE_URL: &str = "https://api.upbit.com";

/// Upbit refuses `count` above this per candle request.
pub const MAX_CANDLES_PER_REQUEST: usize = 200;

const UPBIT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const CURSOR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One element of a candle response. Every field is optional so that a
/// missing field is reported as a format change instead of a serde panic path.
#[derive(Debug, Deserialize)]
struct CandleRow {
    candle_date_time_utc: Option<String>,
    candle_date_time_kst: Option<String>,
    opening_price: Option<f64>,
    high_price: Option<f64>,
    low_price: Option<f64>,
    trade_price: Option<f64>,
    candle_acc_trade_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TickerRow {
    market: String,
    trade_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    market: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// A parsed candle plus its UTC open time, used as the paging cursor.
struct ParsedCandle {
    utc: NaiveDateTime,
    bar: Bar,
}

/// Upbit data provider.
pub struct UpbitClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl UpbitClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(UPBIT_BASE_URL)
    }

    /// Point the client at another host (a proxy or a local stub).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Candle endpoint path for an interval.
    fn candle_path(interval: Interval) -> String {
        match interval {
            Interval::Day => "/v1/candles/days".to_string(),
            Interval::Week => "/v1/candles/weeks".to_string(),
            Interval::Month => "/v1/candles/months".to_string(),
            intraday => format!(
                "/v1/candles/minutes/{}",
                intraday.minutes().unwrap_or(1)
            ),
        }
    }

    /// GET `path` and decode the JSON body, mapping transport and status
    /// failures onto [`FetchError`]. `symbol` is used for not-found errors.
    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        symbol: &str,
    ) -> Result<T, FetchError> {
        let url = format!("{}{path}", self.base_url);
        tracing::trace!(%url, ?query, "upbit request");

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    FetchError::NetworkUnreachable(e.to_string())
                } else {
                    FetchError::Other(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let remaining = resp
                .headers()
                .get("remaining-req")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp.text().unwrap_or_default();
            return Err(status_error(status, symbol, remaining.as_deref(), &body));
        }

        let body = resp
            .text()
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })
    }

    /// Fetch one page of candles (newest first) ending before `cursor`.
    fn candle_page(
        &self,
        ticker: &str,
        interval: Interval,
        count: usize,
        cursor: Option<NaiveDateTime>,
    ) -> Result<Vec<ParsedCandle>, FetchError> {
        let mut query = vec![("market", ticker.to_string()), ("count", count.to_string())];
        if let Some(to) = cursor {
            query.push(("to", to.format(CURSOR_FORMAT).to_string()));
        }
        let rows: Vec<CandleRow> = self.get_json(&Self::candle_path(interval), &query, ticker)?;
        parse_candles(ticker, rows)
    }
}

/// Map a non-success HTTP status onto [`FetchError`].
///
/// 429 is rate limiting, 404 (or 400 for a request naming a symbol) is an
/// unknown market, anything else is passed through with the error message.
fn status_error(
    status: reqwest::StatusCode,
    symbol: &str,
    remaining_req: Option<&str>,
    body: &str,
) -> FetchError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return FetchError::RateLimited(format!(
            "HTTP 429 for {symbol} (remaining-req: {})",
            remaining_req.unwrap_or("unknown")
        ));
    }
    if status == reqwest::StatusCode::NOT_FOUND
        || (status == reqwest::StatusCode::BAD_REQUEST && !symbol.is_empty())
    {
        return FetchError::SymbolNotFound {
            symbol: symbol.to_string(),
        };
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_string());
    FetchError::Other(format!("HTTP {status} for {symbol}: {message}"))
}

/// Validate candle rows and turn them into bars (order preserved).
fn parse_candles(symbol: &str, rows: Vec<CandleRow>) -> Result<Vec<ParsedCandle>, FetchError> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let missing = |field: &str| {
                FetchError::ResponseFormatChanged(format!(
                    "{symbol}: candle {i} is missing '{field}'"
                ))
            };
            let utc = parse_timestamp(
                symbol,
                &row.candle_date_time_utc
                    .ok_or_else(|| missing("candle_date_time_utc"))?,
            )?;
            let kst = parse_timestamp(
                symbol,
                &row.candle_date_time_kst
                    .ok_or_else(|| missing("candle_date_time_kst"))?,
            )?;
            Ok(ParsedCandle {
                utc,
                bar: Bar {
                    timestamp: kst,
                    open: row.opening_price.ok_or_else(|| missing("opening_price"))?,
                    high: row.high_price.ok_or_else(|| missing("high_price"))?,
                    low: row.low_price.ok_or_else(|| missing("low_price"))?,
                    close: row.trade_price.ok_or_else(|| missing("trade_price"))?,
                    volume: row
                        .candle_acc_trade_volume
                        .ok_or_else(|| missing("candle_acc_trade_volume"))?,
                },
            })
        })
        .collect()
}

fn parse_timestamp(symbol: &str, raw: &str) -> Result<NaiveDateTime, FetchError> {
    NaiveDateTime::parse_from_str(raw, UPBIT_TIMESTAMP_FORMAT).map_err(|e| {
        FetchError::ResponseFormatChanged(format!("{symbol}: invalid timestamp '{raw}': {e}"))
    })
}

/// Pick `tickers` out of a ticker response, failing on any that is absent.
fn collect_prices(
    tickers: &[&str],
    rows: Vec<TickerRow>,
) -> Result<BTreeMap<Ticker, f64>, FetchError> {
    let mut by_market: BTreeMap<Ticker, f64> = BTreeMap::new();
    for row in rows {
        let price = row.trade_price.ok_or_else(|| {
            FetchError::ResponseFormatChanged(format!("{}: missing 'trade_price'", row.market))
        })?;
        by_market.insert(row.market, price);
    }
    for ticker in tickers {
        if !by_market.contains_key(*ticker) {
            return Err(FetchError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
    }
    Ok(by_market)
}

/// Markets whose id starts with `{fiat}-`, in response order.
fn filter_markets(fiat: &str, rows: Vec<MarketRow>) -> Vec<Ticker> {
    let prefix = format!("{}-", fiat.to_ascii_uppercase());
    rows.into_iter()
        .map(|r| r.market)
        .filter(|m| m.starts_with(&prefix))
        .collect()
}

impl QuoteClient for UpbitClient {
    fn name(&self) -> &str {
        "upbit"
    }

    fn current_price(&self, ticker: &str) -> Result<f64, FetchError> {
        self.current_prices(&[ticker])?
            .remove(ticker)
            .ok_or_else(|| FetchError::SymbolNotFound {
                symbol: ticker.to_string(),
            })
    }

    fn current_prices(&self, tickers: &[&str]) -> Result<BTreeMap<Ticker, f64>, FetchError> {
        if tickers.is_empty() {
            return Ok(BTreeMap::new());
        }
        let markets = tickers.join(",");
        let rows: Vec<TickerRow> =
            self.get_json("/v1/ticker", &[("markets", markets.clone())], &markets)?;
        collect_prices(tickers, rows)
    }

    fn bars(&self, ticker: &str, interval: Interval, count: usize) -> Result<Vec<Bar>, FetchError> {
        let mut newest_first: Vec<ParsedCandle> = Vec::with_capacity(count);
        let mut cursor: Option<NaiveDateTime> = None;

        while newest_first.len() < count {
            let want = (count - newest_first.len()).min(MAX_CANDLES_PER_REQUEST);
            let page = self.candle_page(ticker, interval, want, cursor)?;
            let short = page.len() < want;
            cursor = page.last().map(|c| c.utc);
            newest_first.extend(page);
            if short || cursor.is_none() {
                break;
            }
        }

        if newest_first.is_empty() {
            return Err(FetchError::EmptyResponse {
                symbol: ticker.to_string(),
            });
        }

        tracing::debug!(
            instrument = %ticker,
            %interval,
            requested = count,
            received = newest_first.len(),
            "fetched candles"
        );

        Ok(newest_first.into_iter().rev().map(|c| c.bar).collect())
    }

    fn instruments(&self, fiat: &str) -> Result<Vec<Ticker>, FetchError> {
        let rows: Vec<MarketRow> =
            self.get_json("/v1/market/all", &[("isDetails", "false".to_string())], "")?;
        Ok(filter_markets(fiat, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANDLES_JSON: &str = r#"[
        {"market":"KRW-BTC","candle_date_time_utc":"2024-01-03T00:00:00","candle_date_time_kst":"2024-01-03T09:00:00",
         "opening_price":101.0,"high_price":104.0,"low_price":100.0,"trade_price":103.0,
         "timestamp":1704326400000,"candle_acc_trade_price":1.0,"candle_acc_trade_volume":12.5},
        {"market":"KRW-BTC","candle_date_time_utc":"2024-01-02T00:00:00","candle_date_time_kst":"2024-01-02T09:00:00",
         "opening_price":100.0,"high_price":102.0,"low_price":99.0,"trade_price":101.0,
         "timestamp":1704240000000,"candle_acc_trade_price":1.0,"candle_acc_trade_volume":10.0}
    ]"#;

    #[test]
    fn parses_candle_rows_with_kst_timestamp() {
        let rows: Vec<CandleRow> = serde_json::from_str(CANDLES_JSON).unwrap();
        let parsed = parse_candles("KRW-BTC", rows).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].bar.date_str(), "2024-01-03 09:00:00");
        assert_eq!(parsed[0].utc.format(CURSOR_FORMAT).to_string(), "2024-01-03 00:00:00");
        assert_eq!(parsed[0].bar.close, 103.0);
        assert_eq!(parsed[1].bar.volume, 10.0);
    }

    #[test]
    fn missing_field_is_format_change() {
        let json = r#"[{"candle_date_time_utc":"2024-01-03T00:00:00","candle_date_time_kst":"2024-01-03T09:00:00",
            "opening_price":1.0,"high_price":1.0,"low_price":1.0,"candle_acc_trade_volume":1.0}]"#;
        let rows: Vec<CandleRow> = serde_json::from_str(json).unwrap();
        match parse_candles("KRW-BTC", rows) {
            Err(FetchError::ResponseFormatChanged(msg)) => assert!(msg.contains("trade_price")),
            other => panic!("expected ResponseFormatChanged, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn null_price_is_format_change() {
        let json = r#"[{"candle_date_time_utc":"2024-01-03T00:00:00","candle_date_time_kst":"2024-01-03T09:00:00",
            "opening_price":null,"high_price":1.0,"low_price":1.0,"trade_price":1.0,"candle_acc_trade_volume":1.0}]"#;
        let rows: Vec<CandleRow> = serde_json::from_str(json).unwrap();
        assert!(matches!(
            parse_candles("KRW-BTC", rows),
            Err(FetchError::ResponseFormatChanged(_))
        ));
    }

    #[test]
    fn ticker_prices_require_every_market() {
        let rows: Vec<TickerRow> = serde_json::from_str(
            r#"[{"market":"KRW-BTC","trade_price":95000000.0},{"market":"KRW-ETH","trade_price":4200000.0}]"#,
        )
        .unwrap();
        let prices = collect_prices(&["KRW-BTC", "KRW-ETH"], rows).unwrap();
        assert_eq!(prices["KRW-BTC"], 95_000_000.0);

        let rows: Vec<TickerRow> =
            serde_json::from_str(r#"[{"market":"KRW-BTC","trade_price":1.0}]"#).unwrap();
        assert!(matches!(
            collect_prices(&["KRW-BTC", "KRW-XYZ"], rows),
            Err(FetchError::SymbolNotFound { symbol }) if symbol == "KRW-XYZ"
        ));
    }

    #[test]
    fn market_list_filters_by_fiat() {
        let rows: Vec<MarketRow> = serde_json::from_str(
            r#"[{"market":"KRW-BTC"},{"market":"BTC-ETH"},{"market":"KRW-BAT"},{"market":"USDT-BTC"}]"#,
        )
        .unwrap();
        assert_eq!(filter_markets("krw", rows), vec!["KRW-BTC", "KRW-BAT"]);
    }

    #[test]
    fn http_status_mapping() {
        use reqwest::StatusCode;

        let remaining = Some("group=candles; min=0");
        match status_error(StatusCode::TOO_MANY_REQUESTS, "KRW-BTC", remaining, "") {
            FetchError::RateLimited(msg) => assert!(msg.contains("min=0")),
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "KRW-BTC", None, ""),
            FetchError::RateLimited(msg) if msg.contains("unknown")
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "KRW-NOPE", None, ""),
            FetchError::SymbolNotFound { symbol } if symbol == "KRW-NOPE"
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "KRW-NOPE", None, ""),
            FetchError::SymbolNotFound { .. }
        ));

        let body = r#"{"error":{"name":"invalid_query","message":"bad isDetails"}}"#;
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "", None, body),
            FetchError::Other(msg) if msg.contains("bad isDetails")
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "KRW-BTC", None, "upstream down"),
            FetchError::Other(msg) if msg.contains("500") && msg.contains("upstream down")
        ));
    }

    #[test]
    fn candle_paths() {
        assert_eq!(UpbitClient::candle_path(Interval::Day), "/v1/candles/days");
        assert_eq!(UpbitClient::candle_path(Interval::Month), "/v1/candles/months");
        assert_eq!(
            UpbitClient::candle_path(Interval::Minute240),
            "/v1/candles/minutes/240"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = UpbitClient::with_base_url("http://localhost:9999/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(client.name(), "upbit");
    }
}
