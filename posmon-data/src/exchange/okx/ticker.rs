use crate::{
    de::{de_lenient_str, parse_epoch_ms, parse_f64},
    model::Ticker,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use smol_str::SmolStr;

/// [`Okx`](super::super::Okx) tickers channel record.
///
/// ### Raw Payload Examples
/// See docs: <https://www.okx.com/docs-v5/en/#public-data-websocket-tickers-channel>
/// ```json
/// {
///     "instType": "SWAP",
///     "instId": "BTC-USDT-SWAP",
///     "last": "9999.99",
///     "bidPx": "9999.98",
///     "askPx": "10000.00",
///     "vol24h": "2222",
///     "ts": "1597026383085"
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxTickerRecord {
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub inst_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub last: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub bid_px: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub ask_px: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub vol24h: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub ts: Option<String>,
}

impl OkxTickerRecord {
    /// Normalise into a [`Ticker`]. Returns `None` without an instrument id or a last price,
    /// since there is nothing to merge into a position.
    pub fn into_ticker(self, received: DateTime<Utc>) -> Option<Ticker> {
        let instrument_id = self
            .inst_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(SmolStr::new)?;

        Some(Ticker {
            instrument_id,
            last_price: parse_f64(self.last.as_deref())?,
            bid_price: parse_f64(self.bid_px.as_deref()).unwrap_or_default(),
            ask_price: parse_f64(self.ask_px.as_deref()).unwrap_or_default(),
            volume: parse_f64(self.vol24h.as_deref()).unwrap_or_default(),
            timestamp: parse_epoch_ms(self.ts.as_deref()).unwrap_or(received),
        })
    }
}
