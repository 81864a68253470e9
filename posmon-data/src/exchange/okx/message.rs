use super::{
    PONG, account::OkxAccountRecord, position::OkxPositionRecord, ticker::OkxTickerRecord,
};
use crate::{
    de::de_lenient_str,
    error::FeedError,
    model::{Balance, Position, Ticker},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use smol_str::SmolStr;

/// Result of decoding one inbound [`Okx`](super::Okx) text frame.
#[derive(Clone, PartialEq, Debug)]
pub enum DecodeResult {
    /// Literal `"pong"` heartbeat reply.
    Pong,
    /// Login, subscribe, unsubscribe or error acknowledgement.
    Control(OkxEvent),
    /// Push data for a channel.
    Data(OkxDataBatch),
    /// Well formed JSON with neither an `event` nor a `data` array.
    Unrecognised,
}

/// Decode an inbound text frame.
///
/// Pure: performs no I/O. Malformed JSON is the only error, and applies to this single frame.
pub fn decode(frame: &str) -> Result<DecodeResult, FeedError> {
    if frame == PONG {
        return Ok(DecodeResult::Pong);
    }

    let frame = serde_json::from_str::<OkxFrame>(frame)
        .map_err(|error| FeedError::Decode(error.to_string()))?;

    if let Some(event) = frame.event {
        return Ok(DecodeResult::Control(OkxEvent {
            kind: OkxEventKind::from(event.as_str()),
            code: frame.code,
            msg: frame.msg,
            arg: frame.arg,
        }));
    }

    match frame.data {
        Some(Value::Array(items)) => Ok(DecodeResult::Data(OkxDataBatch {
            channel: frame
                .arg
                .as_ref()
                .and_then(|arg| arg.channel.as_deref())
                .map(OkxDataChannel::from)
                .unwrap_or(OkxDataChannel::Unknown),
            arg: frame.arg,
            items,
        })),
        _ => Ok(DecodeResult::Unrecognised),
    }
}

/// Raw inbound frame envelope, covering both event and push data shapes.
///
/// ### Raw Payload Examples
/// ```json
/// {"event": "login", "code": "0", "msg": "", "connId": "a4d3ae55"}
/// {"event": "error", "code": "60012", "msg": "Invalid request"}
/// {"arg": {"channel": "tickers", "instId": "BTC-USDT-SWAP"}, "data": [{"instId": "BTC-USDT-SWAP", "last": "9999.99"}]}
/// ```
#[derive(Debug, Deserialize)]
struct OkxFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    code: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    msg: Option<String>,
    #[serde(default)]
    arg: Option<OkxArg>,
    #[serde(default)]
    data: Option<Value>,
}

/// `arg` field of an event or push data frame.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxArg {
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub channel: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub inst_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub inst_type: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum OkxEventKind {
    Login,
    Subscribe,
    Unsubscribe,
    Error,
    Other(SmolStr),
}

impl From<&str> for OkxEventKind {
    fn from(event: &str) -> Self {
        match event {
            "login" => Self::Login,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "error" => Self::Error,
            other => Self::Other(SmolStr::new(other)),
        }
    }
}

/// Control frame acknowledgement.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct OkxEvent {
    pub kind: OkxEventKind,
    pub code: Option<String>,
    pub msg: Option<String>,
    pub arg: Option<OkxArg>,
}

impl OkxEvent {
    /// Login acknowledgements succeed only with an explicit `"0"` code.
    pub fn is_login_success(&self) -> bool {
        self.kind == OkxEventKind::Login && self.code.as_deref() == Some("0")
    }

    /// Human readable detail of the acknowledgement, empty when the venue sent none.
    pub fn detail(&self) -> &str {
        self.msg.as_deref().unwrap_or_default()
    }
}

/// Channel tag of an [`OkxDataBatch`].
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum OkxDataChannel {
    Positions,
    Account,
    Tickers,
    Other(SmolStr),
    /// Push data without an `arg`, treated as position/ticker data.
    Unknown,
}

impl From<&str> for OkxDataChannel {
    fn from(channel: &str) -> Self {
        match channel {
            "positions" => Self::Positions,
            "account" => Self::Account,
            "tickers" => Self::Tickers,
            other => Self::Other(SmolStr::new(other)),
        }
    }
}

/// Push data for one channel, items kept raw until extracted per record kind.
#[derive(Clone, PartialEq, Debug)]
pub struct OkxDataBatch {
    pub channel: OkxDataChannel,
    pub arg: Option<OkxArg>,
    pub items: Vec<Value>,
}

impl OkxDataBatch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items as position records. Non-object items are skipped.
    pub fn position_records(&self) -> impl Iterator<Item = OkxPositionRecord> + '_ {
        self.items
            .iter()
            .filter_map(|item| OkxPositionRecord::deserialize(item).ok())
    }

    /// Extract [`Position`]s, dropping records without an instrument id.
    pub fn positions(&self, received: DateTime<Utc>) -> Vec<Position> {
        self.position_records()
            .filter_map(|record| record.into_position(received))
            .collect()
    }

    /// Extract [`Balance`]s, one per currency entry.
    pub fn balances(&self, received: DateTime<Utc>) -> Vec<Balance> {
        self.items
            .iter()
            .filter_map(|item| OkxAccountRecord::deserialize(item).ok())
            .flat_map(|record| record.into_balances(received))
            .collect()
    }

    /// Extract [`Ticker`]s, dropping records without an instrument id or last price.
    pub fn tickers(&self, received: DateTime<Utc>) -> Vec<Ticker> {
        self.items
            .iter()
            .filter_map(|item| OkxTickerRecord::deserialize(item).ok())
            .filter_map(|record| record.into_ticker(received))
            .collect()
    }

    /// Split a batch without a channel tag into position snapshots and tickers. Items carrying
    /// position fields are positions, the rest are read as tickers.
    pub fn split_untagged(&self, received: DateTime<Utc>) -> (Vec<Position>, Vec<Ticker>) {
        let mut positions = Vec::new();
        let mut tickers = Vec::new();

        for item in &self.items {
            let Ok(record) = OkxPositionRecord::deserialize(item) else {
                continue;
            };

            if record.has_position_fields() {
                positions.extend(record.into_position(received));
            } else if let Some(ticker) = OkxTickerRecord::deserialize(item)
                .ok()
                .and_then(|record| record.into_ticker(received))
            {
                tickers.push(ticker);
            }
        }

        (positions, tickers)
    }
}
