use super::channel::OkxChannel;
use serde::Serialize;
use smol_str::SmolStr;

/// [`Okx`](super::Okx) instrument type used by the private positions channel.
pub const INST_TYPE_SWAP: &str = "SWAP";

/// Single `args` entry of an [`OkxRequest`].
///
/// ### Raw Payload Examples
/// ```json
/// {"channel": "tickers", "instId": "BTC-USDT-SWAP"}
/// {"channel": "positions", "instType": "SWAP"}
/// {"channel": "account"}
/// ```
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxSubArg {
    pub channel: OkxChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<SmolStr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inst_type: Option<&'static str>,
}

impl OkxSubArg {
    pub fn ticker(instrument_id: impl Into<SmolStr>) -> Self {
        Self {
            channel: OkxChannel::TICKERS,
            inst_id: Some(instrument_id.into()),
            inst_type: None,
        }
    }

    pub fn swap_positions() -> Self {
        Self {
            channel: OkxChannel::POSITIONS,
            inst_id: None,
            inst_type: Some(INST_TYPE_SWAP),
        }
    }

    pub fn account() -> Self {
        Self {
            channel: OkxChannel::ACCOUNT,
            inst_id: None,
            inst_type: None,
        }
    }

    /// Ticker subscription args for every instrument, in iteration order.
    pub fn tickers<I, S>(instrument_ids: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        instrument_ids.into_iter().map(Self::ticker).collect()
    }
}

/// [`Okx`](super::Okx) request operation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OkxOp {
    Login,
    Subscribe,
    Unsubscribe,
}

/// Outbound [`Okx`](super::Okx) request envelope.
///
/// See docs: <https://www.okx.com/docs-v5/en/#overview-websocket-subscribe>
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct OkxRequest<Arg> {
    pub op: OkxOp,
    pub args: Vec<Arg>,
}

impl OkxRequest<OkxSubArg> {
    pub fn subscribe(args: Vec<OkxSubArg>) -> Self {
        Self {
            op: OkxOp::Subscribe,
            args,
        }
    }

    pub fn unsubscribe(args: Vec<OkxSubArg>) -> Self {
        Self {
            op: OkxOp::Unsubscribe,
            args,
        }
    }
}
