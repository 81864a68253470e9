use std::time::Duration;

/// Typed outbound channel names used to build subscription arguments.
pub mod channel;

/// Login request & signature for private [`Okx`] WebSocket connections.
pub mod login;

/// Inbound frame decoding into a [`DecodeResult`](message::DecodeResult).
pub mod message;

/// Position & ticker-derived position records.
pub mod position;

/// Account balance records.
pub mod account;

/// Public ticker records.
pub mod ticker;

/// Outbound subscribe & unsubscribe requests.
pub mod subscription;

/// [`Okx`] public WebSocket server url, used for tickers and for the demo trading feed.
///
/// See docs: <https://www.okx.com/docs-v5/en/#overview-production-trading-services>
pub const BASE_URL_OKX_PUBLIC: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// [`Okx`] private WebSocket server url, used for authenticated positions & account data.
///
/// See docs: <https://www.okx.com/docs-v5/en/#overview-production-trading-services>
pub const BASE_URL_OKX_PRIVATE: &str = "wss://ws.okx.com:8443/ws/v5/private";

/// [`Okx`] heartbeat interval. The venue drops connections idle for 30 seconds.
///
/// See docs: <https://www.okx.com/docs-v5/en/#overview-websocket-connect>
pub const PING_INTERVAL_OKX: Duration = Duration::from_secs(25);

/// Heartbeat text frame sent to [`Okx`].
pub const PING: &str = "ping";

/// Heartbeat text frame returned by [`Okx`].
pub const PONG: &str = "pong";

/// [`Okx`] exchange.
///
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Okx;
