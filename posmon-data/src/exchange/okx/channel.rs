use serde::Serialize;

/// [`Okx`](super::Okx) channel to be subscribed to.
///
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api-subscribe>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct OkxChannel(pub &'static str);

impl OkxChannel {
    /// [`Okx`](super::Okx) private positions channel.
    ///
    /// See docs: <https://www.okx.com/docs-v5/en/#trading-account-websocket-positions-channel>
    pub const POSITIONS: Self = Self("positions");

    /// [`Okx`](super::Okx) private account channel.
    ///
    /// See docs: <https://www.okx.com/docs-v5/en/#trading-account-websocket-account-channel>
    pub const ACCOUNT: Self = Self("account");

    /// [`Okx`](super::Okx) public tickers channel.
    ///
    /// See docs: <https://www.okx.com/docs-v5/en/#public-data-websocket-tickers-channel>
    pub const TICKERS: Self = Self("tickers");
}

impl AsRef<str> for OkxChannel {
    fn as_ref(&self) -> &str {
        self.0
    }
}
