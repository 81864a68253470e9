use thiserror::Error;

/// All errors generated by a single [`FeedConnection`](crate::feed::FeedConnection).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FeedError {
    #[error("invalid WebSocket url {url}: {error}")]
    Url { url: String, error: String },

    #[error("failed to connect to {url}: {error}")]
    Connect { url: String, error: String },

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("failed to serialise request: {0}")]
    Serialise(String),

    #[error("failed to decode frame: {0}")]
    Decode(String),

    #[error("heartbeat interval must be non-zero")]
    PingInterval,

    #[error("connection closed")]
    Closed,
}

impl FeedError {
    /// Determine if an error ends the owning connection's read loop.
    ///
    /// Frame-level errors skip a single frame, everything at the transport level is
    /// terminal since no reconnect is attempted.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::Decode(_) | FeedError::Serialise(_) => false,
            _ => true,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match value {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::Closed,
            other => Self::Socket(other.to_string()),
        }
    }
}

/// Reasons a set of [`Credentials`](crate::credentials::Credentials) is rejected, which
/// downgrades the client to demo mode.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum CredentialError {
    #[error("missing API credentials")]
    Missing,

    #[error("API credentials contain placeholder values")]
    Placeholder,

    #[error("API key is not UUID formatted")]
    ApiKeyFormat,

    #[error("API secret is shorter than 32 characters")]
    SecretTooShort,

    #[error("API passphrase is empty")]
    PassphraseEmpty,
}

/// All errors generated by the [`MarketClient`](crate::client::MarketClient).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ClientError {
    #[error("trading feed failed: {0}")]
    TradingFeed(#[from] FeedError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("MarketClient already connected")]
    AlreadyConnected,

    #[error("MarketClient not connected, call connect() first")]
    NotConnected,
}
