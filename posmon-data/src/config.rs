use crate::{
    error::ClientError,
    exchange::okx::{BASE_URL_OKX_PRIVATE, BASE_URL_OKX_PUBLIC, PING_INTERVAL_OKX},
};
use smol_str::SmolStr;
use std::time::Duration;
use url::Url;

/// Overrides the public endpoint used by the demo trading feed.
pub const ENV_WS_PUBLIC: &str = "POSMON_WS_PUBLIC";

/// Overrides the private endpoint used by the authenticated trading feed.
pub const ENV_WS_PRIVATE: &str = "POSMON_WS_PRIVATE";

/// Overrides the public endpoint used by the market-data feed.
pub const ENV_WS_MARKET: &str = "POSMON_WS_MARKET";

/// Overrides the heartbeat interval, in whole seconds.
pub const ENV_PING_SECS: &str = "POSMON_PING_SECS";

/// Single feed connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Short name used in fault entries & logs, such as "trading".
    pub name: SmolStr,
    /// WebSocket server URL, validated on connect.
    pub url: String,
    /// Interval between `"ping"` heartbeat frames. The first ping is sent one interval after
    /// connecting.
    pub ping_interval: Duration,
}

impl FeedConfig {
    pub fn new(name: impl Into<SmolStr>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ping_interval: PING_INTERVAL_OKX,
        }
    }

    /// Set the heartbeat interval, which must be non-zero.
    pub fn with_ping_interval(mut self, interval: Duration) -> Result<Self, ClientError> {
        self.ping_interval = validate_ping_interval(interval)?;
        Ok(self)
    }
}

/// [`MarketClient`](crate::client::MarketClient) configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub public_url: String,
    pub private_url: String,
    pub market_url: String,
    pub ping_interval: Duration,
    pub position_capacity: usize,
    pub balance_capacity: usize,
    pub fault_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            public_url: BASE_URL_OKX_PUBLIC.to_string(),
            private_url: BASE_URL_OKX_PRIVATE.to_string(),
            market_url: BASE_URL_OKX_PUBLIC.to_string(),
            ping_interval: PING_INTERVAL_OKX,
            position_capacity: 100,
            balance_capacity: 100,
            fault_capacity: 10,
        }
    }
}

impl ClientConfig {
    /// Default configuration with any `POSMON_*` environment overrides applied.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`. Blank values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = lookup(ENV_WS_PUBLIC) {
            self.public_url = validate_url(ENV_WS_PUBLIC, url)?;
        }
        if let Some(url) = lookup(ENV_WS_PRIVATE) {
            self.private_url = validate_url(ENV_WS_PRIVATE, url)?;
        }
        if let Some(url) = lookup(ENV_WS_MARKET) {
            self.market_url = validate_url(ENV_WS_MARKET, url)?;
        }
        if let Some(secs) = lookup(ENV_PING_SECS) {
            let secs = secs
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    ClientError::Config(format!("{ENV_PING_SECS} must be a positive integer"))
                })?;
            self.ping_interval = Duration::from_secs(secs);
        }

        Ok(self)
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    pub fn with_private_url(mut self, url: impl Into<String>) -> Self {
        self.private_url = url.into();
        self
    }

    pub fn with_market_url(mut self, url: impl Into<String>) -> Self {
        self.market_url = url.into();
        self
    }

    /// Set the heartbeat interval, which must be non-zero.
    pub fn with_ping_interval(mut self, interval: Duration) -> Result<Self, ClientError> {
        self.ping_interval = validate_ping_interval(interval)?;
        Ok(self)
    }

    pub fn with_channel_capacity(mut self, positions: usize, balances: usize, faults: usize) -> Self {
        self.position_capacity = positions;
        self.balance_capacity = balances;
        self.fault_capacity = faults;
        self
    }

    /// Trading feed configuration: the private endpoint when authenticated, else public.
    pub fn trading_feed(&self, authenticated: bool) -> FeedConfig {
        let url = if authenticated {
            &self.private_url
        } else {
            &self.public_url
        };
        FeedConfig {
            name: SmolStr::new_static("trading"),
            url: url.clone(),
            ping_interval: self.ping_interval,
        }
    }

    pub fn market_feed(&self) -> FeedConfig {
        FeedConfig {
            name: SmolStr::new_static("market data"),
            url: self.market_url.clone(),
            ping_interval: self.ping_interval,
        }
    }
}

fn validate_ping_interval(interval: Duration) -> Result<Duration, ClientError> {
    if interval.is_zero() {
        return Err(ClientError::Config(
            "ping interval must be non-zero".to_string(),
        ));
    }
    Ok(interval)
}

fn validate_url(key: &str, url: String) -> Result<String, ClientError> {
    match Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => Ok(url),
        Ok(parsed) => Err(ClientError::Config(format!(
            "{key} must be a ws:// or wss:// url, got scheme {}",
            parsed.scheme()
        ))),
        Err(error) => Err(ClientError::Config(format!("{key}: {error}"))),
    }
}
