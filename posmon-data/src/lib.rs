#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::unused_self, clippy::useless_let_if_seq)]

//! # Posmon-Data
//! Live OKX position, balance & ticker feeds, normalised for a terminal position monitor.
//!
//! A [`MarketClient`](client::MarketClient) owns two WebSocket connections:
//! * **Trading**: private positions & account channels when credentials are valid, otherwise
//!   public tickers driving a synthetic demo book.
//! * **Market Data**: public tickers for every instrument with an open position, used to
//!   reprice positions between position snapshots.
//!
//! Decoded records are sent on three bounded channels (positions, balances, faults) that the
//! presentation layer drains without blocking.
//!
//! ## Example
//! ```rust,no_run
//! use posmon_data::{
//!     client::MarketClient, config::ClientConfig, credentials::Credentials,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (mut client, mut receivers) =
//!         MarketClient::new(ClientConfig::from_env()?, Credentials::from_env());
//!
//!     tokio::spawn(async move {
//!         client.connect().await?;
//!         client.start_listening().await
//!     });
//!
//!     // Every channel is bounded, so drain all three
//!     loop {
//!         tokio::select! {
//!             Some(update) = receivers.positions.recv() => println!("{update:?}"),
//!             Some(balance) = receivers.balances.recv() => println!("{balance:?}"),
//!             Some(fault) = receivers.faults.recv() => eprintln!("{fault}"),
//!             else => break,
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Dual feed [`MarketClient`](client::MarketClient), record routing & working set tracking.
pub mod client;

/// Endpoint, heartbeat & channel capacity configuration.
pub mod config;

/// OKX API credentials & their format validation.
pub mod credentials;

/// Lenient field deserialisation shared by the venue record types.
pub mod de;

/// Synthetic demo catalog & the [`DemoBook`](demo::DemoBook) repriced by public tickers.
pub mod demo;

/// All [`Error`](std::error::Error)s generated in Posmon-Data.
pub mod error;

/// Venue specific wire formats.
pub mod exchange;

/// Fault & lifecycle log channel.
pub mod fault;

/// Single WebSocket [`FeedConnection`](feed::FeedConnection) with heartbeat.
pub mod feed;

/// Normalised domain records: positions, balances & tickers.
pub mod model;

pub use client::{ClientMode, ClientReceivers, MarketClient};
pub use config::ClientConfig;
pub use credentials::Credentials;
pub use error::{ClientError, FeedError};
pub use model::{Balance, Position, PositionKey, PositionSide, PositionUpdate, PriceTick, Ticker};
