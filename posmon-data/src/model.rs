use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Directional stance of a [`Position`].
///
/// Ticker-derived records carry no side, so [`PositionSide::Long`] is the default.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Default,
    Display,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    #[default]
    #[display("long")]
    Long,
    #[display("short")]
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, PositionSide::Long)
    }

    pub fn is_short(&self) -> bool {
        matches!(self, PositionSide::Short)
    }
}

/// Unrealised PnL of `size` units opened at `average_price`, valued at `current_price`.
///
/// Long positions profit when the price rises, short positions when it falls.
pub fn unrealized_pnl(
    side: PositionSide,
    average_price: f64,
    current_price: f64,
    size: f64,
) -> f64 {
    match side {
        PositionSide::Long => (current_price - average_price) * size,
        PositionSide::Short => (average_price - current_price) * size,
    }
}

/// PnL as a percentage of the position's entry notional.
///
/// Returns `None` unless both `average_price` and `size` are positive.
pub fn pnl_ratio_percent(pnl: f64, average_price: f64, size: f64) -> Option<f64> {
    (average_price > 0.0 && size > 0.0).then(|| pnl / (average_price * size) * 100.0)
}

/// Unique identity of a [`Position`]: one entry per instrument and side.
///
/// Field order matters: the derived [`Ord`] sorts by instrument first, then side.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Constructor)]
#[display("{instrument_id}-{side}")]
pub struct PositionKey {
    pub instrument_id: SmolStr,
    pub side: PositionSide,
}

/// Normalised open position.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Position {
    pub instrument_id: SmolStr,
    pub side: PositionSide,
    /// Absolute position size, never negative.
    pub size: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    /// Percentage rather than fraction, so `10.0` is a 10% gain.
    pub unrealized_pnl_ratio: f64,
    pub leverage: f64,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.instrument_id.clone(), self.side)
    }

    pub fn is_open(&self) -> bool {
        self.size > 0.0
    }

    /// Apply a new current price, recomputing PnL and ratio from this position's own
    /// average price, size and side.
    ///
    /// PnL fields keep their last-known values unless `size > 0` and `average_price > 0`.
    pub fn reprice(&mut self, current_price: f64, timestamp: DateTime<Utc>) {
        self.current_price = current_price;
        self.timestamp = timestamp;

        if self.size > 0.0 && self.average_price > 0.0 {
            self.unrealized_pnl =
                unrealized_pnl(self.side, self.average_price, current_price, self.size);
            if let Some(ratio) =
                pnl_ratio_percent(self.unrealized_pnl, self.average_price, self.size)
            {
                self.unrealized_pnl_ratio = ratio;
            }
        }
    }
}

/// Price-only update for an instrument, carrying no side or size.
///
/// Consumers merge it into every existing position for the instrument and never treat it
/// as a replacement record.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize, Constructor)]
pub struct PriceTick {
    pub instrument_id: SmolStr,
    pub current_price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Item sent on the position channel.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub enum PositionUpdate {
    /// Full position record, replacing any stored record with the same [`PositionKey`].
    Snapshot(Position),
    /// Ticker-derived price delta.
    Price(PriceTick),
}

impl PositionUpdate {
    pub fn instrument_id(&self) -> &str {
        match self {
            PositionUpdate::Snapshot(position) => &position.instrument_id,
            PositionUpdate::Price(tick) => &tick.instrument_id,
        }
    }
}

/// Account balance for a single currency.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Balance {
    pub currency: SmolStr,
    pub total_equity: f64,
    pub available_balance: f64,
    pub timestamp: DateTime<Utc>,
}

/// Transient best-price snapshot for an instrument. Never stored.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Ticker {
    pub instrument_id: SmolStr,
    pub last_price: f64,
    pub bid_price: f64,
    pub ask_price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    pub fn price_tick(&self) -> PriceTick {
        PriceTick::new(self.instrument_id.clone(), self.last_price, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: PositionSide) -> Position {
        Position {
            instrument_id: SmolStr::new("BTC-USDT-SWAP"),
            side,
            size: 2.0,
            average_price: 100.0,
            current_price: 100.0,
            unrealized_pnl: 0.0,
            unrealized_pnl_ratio: 0.0,
            leverage: 1.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_unrealized_pnl_sign() {
        assert_eq!(unrealized_pnl(PositionSide::Long, 100.0, 110.0, 2.0), 20.0);
        assert_eq!(unrealized_pnl(PositionSide::Short, 100.0, 110.0, 2.0), -20.0);
        assert!(unrealized_pnl(PositionSide::Short, 100.0, 90.0, 2.0) > 0.0);
        assert!(unrealized_pnl(PositionSide::Long, 100.0, 90.0, 2.0) < 0.0);
    }

    #[test]
    fn test_pnl_ratio_percent() {
        assert_eq!(pnl_ratio_percent(20.0, 100.0, 2.0), Some(10.0));
        assert_eq!(pnl_ratio_percent(20.0, 0.0, 2.0), None);
        assert_eq!(pnl_ratio_percent(20.0, 100.0, 0.0), None);
    }

    #[test]
    fn test_reprice_long_and_short() {
        let mut long = position(PositionSide::Long);
        long.reprice(110.0, Utc::now());
        assert_eq!(long.current_price, 110.0);
        assert_eq!(long.unrealized_pnl, 20.0);
        assert_eq!(long.unrealized_pnl_ratio, 10.0);

        let mut short = position(PositionSide::Short);
        short.reprice(110.0, Utc::now());
        assert_eq!(short.unrealized_pnl, -20.0);
        assert_eq!(short.unrealized_pnl_ratio, -10.0);
    }

    #[test]
    fn test_reprice_keeps_last_known_pnl_without_entry_price() {
        let mut position = position(PositionSide::Long);
        position.average_price = 0.0;
        position.unrealized_pnl = 3.5;
        position.unrealized_pnl_ratio = 1.25;

        position.reprice(120.0, Utc::now());

        assert_eq!(position.current_price, 120.0);
        assert_eq!(position.unrealized_pnl, 3.5);
        assert_eq!(position.unrealized_pnl_ratio, 1.25);
    }

    #[test]
    fn test_position_key_orders_by_instrument_then_side() {
        let mut keys = vec![
            PositionKey::new(SmolStr::new("ETH-USDT-SWAP"), PositionSide::Long),
            PositionKey::new(SmolStr::new("BTC-USDT-SWAP"), PositionSide::Short),
            PositionKey::new(SmolStr::new("BTC-USDT-SWAP"), PositionSide::Long),
        ];
        keys.sort();

        assert_eq!(keys[0].to_string(), "BTC-USDT-SWAP-long");
        assert_eq!(keys[1].to_string(), "BTC-USDT-SWAP-short");
        assert_eq!(keys[2].to_string(), "ETH-USDT-SWAP-long");
    }
}
