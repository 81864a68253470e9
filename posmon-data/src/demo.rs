//! Synthetic positions used when no valid credentials are configured.
//!
//! Demo positions start flat (current price equals average price) and are repriced by the
//! public tickers of the same instruments.

use crate::model::{Balance, Position, PositionKey, PositionSide, Ticker};
use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use std::{collections::BTreeMap, sync::Arc};

/// One demo catalog entry.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct DemoEntry {
    pub instrument_id: &'static str,
    pub side: PositionSide,
    pub size: f64,
    pub average_price: f64,
    pub leverage: f64,
}

const fn entry(
    instrument_id: &'static str,
    side: PositionSide,
    size: f64,
    average_price: f64,
    leverage: f64,
) -> DemoEntry {
    DemoEntry {
        instrument_id,
        side,
        size,
        average_price,
        leverage,
    }
}

/// Fixed demo catalog.
pub const DEMO_CATALOG: [DemoEntry; 12] = [
    entry("BTC-USDT-SWAP", PositionSide::Long, 0.5, 65000.0, 10.0),
    entry("ETH-USDT-SWAP", PositionSide::Short, 4.0, 3400.0, 5.0),
    entry("SOL-USDT-SWAP", PositionSide::Long, 50.0, 150.0, 5.0),
    entry("XRP-USDT-SWAP", PositionSide::Long, 5000.0, 0.55, 3.0),
    entry("DOGE-USDT-SWAP", PositionSide::Short, 20000.0, 0.12, 3.0),
    entry("ADA-USDT-SWAP", PositionSide::Long, 8000.0, 0.45, 4.0),
    entry("AVAX-USDT-SWAP", PositionSide::Short, 100.0, 35.0, 5.0),
    entry("LINK-USDT-SWAP", PositionSide::Long, 300.0, 14.0, 5.0),
    entry("DOT-USDT-SWAP", PositionSide::Long, 600.0, 6.5, 3.0),
    entry("LTC-USDT-SWAP", PositionSide::Short, 40.0, 80.0, 4.0),
    entry("BNB-USDT-SWAP", PositionSide::Long, 10.0, 580.0, 5.0),
    entry("TON-USDT-SWAP", PositionSide::Short, 1000.0, 5.5, 3.0),
];

/// Currency of the synthetic demo balance.
pub const DEMO_CURRENCY: &str = "USDT";
pub const DEMO_TOTAL_EQUITY: f64 = 10_000.0;
pub const DEMO_AVAILABLE_BALANCE: f64 = 7_500.0;

/// Instruments of the [`DEMO_CATALOG`], used for the demo ticker subscription and as the
/// market-data fallback when no positions are open.
pub fn demo_instruments() -> Vec<SmolStr> {
    DEMO_CATALOG
        .iter()
        .map(|entry| SmolStr::new_static(entry.instrument_id))
        .collect()
}

impl DemoEntry {
    pub fn position(&self, timestamp: DateTime<Utc>) -> Position {
        Position {
            instrument_id: SmolStr::new_static(self.instrument_id),
            side: self.side,
            size: self.size,
            average_price: self.average_price,
            current_price: self.average_price,
            unrealized_pnl: 0.0,
            unrealized_pnl_ratio: 0.0,
            leverage: self.leverage,
            timestamp,
        }
    }
}

pub fn demo_balance(timestamp: DateTime<Utc>) -> Balance {
    Balance {
        currency: SmolStr::new_static(DEMO_CURRENCY),
        total_equity: DEMO_TOTAL_EQUITY,
        available_balance: DEMO_AVAILABLE_BALANCE,
        timestamp,
    }
}

/// Demo positions shared by both read loops.
///
/// The lock is only taken for synchronous map access, never across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct DemoBook {
    positions: Arc<parking_lot::Mutex<BTreeMap<PositionKey, Position>>>,
}

impl DemoBook {
    /// Populate the book from the [`DEMO_CATALOG`], returning the seeded positions in catalog
    /// order.
    pub fn seed(&self, timestamp: DateTime<Utc>) -> Vec<Position> {
        let seeded = DEMO_CATALOG
            .iter()
            .map(|entry| entry.position(timestamp))
            .collect::<Vec<_>>();

        let mut positions = self.positions.lock();
        positions.extend(
            seeded
                .iter()
                .map(|position| (position.key(), position.clone())),
        );

        seeded
    }

    /// Reprice every demo position of the ticker's instrument, using each position's own side.
    ///
    /// Returns the merged positions, or `None` when the book holds none for the instrument.
    pub fn merge_ticker(&self, ticker: &Ticker) -> Option<Vec<Position>> {
        let mut positions = self.positions.lock();

        let merged = positions
            .values_mut()
            .filter(|position| position.instrument_id == ticker.instrument_id)
            .map(|position| {
                position.reprice(ticker.last_price, ticker.timestamp);
                position.clone()
            })
            .collect::<Vec<_>>();

        (!merged.is_empty()).then_some(merged)
    }

    pub fn len(&self) -> usize {
        self.positions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.lock().is_empty()
    }
}
