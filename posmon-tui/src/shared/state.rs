//! Position & balance reducer owned by the presentation loop.
//!
//! Single-threaded: the loop drains the client's channels and applies each item here, so no
//! locking is needed.

use chrono::{DateTime, Local, Utc};
use posmon_data::{
    fault::FaultEntry,
    model::{Balance, Position, PositionKey, PositionUpdate, PriceTick},
};
use smol_str::SmolStr;
use std::collections::{BTreeMap, VecDeque};

/// Number of diagnostic messages retained while diagnostics are enabled.
pub const MAX_DEBUG_MESSAGES: usize = 10;

/// Direction of the total balance relative to its previous positive value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum BalanceTrend {
    /// No previous total to compare against.
    #[default]
    Initial,
    Up,
    Down,
    Flat,
}

/// Headline status shown while no position is tracked.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MonitorStatus {
    /// Nothing received yet.
    Initializing,
    /// Connected, but no position has been reported.
    NoPositions,
    Tracking(usize),
}

/// Reduced view of every position, balance & fault received so far.
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    positions: BTreeMap<PositionKey, Position>,
    balances: BTreeMap<SmolStr, Balance>,
    previous_total: Option<f64>,
    last_update: Option<DateTime<Utc>>,
    error: Option<String>,
    debug_enabled: bool,
    debug_messages: VecDeque<String>,
}

impl MonitorState {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            ..Self::default()
        }
    }

    /// Apply a position update.
    ///
    /// A snapshot replaces the record with the same key. A price tick reprices every stored
    /// record of its instrument and never creates one. Either clears the error line.
    pub fn apply_position(&mut self, update: PositionUpdate, now: DateTime<Utc>) {
        match update {
            PositionUpdate::Snapshot(position) => {
                self.push_debug(
                    format!(
                        "Position updated: {} {} {:.4} @ {:.2}",
                        position.instrument_id,
                        position.side,
                        position.size,
                        position.current_price
                    ),
                    now,
                );
                self.positions.insert(position.key(), position);
                self.last_update = Some(now);
            }
            PositionUpdate::Price(tick) => {
                if self.apply_price(&tick) > 0 {
                    self.last_update = Some(now);
                    self.push_debug(
                        format!(
                            "Ticker updated: {} @ {:.2}",
                            tick.instrument_id, tick.current_price
                        ),
                        now,
                    );
                }
            }
        }

        self.error = None;
    }

    /// Reprice stored positions of the tick's instrument, returning how many were updated.
    fn apply_price(&mut self, tick: &PriceTick) -> usize {
        let mut updated = 0;
        for position in self
            .positions
            .values_mut()
            .filter(|position| position.instrument_id == tick.instrument_id)
        {
            position.reprice(tick.current_price, tick.timestamp);
            updated += 1;
        }
        updated
    }

    /// Upsert a balance, first recording the current positive total as the previous total.
    pub fn apply_balance(&mut self, balance: Balance, now: DateTime<Utc>) {
        let total = self.total_equity();
        if total > 0.0 {
            self.previous_total = Some(total);
        }

        self.push_debug(
            format!(
                "Balance updated: {} Total: {:.4} Available: {:.4}",
                balance.currency, balance.total_equity, balance.available_balance
            ),
            now,
        );
        self.balances.insert(balance.currency.clone(), balance);
        self.last_update = Some(now);
    }

    /// Route a fault channel entry: informational entries go to the diagnostic ring, the rest
    /// replace the error line.
    pub fn apply_fault(&mut self, entry: &str, now: DateTime<Utc>) {
        match FaultEntry::parse(entry) {
            FaultEntry::Info(message) => self.push_debug(message.to_string(), now),
            FaultEntry::Error(message) => self.error = Some(message.to_string()),
        }
    }

    fn push_debug(&mut self, message: String, now: DateTime<Utc>) {
        if !self.debug_enabled {
            return;
        }

        let stamp = now.with_timezone(&Local).format("%H:%M:%S");
        self.debug_messages.push_back(format!("[{stamp}] {message}"));
        while self.debug_messages.len() > MAX_DEBUG_MESSAGES {
            self.debug_messages.pop_front();
        }
    }

    /// Enable or disable diagnostics. Disabling discards retained messages.
    pub fn set_debug(&mut self, enabled: bool) {
        self.debug_enabled = enabled;
        if !enabled {
            self.debug_messages.clear();
        }
    }

    pub fn toggle_debug(&mut self) {
        self.set_debug(!self.debug_enabled);
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }

    pub fn debug_messages(&self) -> impl ExactSizeIterator<Item = &str> {
        self.debug_messages.iter().map(String::as_str)
    }

    /// Positions ordered by instrument id, then side.
    pub fn positions(&self) -> impl ExactSizeIterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn balances(&self) -> impl ExactSizeIterator<Item = &Balance> {
        self.balances.values()
    }

    /// Sum of total equity across every currency.
    pub fn total_equity(&self) -> f64 {
        self.balances
            .values()
            .map(|balance| balance.total_equity)
            .sum()
    }

    pub fn previous_total(&self) -> Option<f64> {
        self.previous_total
    }

    pub fn balance_trend(&self) -> BalanceTrend {
        let Some(previous) = self.previous_total else {
            return BalanceTrend::Initial;
        };

        let total = self.total_equity();
        if total > previous {
            BalanceTrend::Up
        } else if total < previous {
            BalanceTrend::Down
        } else {
            BalanceTrend::Flat
        }
    }

    /// Currency used to label the total: USDT when held, then USD, then the first currency.
    pub fn display_currency(&self) -> Option<&str> {
        ["USDT", "USD"]
            .into_iter()
            .find(|currency| self.balances.contains_key(*currency))
            .or_else(|| self.balances.keys().next().map(SmolStr::as_str))
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> MonitorStatus {
        match (self.positions.len(), self.last_update) {
            (0, None) => MonitorStatus::Initializing,
            (0, Some(_)) => MonitorStatus::NoPositions,
            (count, _) => MonitorStatus::Tracking(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posmon_data::model::PositionSide;

    fn balance(currency: &str, total_equity: f64) -> Balance {
        Balance {
            currency: SmolStr::new(currency),
            total_equity,
            available_balance: total_equity,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_balance_trend() {
        struct TestCase {
            updates: Vec<(&'static str, f64)>,
            expected_total: f64,
            expected_previous: Option<f64>,
            expected_trend: BalanceTrend,
        }

        let tests = vec![
            TestCase {
                // TC0: first balance has nothing to compare against
                updates: vec![("USDT", 1000.0)],
                expected_total: 1000.0,
                expected_previous: None,
                expected_trend: BalanceTrend::Initial,
            },
            TestCase {
                // TC1: increase
                updates: vec![("USDT", 1000.0), ("USDT", 1100.0)],
                expected_total: 1100.0,
                expected_previous: Some(1000.0),
                expected_trend: BalanceTrend::Up,
            },
            TestCase {
                // TC2: decrease
                updates: vec![("USDT", 1000.0), ("USDT", 900.0)],
                expected_total: 900.0,
                expected_previous: Some(1000.0),
                expected_trend: BalanceTrend::Down,
            },
            TestCase {
                // TC3: total sums across currencies
                updates: vec![("USDT", 1000.0), ("BTC", 50.0)],
                expected_total: 1050.0,
                expected_previous: Some(1000.0),
                expected_trend: BalanceTrend::Up,
            },
            TestCase {
                // TC4: zero total is never recorded as previous
                updates: vec![("USDT", 0.0), ("USDT", 10.0)],
                expected_total: 10.0,
                expected_previous: None,
                expected_trend: BalanceTrend::Initial,
            },
            TestCase {
                // TC5: unchanged
                updates: vec![("USDT", 500.0), ("USDT", 500.0)],
                expected_total: 500.0,
                expected_previous: Some(500.0),
                expected_trend: BalanceTrend::Flat,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut state = MonitorState::default();
            for (currency, total) in test.updates {
                state.apply_balance(balance(currency, total), Utc::now());
            }

            assert_eq!(state.total_equity(), test.expected_total, "TC{} failed", index);
            assert_eq!(state.previous_total(), test.expected_previous, "TC{} failed", index);
            assert_eq!(state.balance_trend(), test.expected_trend, "TC{} failed", index);
        }
    }

    #[test]
    fn test_display_currency_prefers_usdt() {
        let mut state = MonitorState::default();
        assert_eq!(state.display_currency(), None);

        state.apply_balance(balance("BTC", 1.0), Utc::now());
        assert_eq!(state.display_currency(), Some("BTC"));

        state.apply_balance(balance("USD", 1.0), Utc::now());
        assert_eq!(state.display_currency(), Some("USD"));

        state.apply_balance(balance("USDT", 1.0), Utc::now());
        assert_eq!(state.display_currency(), Some("USDT"));
    }

    #[test]
    fn test_debug_ring_bounded_and_only_while_enabled() {
        let mut state = MonitorState::default();
        state.apply_fault("DEBUG: dropped while disabled", Utc::now());
        assert_eq!(state.debug_messages().len(), 0);

        state.toggle_debug();
        for index in 0..15 {
            state.apply_fault(&format!("DEBUG: message {index}"), Utc::now());
        }

        let messages = state.debug_messages().collect::<Vec<_>>();
        assert_eq!(messages.len(), MAX_DEBUG_MESSAGES);
        assert!(messages[0].ends_with("] message 5"));
        assert!(messages[9].ends_with("] message 14"));

        state.toggle_debug();
        assert!(!state.debug_enabled());
        assert_eq!(state.debug_messages().len(), 0);
    }

    #[test]
    fn test_error_set_by_fault_and_cleared_by_position_update() {
        let mut state = MonitorState::new(true);

        state.apply_fault("trading read failed: connection closed", Utc::now());
        assert_eq!(state.error(), Some("trading read failed: connection closed"));

        state.apply_fault("DEBUG: informational", Utc::now());
        assert_eq!(state.error(), Some("trading read failed: connection closed"));

        state.apply_position(
            PositionUpdate::Price(PriceTick::new(SmolStr::new("BTC-USDT-SWAP"), 1.0, Utc::now())),
            Utc::now(),
        );
        assert_eq!(state.error(), None);
    }

    #[test]
    fn test_status() {
        let mut state = MonitorState::default();
        assert_eq!(state.status(), MonitorStatus::Initializing);

        state.apply_balance(balance("USDT", 1.0), Utc::now());
        assert_eq!(state.status(), MonitorStatus::NoPositions);

        state.apply_position(
            PositionUpdate::Snapshot(Position {
                instrument_id: SmolStr::new("BTC-USDT-SWAP"),
                side: PositionSide::Long,
                size: 1.0,
                average_price: 1.0,
                current_price: 1.0,
                unrealized_pnl: 0.0,
                unrealized_pnl_ratio: 0.0,
                leverage: 1.0,
                timestamp: Utc::now(),
            }),
            Utc::now(),
        );
        assert_eq!(state.status(), MonitorStatus::Tracking(1));
    }
}
