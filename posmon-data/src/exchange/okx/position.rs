use crate::{
    de::{de_lenient_str, parse_epoch_ms, parse_explicit_f64, parse_f64},
    model::{Position, PositionSide, pnl_ratio_percent, unrealized_pnl},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use smol_str::SmolStr;

/// Size assumed for ticker-derived records, which carry no position size.
pub const DEFAULT_SIZE: f64 = 1.0;

/// Leverage assumed when the record carries none.
pub const DEFAULT_LEVERAGE: f64 = 1.0;

/// [`Okx`](super::super::Okx) positions channel record. Ticker records share the
/// `instId` & `last` fields and are read through the same type.
///
/// ### Raw Payload Examples
/// See docs: <https://www.okx.com/docs-v5/en/#trading-account-websocket-positions-channel>
/// ```json
/// {
///     "instId": "BTC-USDT-SWAP",
///     "posSide": "long",
///     "pos": "2",
///     "avgPx": "100",
///     "markPx": "110",
///     "upl": "20",
///     "uplRatio": "0.1",
///     "lever": "10",
///     "uTime": "1614859751636"
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxPositionRecord {
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub inst_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub pos_side: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub pos: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub avg_px: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub mark_px: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub last: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub upl: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub pnl: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub upl_ratio: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub pnl_ratio: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub lever: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub u_time: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub ts: Option<String>,
}

impl OkxPositionRecord {
    /// True when the record carries position-only fields rather than being a bare ticker.
    pub fn has_position_fields(&self) -> bool {
        self.pos.is_some() || self.pos_side.is_some() || self.avg_px.is_some()
    }

    /// Normalise into a [`Position`].
    ///
    /// Returns `None` when `instId` is absent. Every other field falls back in order:
    /// - size: `pos` (absolute value), else [`DEFAULT_SIZE`]
    /// - average price: `avgPx`, else `last`
    /// - current price: `markPx`, else `last`
    /// - pnl: `upl`, else `pnl`, else computed from prices & size
    /// - ratio: `uplRatio` x 100, else `pnlRatio` x 100, else computed
    /// - leverage: `lever`, else [`DEFAULT_LEVERAGE`]
    /// - timestamp: `uTime`, else `ts`, else `received`
    pub fn into_position(self, received: DateTime<Utc>) -> Option<Position> {
        let instrument_id = self
            .inst_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(SmolStr::new)?;

        let signed_size = parse_f64(self.pos.as_deref());
        let side = parse_side(self.pos_side.as_deref(), signed_size);
        let size = signed_size.map(f64::abs).unwrap_or(DEFAULT_SIZE);

        let last = parse_f64(self.last.as_deref());
        let average_price = parse_f64(self.avg_px.as_deref())
            .or(last)
            .unwrap_or_default();
        let current_price = parse_f64(self.mark_px.as_deref())
            .or(last)
            .unwrap_or_default();

        let unrealized_pnl = parse_explicit_f64(self.upl.as_deref())
            .or_else(|| parse_explicit_f64(self.pnl.as_deref()))
            .or_else(|| {
                (average_price > 0.0 && current_price > 0.0 && size > 0.0)
                    .then(|| unrealized_pnl(side, average_price, current_price, size))
            })
            .unwrap_or_default();

        let unrealized_pnl_ratio = parse_explicit_f64(self.upl_ratio.as_deref())
            .or_else(|| parse_explicit_f64(self.pnl_ratio.as_deref()))
            .map(|fraction| fraction * 100.0)
            .or_else(|| pnl_ratio_percent(unrealized_pnl, average_price, size))
            .unwrap_or_default();

        let leverage = parse_f64(self.lever.as_deref()).unwrap_or(DEFAULT_LEVERAGE);

        let timestamp = parse_epoch_ms(self.u_time.as_deref())
            .or_else(|| parse_epoch_ms(self.ts.as_deref()))
            .unwrap_or(received);

        Some(Position {
            instrument_id,
            side,
            size,
            average_price,
            current_price,
            unrealized_pnl,
            unrealized_pnl_ratio,
            leverage,
            timestamp,
        })
    }
}

/// `posSide` is `long`, `short` or, in net mode, `net` with the direction carried by the
/// sign of `pos`. Absent or unknown sides read as [`PositionSide::Long`].
fn parse_side(pos_side: Option<&str>, signed_size: Option<f64>) -> PositionSide {
    match pos_side.map(str::trim) {
        Some(side) if side.eq_ignore_ascii_case("short") => PositionSide::Short,
        Some(side) if side.eq_ignore_ascii_case("net") && signed_size.is_some_and(|s| s < 0.0) => {
            PositionSide::Short
        }
        _ => PositionSide::Long,
    }
}
