use crate::{
    de::{de_lenient_str, de_lenient_vec, parse_epoch_ms, parse_f64},
    model::Balance,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use smol_str::SmolStr;

/// [`Okx`](super::super::Okx) account channel record.
///
/// The venue nests per-currency equity under `details`; a flat record carrying `ccy` at the
/// top level is accepted too.
///
/// ### Raw Payload Examples
/// See docs: <https://www.okx.com/docs-v5/en/#trading-account-websocket-account-channel>
/// ```json
/// {
///     "uTime": "1597026383085",
///     "totalEq": "41624.32",
///     "details": [
///         {"ccy": "USDT", "eq": "4992.89", "availBal": "4834.31", "uTime": "1597026383085"}
///     ]
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxAccountRecord {
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub ccy: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub total_eq: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub avail_bal: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub u_time: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_vec")]
    pub details: Vec<OkxAccountDetail>,
}

/// Per-currency entry of an [`OkxAccountRecord`].
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxAccountDetail {
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub ccy: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub eq: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub avail_bal: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_str")]
    pub u_time: Option<String>,
}

impl OkxAccountRecord {
    /// Normalise into one [`Balance`] per currency. Entries without a currency are dropped,
    /// unparsable amounts read as `0`.
    pub fn into_balances(self, received: DateTime<Utc>) -> Vec<Balance> {
        let record_time = parse_epoch_ms(self.u_time.as_deref()).unwrap_or(received);

        let top_level = currency(self.ccy.as_deref()).map(|currency| Balance {
            currency,
            total_equity: parse_f64(self.total_eq.as_deref()).unwrap_or_default(),
            available_balance: parse_f64(self.avail_bal.as_deref()).unwrap_or_default(),
            timestamp: record_time,
        });

        let details = self.details.into_iter().filter_map(|detail| {
            Some(Balance {
                currency: currency(detail.ccy.as_deref())?,
                total_equity: parse_f64(detail.eq.as_deref()).unwrap_or_default(),
                available_balance: parse_f64(detail.avail_bal.as_deref()).unwrap_or_default(),
                timestamp: parse_epoch_ms(detail.u_time.as_deref()).unwrap_or(record_time),
            })
        });

        top_level.into_iter().chain(details).collect()
    }
}

fn currency(raw: Option<&str>) -> Option<SmolStr> {
    raw.map(str::trim)
        .filter(|ccy| !ccy.is_empty())
        .map(SmolStr::new)
}
