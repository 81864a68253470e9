use super::subscription::{OkxOp, OkxRequest};
use crate::credentials::Credentials;
use base64::{Engine, prelude::BASE64_STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Request method component of the [`Okx`](super::Okx) login signing payload.
pub const LOGIN_METHOD: &str = "GET";

/// Request path component of the [`Okx`](super::Okx) login signing payload.
pub const LOGIN_PATH: &str = "/users/self/verify";

/// Single `args` entry of an [`Okx`](super::Okx) login request.
///
/// See docs: <https://www.okx.com/docs-v5/en/#overview-websocket-login>
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxLoginArg {
    pub api_key: String,
    pub passphrase: String,
    pub timestamp: String,
    pub sign: String,
}

impl OkxLoginArg {
    /// Build a signed login arg. `timestamp` is sent as Unix seconds.
    pub fn new(credentials: &Credentials, timestamp: DateTime<Utc>) -> Self {
        let timestamp = timestamp.timestamp().to_string();
        let sign = sign(&credentials.secret_key, &timestamp);

        Self {
            api_key: credentials.api_key.clone(),
            passphrase: credentials.passphrase.clone(),
            timestamp,
            sign,
        }
    }
}

impl OkxRequest<OkxLoginArg> {
    pub fn login(credentials: &Credentials, timestamp: DateTime<Utc>) -> Self {
        Self {
            op: OkxOp::Login,
            args: vec![OkxLoginArg::new(credentials, timestamp)],
        }
    }
}

/// Base64 encoded HMAC-SHA256 of `timestamp + "GET" + "/users/self/verify"`, keyed with the
/// API secret.
pub fn sign(secret_key: &str, timestamp: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret_key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(LOGIN_METHOD.as_bytes());
    mac.update(LOGIN_PATH.as_bytes());
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: &str = "3f2b8c1a-9d4e-4b7a-8c6d-1e2f3a4b5c6d";
    const SECRET: &str = "ABCDEF0123456789ABCDEF0123456789";

    #[test]
    fn test_sign_matches_known_vector() {
        assert_eq!(
            sign(SECRET, "1538054050"),
            "3gCnMXCLve+ci1up34622AN+sDh0VUpRmYkByS6W/0w="
        );
    }

    #[test]
    fn test_okx_login_request_serialise() {
        let credentials = Credentials::new(KEY, SECRET, "hunter2");
        let timestamp = DateTime::<Utc>::from_timestamp(1538054050, 0).unwrap();

        let request = OkxRequest::login(&credentials, timestamp);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "op": "login",
                "args": [{
                    "apiKey": KEY,
                    "passphrase": "hunter2",
                    "timestamp": "1538054050",
                    "sign": "3gCnMXCLve+ci1up34622AN+sDh0VUpRmYkByS6W/0w=",
                }]
            })
        );
    }
}
