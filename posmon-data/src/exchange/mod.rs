/// `Okx` v5 WebSocket API: channel names, requests, login signing & inbound record decoding.
pub mod okx;
