//! Hyperliquid API clients: info (metadata), exchange (execution) and the websocket stream.

mod exchange_client;
mod info_client;
mod stream;
mod types;

pub use exchange_client::ExchangeClient;
pub use info_client::InfoClient;
pub use stream::{LeaderConnection, LeaderStream, StreamConfig, StreamError};
pub use types::*;

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";

/// Venue endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub info: String,
    pub exchange: String,
    pub websocket: String,
}

impl Endpoints {
    /// Default endpoints for mainnet or testnet.
    pub fn new(testnet: bool) -> Self {
        let base = if testnet { TESTNET_API_URL } else { MAINNET_API_URL };
        Self::from_base(base)
    }

    /// Endpoints rooted at an `https://` API base URL.
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let ws_base = base
            .strip_prefix("https://")
            .map(|host| format!("wss://{}", host))
            .or_else(|| base.strip_prefix("http://").map(|host| format!("ws://{}", host)))
            .unwrap_or_else(|| base.to_string());

        Self {
            info: format!("{}/info", base),
            exchange: format!("{}/exchange", base),
            websocket: format!("{}/ws", ws_base),
        }
    }

    /// Replace individual endpoints where an override is given.
    pub fn with_overrides(
        mut self,
        info: Option<String>,
        exchange: Option<String>,
        websocket: Option<String>,
    ) -> Self {
        if let Some(url) = info {
            self.info = url;
        }
        if let Some(url) = exchange {
            self.exchange = url;
        }
        if let Some(url) = websocket {
            self.websocket = url;
        }
        self
    }
}
