//! Mirroring configuration.

use std::time::Duration;

use anyhow::{ensure, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for the order mirror and its stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Leader wallet address whose orders are mirrored
    pub leader_address: String,

    /// Quote value (USDC) of every follower order
    pub fixed_notional: Decimal,

    /// Interval between keepalive pings on the stream
    pub keepalive_interval: Duration,

    /// Maximum age of the cached spot snapshot (None = never refetch)
    pub metadata_max_age: Option<Duration>,

    /// Ignore repeated `open` events for leader orders whose mirroring failed
    pub suppress_failed_retries: bool,

    /// Timeout for establishing the stream connection
    pub connect_timeout: Duration,

    /// First reconnect delay
    pub reconnect_initial_delay: Duration,

    /// Upper bound on the reconnect delay
    pub reconnect_max_delay: Duration,

    /// Log orders instead of sending them
    pub dry_run: bool,

    /// Use testnet endpoints and signing domain
    pub testnet: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            leader_address: String::new(),
            fixed_notional: dec!(20),
            keepalive_interval: Duration::from_secs(30),
            metadata_max_age: Some(Duration::from_secs(10)),
            suppress_failed_retries: false,
            connect_timeout: Duration::from_secs(10),
            reconnect_initial_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            dry_run: true,
            testnet: false,
        }
    }
}

impl MirrorConfig {
    /// Check the values the mirror cannot run without.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.leader_address.trim().is_empty(),
            "leader address required"
        );
        ensure!(
            self.fixed_notional > Decimal::ZERO,
            "fixed order notional must be positive"
        );
        ensure!(
            !self.keepalive_interval.is_zero(),
            "keepalive interval must be non-zero"
        );
        ensure!(
            self.reconnect_initial_delay <= self.reconnect_max_delay,
            "reconnect initial delay exceeds max delay"
        );
        Ok(())
    }
}
