//! Leader order lifecycle events and fills as observed on the stream.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an order or fill.
///
/// The venue encodes bids as `B` and asks as `A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    #[serde(rename = "B")]
    Buy,
    #[serde(rename = "A")]
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy)
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status reported for a leader order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderOrderStatus {
    Open,
    Canceled,
    Filled,
    /// Any other venue status (rejected, triggered, margin cancels, ...).
    Other(String),
}

impl LeaderOrderStatus {
    pub fn from_wire(status: &str) -> Self {
        match status {
            "open" => Self::Open,
            "canceled" => Self::Canceled,
            "filled" => Self::Filled,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Canceled => "canceled",
            Self::Filled => "filled",
            Self::Other(s) => s,
        }
    }
}

/// A single order lifecycle event for the leader account.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderOrderEvent {
    /// Market identifier as sent by the venue (`@107`, `PURR/USDC`, `BTC`)
    pub market: String,

    pub side: OrderSide,

    /// Remaining size of the leader order
    pub size: Decimal,

    /// Leader's limit price, copied verbatim onto the follower order
    pub limit_price: Decimal,

    /// Venue order id of the leader order
    pub leader_oid: u64,

    pub status: LeaderOrderStatus,

    /// Order creation time reported by the venue
    pub timestamp: DateTime<Utc>,
}

/// A fill on the leader account. Logged only, never mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub market: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub closed_pnl: Decimal,
}

impl Fill {
    /// Quote value of the fill.
    pub fn notional(&self) -> Decimal {
        self.size * self.price
    }
}
