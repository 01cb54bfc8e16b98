//! Execution adapter seam: follower order placement and cancellation.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::models::{OrderSide, SpotMarket};

/// Order time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    /// Good-til-cancelled
    Gtc,
}

impl TimeInForce {
    pub fn as_wire(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "Gtc",
        }
    }
}

/// A follower limit order to place.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorOrderRequest {
    pub market: SpotMarket,
    pub side: OrderSide,
    pub size: Decimal,
    pub limit_price: Decimal,
    pub time_in_force: TimeInForce,
}

/// Result of a successful placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPlacement {
    /// Order rests on the book under this id
    Resting { order_id: u64 },
    /// Order executed in full before resting; nothing to cancel
    ImmediateFill,
}

/// Placement failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Places and cancels orders on behalf of the follower account.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    async fn place_order(
        &self,
        request: &MirrorOrderRequest,
    ) -> Result<OrderPlacement, ExecutionError>;

    /// Cancel a resting order. Failures are reported as `false`, never raised.
    async fn cancel_order(&self, order_id: u64, market: &SpotMarket) -> bool;
}

/// Dry-run adapter: logs orders and hands out synthetic ids.
pub struct PaperExecution {
    next_order_id: AtomicU64,
}

impl PaperExecution {
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicU64::new(1),
        }
    }
}

impl Default for PaperExecution {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionAdapter for PaperExecution {
    async fn place_order(
        &self,
        request: &MirrorOrderRequest,
    ) -> Result<OrderPlacement, ExecutionError> {
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        info!(
            market = %request.market.name,
            side = %request.side,
            size = %request.size,
            price = %request.limit_price,
            tif = request.time_in_force.as_wire(),
            order_id,
            "[DRY RUN] Would place follower order"
        );
        Ok(OrderPlacement::Resting { order_id })
    }

    async fn cancel_order(&self, order_id: u64, market: &SpotMarket) -> bool {
        info!(market = %market.name, order_id, "[DRY RUN] Would cancel follower order");
        true
    }
}
