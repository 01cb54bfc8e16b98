//! Order mirror: replicates a leader's spot limit orders for the follower.
//!
//! Per leader order id the mirror moves through
//! `unseen -> mirrored(follower) -> closed`. An immediate fill is recorded as a
//! mirrored entry with nothing to cancel. Events are handled strictly in the
//! order they are passed in; the mirror is the only writer of its mapping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::models::{
    is_eligible_for_mirroring, AssetMetadata, Fill, LeaderOrderEvent, LeaderOrderStatus,
    SpotMarket, StreamEvent,
};

use super::{
    ExecutionAdapter, MetadataResolver, MirrorOrderRequest, OrderPlacement, TimeInForce,
};

/// Size decimals are clamped to this many places.
const MAX_SIZE_PRECISION: u32 = 15;

/// Follower side of a mapping entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerOrder {
    /// Resting follower order that can be cancelled
    Resting(u64),
    /// Follower order filled on placement
    ImmediateFill,
}

/// A live mapping entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MirroredOrder {
    pub follower: FollowerOrder,
    pub market: SpotMarket,
    pub size: Decimal,
}

/// Mirroring state of a leader order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderState {
    Unseen,
    Mirrored(FollowerOrder),
    /// Placement failed and retries are suppressed
    Failed,
}

/// Why an order event produced no follower action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotSpot,
    AlreadyMirrored,
    PreviouslyFailed,
    InvalidPrice,
    Metadata(String),
    ZeroSize,
    SizeOverflow,
    NotMapped,
    Observed,
}

/// What handling a single leader order event did.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorOutcome {
    Placed { follower_oid: u64, size: Decimal },
    ImmediateFill { size: Decimal },
    PlacementFailed(String),
    Cancelled { follower_oid: u64, success: bool },
    /// Mapping dropped without a cancel call
    Unmapped,
    Skipped(SkipReason),
}

/// Counters reported when the mirror stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub events: u64,
    pub mirrored: u64,
    pub immediate_fills: u64,
    pub placement_failures: u64,
    pub metadata_failures: u64,
    pub cancels_sent: u64,
    pub cancel_failures: u64,
    pub skipped: u64,
    pub leader_fills: u64,
    pub active_mappings: usize,
}

impl std::fmt::Display for MirrorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Mirror Statistics ===")?;
        writeln!(f, "Order Events:     {}", self.events)?;
        writeln!(f, "Mirrored:         {} (Immediate Fills: {})",
            self.mirrored, self.immediate_fills)?;
        writeln!(f, "Failures:         {} placement, {} metadata",
            self.placement_failures, self.metadata_failures)?;
        writeln!(f, "Cancels Sent:     {} (Failed: {})",
            self.cancels_sent, self.cancel_failures)?;
        writeln!(f, "Skipped:          {}", self.skipped)?;
        writeln!(f, "Leader Fills:     {}", self.leader_fills)?;
        writeln!(f, "Active Mappings:  {}", self.active_mappings)?;
        Ok(())
    }
}

/// Follower size for a fixed notional, rounded to the market's size precision.
///
/// Fails with `ZeroSize` when the rounded size is not positive and with
/// `SizeOverflow` when the quotient does not fit a `Decimal`.
pub fn follower_size(fixed_notional: Decimal, metadata: &AssetMetadata) -> Result<Decimal, SkipReason> {
    let raw = fixed_notional
        .checked_div(metadata.reference_price)
        .ok_or(SkipReason::SizeOverflow)?;
    let rounded = raw.round_dp(metadata.size_precision.min(MAX_SIZE_PRECISION));
    if rounded > Decimal::ZERO {
        Ok(rounded)
    } else {
        Err(SkipReason::ZeroSize)
    }
}

/// The order mirror state machine.
pub struct OrderMirror {
    execution: Arc<dyn ExecutionAdapter>,
    resolver: MetadataResolver,
    fixed_notional: Decimal,
    suppress_failed_retries: bool,

    // leader oid -> follower order
    mappings: HashMap<u64, MirroredOrder>,
    failed: HashSet<u64>,
    stats: MirrorStats,
}

impl OrderMirror {
    pub fn new(
        execution: Arc<dyn ExecutionAdapter>,
        resolver: MetadataResolver,
        fixed_notional: Decimal,
        suppress_failed_retries: bool,
    ) -> Self {
        Self {
            execution,
            resolver,
            fixed_notional,
            suppress_failed_retries,
            mappings: HashMap::new(),
            failed: HashSet::new(),
            stats: MirrorStats::default(),
        }
    }

    /// Current state of a leader order id.
    pub fn state_of(&self, leader_oid: u64) -> LeaderState {
        if let Some(entry) = self.mappings.get(&leader_oid) {
            LeaderState::Mirrored(entry.follower)
        } else if self.failed.contains(&leader_oid) {
            LeaderState::Failed
        } else {
            LeaderState::Unseen
        }
    }

    /// Mapping entry for a leader order id, if any.
    #[cfg(test)]
    pub fn mapping(&self, leader_oid: u64) -> Option<&MirroredOrder> {
        self.mappings.get(&leader_oid)
    }

    pub fn active_mappings(&self) -> usize {
        self.mappings.len()
    }

    pub fn stats(&self) -> MirrorStats {
        MirrorStats {
            active_mappings: self.active_mappings(),
            ..self.stats.clone()
        }
    }

    /// Handle one decoded stream event.
    pub async fn handle_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::OrderUpdates(updates) => {
                for update in updates {
                    self.handle_order(&update).await;
                }
            }
            StreamEvent::Fills(fills) => self.log_fills(&fills),
            StreamEvent::SubscriptionAck(kind) => {
                info!(subscription = kind.as_deref().unwrap_or("unknown"), "Subscription confirmed");
            }
            StreamEvent::Pong => debug!("Keepalive acknowledged"),
            StreamEvent::Unrecognized(channel) => {
                debug!(channel = %channel, "Ignoring message on unhandled channel");
            }
        }
    }

    /// Handle a single leader order lifecycle event.
    pub async fn handle_order(&mut self, event: &LeaderOrderEvent) -> MirrorOutcome {
        if !is_eligible_for_mirroring(&event.market) {
            debug!(market = %event.market, leader_oid = event.leader_oid, "Skipping non-spot order");
            return MirrorOutcome::Skipped(SkipReason::NotSpot);
        }

        self.stats.events += 1;
        info!(
            status = event.status.as_str(),
            side = %event.side,
            size = %event.size,
            market = %event.market,
            price = %event.limit_price,
            leader_oid = event.leader_oid,
            "Leader spot order"
        );

        let outcome = match &event.status {
            LeaderOrderStatus::Open => self.handle_open(event).await,
            LeaderOrderStatus::Canceled => self.handle_canceled(event).await,
            LeaderOrderStatus::Filled => self.handle_filled(event),
            LeaderOrderStatus::Other(status) => {
                debug!(leader_oid = event.leader_oid, status = %status, "Ignoring leader order status");
                MirrorOutcome::Skipped(SkipReason::Observed)
            }
        };

        if matches!(outcome, MirrorOutcome::Skipped(_)) {
            self.stats.skipped += 1;
        }
        outcome
    }

    async fn handle_open(&mut self, event: &LeaderOrderEvent) -> MirrorOutcome {
        let leader_oid = event.leader_oid;

        let reason = match self.state_of(leader_oid) {
            LeaderState::Mirrored(_) => Some(SkipReason::AlreadyMirrored),
            LeaderState::Failed => Some(SkipReason::PreviouslyFailed),
            LeaderState::Unseen => None,
        };
        if let Some(reason) = reason {
            debug!(leader_oid, reason = ?reason, "Skipping repeated open");
            return MirrorOutcome::Skipped(reason);
        }

        if event.limit_price <= Decimal::ZERO {
            warn!(market = %event.market, leader_oid, price = %event.limit_price, "Leader order has non-positive price");
            return MirrorOutcome::Skipped(SkipReason::InvalidPrice);
        }

        let metadata = match self.resolver.resolve(&event.market).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(market = %event.market, leader_oid, error = %e, "Could not resolve asset metadata");
                self.stats.metadata_failures += 1;
                return MirrorOutcome::Skipped(SkipReason::Metadata(e.to_string()));
            }
        };

        let size = match follower_size(self.fixed_notional, &metadata) {
            Ok(size) => size,
            Err(SkipReason::SizeOverflow) => {
                warn!(
                    market = %event.market,
                    leader_oid,
                    notional = %self.fixed_notional,
                    price = %metadata.reference_price,
                    "Follower size overflows"
                );
                return MirrorOutcome::Skipped(SkipReason::SizeOverflow);
            }
            Err(reason) => {
                warn!(
                    market = %event.market,
                    leader_oid,
                    price = %metadata.reference_price,
                    size_precision = metadata.size_precision,
                    "Follower size rounds to zero"
                );
                return MirrorOutcome::Skipped(reason);
            }
        };

        let request = MirrorOrderRequest {
            market: metadata.market.clone(),
            side: event.side,
            size,
            limit_price: event.limit_price,
            time_in_force: TimeInForce::Gtc,
        };

        info!(
            side = %request.side,
            size = %size,
            market = %request.market.name,
            price = %request.limit_price,
            "Placing follower order"
        );

        match self.execution.place_order(&request).await {
            Ok(OrderPlacement::Resting { order_id }) => {
                self.record(leader_oid, FollowerOrder::Resting(order_id), request);
                self.stats.mirrored += 1;
                info!(leader_oid, follower_oid = order_id, "Mapped leader order to follower order");
                MirrorOutcome::Placed {
                    follower_oid: order_id,
                    size,
                }
            }
            Ok(OrderPlacement::ImmediateFill) => {
                self.record(leader_oid, FollowerOrder::ImmediateFill, request);
                self.stats.mirrored += 1;
                self.stats.immediate_fills += 1;
                info!(leader_oid, "Follower order filled immediately");
                MirrorOutcome::ImmediateFill { size }
            }
            Err(e) => {
                error!(market = %event.market, leader_oid, error = %e, "Failed to place follower order");
                self.stats.placement_failures += 1;
                if self.suppress_failed_retries {
                    self.failed.insert(leader_oid);
                }
                MirrorOutcome::PlacementFailed(e.to_string())
            }
        }
    }

    async fn handle_canceled(&mut self, event: &LeaderOrderEvent) -> MirrorOutcome {
        let leader_oid = event.leader_oid;
        self.failed.remove(&leader_oid);

        let Some(entry) = self.mappings.remove(&leader_oid) else {
            debug!(leader_oid, "No follower order mapped to cancelled leader order");
            return MirrorOutcome::Skipped(SkipReason::NotMapped);
        };

        match entry.follower {
            FollowerOrder::Resting(follower_oid) => {
                self.stats.cancels_sent += 1;
                let success = self.execution.cancel_order(follower_oid, &entry.market).await;
                if success {
                    info!(leader_oid, follower_oid, "Cancelled follower order");
                } else {
                    self.stats.cancel_failures += 1;
                    warn!(leader_oid, follower_oid, "Failed to cancel follower order");
                }
                MirrorOutcome::Cancelled {
                    follower_oid,
                    success,
                }
            }
            FollowerOrder::ImmediateFill => {
                debug!(leader_oid, "Follower order already filled, nothing to cancel");
                MirrorOutcome::Unmapped
            }
        }
    }

    /// A filled leader order is no longer live: drop its mapping without a cancel.
    fn handle_filled(&mut self, event: &LeaderOrderEvent) -> MirrorOutcome {
        let leader_oid = event.leader_oid;
        self.failed.remove(&leader_oid);

        match self.mappings.remove(&leader_oid) {
            Some(entry) => {
                debug!(leader_oid, follower = ?entry.follower, "Leader order filled, mapping closed");
                MirrorOutcome::Unmapped
            }
            None => {
                debug!(leader_oid, "Leader order filled");
                MirrorOutcome::Skipped(SkipReason::Observed)
            }
        }
    }

    fn record(&mut self, leader_oid: u64, follower: FollowerOrder, request: MirrorOrderRequest) {
        self.failed.remove(&leader_oid);
        self.mappings.insert(
            leader_oid,
            MirroredOrder {
                follower,
                market: request.market,
                size: request.size,
            },
        );
    }

    fn log_fills(&mut self, fills: &[Fill]) {
        for fill in fills.iter().filter(|f| is_eligible_for_mirroring(&f.market)) {
            self.stats.leader_fills += 1;
            info!(
                side = %fill.side,
                size = %fill.size,
                market = %fill.market,
                price = %fill.price,
                fee = %fill.fee,
                closed_pnl = %fill.closed_pnl,
                "Leader spot fill"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderSide;
    use crate::trading::resolver::tests::{snapshot_with_pairs, StubMetadata};
    use crate::trading::{ExecutionError, SpotSnapshot};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    /// Execution stub with scripted placement responses.
    struct StubExecution {
        responses: Mutex<VecDeque<Result<OrderPlacement, ExecutionError>>>,
        placed: Mutex<Vec<MirrorOrderRequest>>,
        cancelled: Mutex<Vec<(u64, SpotMarket)>>,
        cancel_result: bool,
    }

    impl StubExecution {
        fn new(responses: Vec<Result<OrderPlacement, ExecutionError>>) -> Self {
            Self {
                responses: Mutex::new(VecDeque::from(responses)),
                placed: Mutex::new(Vec::new()),
                cancelled: Mutex::new(Vec::new()),
                cancel_result: true,
            }
        }

        fn with_failing_cancels(mut self) -> Self {
            self.cancel_result = false;
            self
        }

        async fn placed(&self) -> Vec<MirrorOrderRequest> {
            self.placed.lock().await.clone()
        }

        async fn cancelled(&self) -> Vec<(u64, SpotMarket)> {
            self.cancelled.lock().await.clone()
        }
    }

    #[async_trait]
    impl ExecutionAdapter for StubExecution {
        async fn place_order(
            &self,
            request: &MirrorOrderRequest,
        ) -> Result<OrderPlacement, ExecutionError> {
            self.placed.lock().await.push(request.clone());
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(ExecutionError::Transport("no scripted response".into())))
        }

        async fn cancel_order(&self, order_id: u64, market: &SpotMarket) -> bool {
            self.cancelled.lock().await.push((order_id, market.clone()));
            self.cancel_result
        }
    }

    fn event(oid: u64, market: &str, side: OrderSide, price: Decimal, status: LeaderOrderStatus) -> LeaderOrderEvent {
        LeaderOrderEvent {
            market: market.to_string(),
            side,
            size: dec!(100),
            limit_price: price,
            leader_oid: oid,
            status,
            timestamp: Utc::now(),
        }
    }

    fn open(oid: u64, market: &str, price: Decimal) -> LeaderOrderEvent {
        event(oid, market, OrderSide::Buy, price, LeaderOrderStatus::Open)
    }

    fn canceled(oid: u64, market: &str) -> LeaderOrderEvent {
        event(oid, market, OrderSide::Buy, dec!(1), LeaderOrderStatus::Canceled)
    }

    /// Snapshot where `@5` is priced at 2.0 with 2 size decimals.
    fn end_to_end_snapshot() -> SpotSnapshot {
        let mut snapshot = snapshot_with_pairs(6);
        snapshot.contexts[5].mid_px = Some(dec!(2.0));
        snapshot.meta.tokens[6].sz_decimals = 2;
        snapshot
    }

    fn mirror_with(
        execution: Arc<StubExecution>,
        snapshot: SpotSnapshot,
        suppress_failed_retries: bool,
    ) -> OrderMirror {
        let resolver = MetadataResolver::new(Arc::new(StubMetadata::new(snapshot)), None);
        OrderMirror::new(execution, resolver, dec!(20), suppress_failed_retries)
    }

    #[test]
    fn test_follower_size_rounding() {
        let meta = |price: Decimal, precision: u32| AssetMetadata {
            market: SpotMarket {
                name: "@1".to_string(),
                index: 1,
            },
            reference_price: price,
            size_precision: precision,
        };

        assert_eq!(follower_size(dec!(20), &meta(dec!(2.0), 2)), Ok(dec!(10.00)));
        assert_eq!(follower_size(dec!(10), &meta(dec!(25), 3)), Ok(dec!(0.4)));
        assert_eq!(follower_size(dec!(20), &meta(dec!(3), 4)), Ok(dec!(6.6667)));
        assert_eq!(follower_size(dec!(20), &meta(dec!(0.000001234), 0)), Ok(dec!(16207455)));
        // 20 / 123456 = 0.000162 rounds to zero at 0 decimals
        assert_eq!(follower_size(dec!(20), &meta(dec!(123456), 0)), Err(SkipReason::ZeroSize));
        // 20 / 1e-28 exceeds the Decimal range
        assert_eq!(
            follower_size(dec!(20), &meta(Decimal::new(1, 28), 0)),
            Err(SkipReason::SizeOverflow)
        );
    }

    #[tokio::test]
    async fn test_end_to_end_open_places_follower_order() {
        let execution = Arc::new(StubExecution::new(vec![Ok(OrderPlacement::Resting { order_id: 9001 })]));
        let mut mirror = mirror_with(execution.clone(), end_to_end_snapshot(), false);

        let outcome = mirror.handle_order(&open(5, "@5", dec!(1.0))).await;
        assert_eq!(
            outcome,
            MirrorOutcome::Placed {
                follower_oid: 9001,
                size: dec!(10.00)
            }
        );

        let placed = execution.placed().await;
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].side, OrderSide::Buy);
        assert_eq!(placed[0].size, dec!(10.00));
        assert_eq!(placed[0].limit_price, dec!(1.0));
        assert_eq!(placed[0].market.index, 5);
        assert_eq!(placed[0].time_in_force, TimeInForce::Gtc);

        assert_eq!(mirror.state_of(5), LeaderState::Mirrored(FollowerOrder::Resting(9001)));
        assert_eq!(mirror.active_mappings(), 1);
    }

    #[tokio::test]
    async fn test_each_open_creates_one_mapping() {
        let execution = Arc::new(StubExecution::new(vec![
            Ok(OrderPlacement::Resting { order_id: 1 }),
            Ok(OrderPlacement::Resting { order_id: 2 }),
            Ok(OrderPlacement::Resting { order_id: 3 }),
        ]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(4), false);

        mirror.handle_order(&open(10, "@0", dec!(1))).await;
        mirror.handle_order(&open(11, "@1", dec!(2))).await;
        mirror.handle_order(&open(12, "TOK3/USDC", dec!(4))).await;

        let placed = execution.placed().await;
        // 20 / (i + 1) rounded to i decimals
        assert_eq!(placed[0].size, dec!(20));
        assert_eq!(placed[1].size, dec!(10.0));
        assert_eq!(placed[2].size, dec!(5.000));
        assert_eq!(placed[2].market.name, "TOK3/USDC");
        assert_eq!(mirror.active_mappings(), 3);
        assert_eq!(mirror.mapping(12).map(|m| m.follower), Some(FollowerOrder::Resting(3)));
    }

    #[tokio::test]
    async fn test_derivative_orders_are_not_mirrored() {
        let execution = Arc::new(StubExecution::new(vec![]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(2), false);

        let outcome = mirror.handle_order(&open(7, "BTC", dec!(50000))).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::NotSpot));

        let outcome = mirror.handle_order(&open(8, "@-1", dec!(1))).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::NotSpot));

        assert!(execution.placed().await.is_empty());
        assert_eq!(mirror.state_of(7), LeaderState::Unseen);
        assert_eq!(mirror.stats().events, 0);
    }

    #[tokio::test]
    async fn test_cancel_issues_exactly_one_follower_cancel() {
        let execution = Arc::new(StubExecution::new(vec![Ok(OrderPlacement::Resting { order_id: 88 })]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(3), false);

        mirror.handle_order(&open(9, "@2", dec!(3))).await;
        let outcome = mirror.handle_order(&canceled(9, "@2")).await;
        assert_eq!(
            outcome,
            MirrorOutcome::Cancelled {
                follower_oid: 88,
                success: true
            }
        );

        // A repeated cancel is a no-op
        let outcome = mirror.handle_order(&canceled(9, "@2")).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::NotMapped));

        let cancelled = execution.cancelled().await;
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].0, 88);
        assert_eq!(cancelled[0].1.index, 2);
        assert_eq!(mirror.state_of(9), LeaderState::Unseen);
    }

    #[tokio::test]
    async fn test_mapping_removed_even_when_cancel_fails() {
        let execution = Arc::new(
            StubExecution::new(vec![Ok(OrderPlacement::Resting { order_id: 5 })]).with_failing_cancels(),
        );
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(2), false);

        mirror.handle_order(&open(1, "@1", dec!(2))).await;
        let outcome = mirror.handle_order(&canceled(1, "@1")).await;

        assert_eq!(
            outcome,
            MirrorOutcome::Cancelled {
                follower_oid: 5,
                success: false
            }
        );
        assert!(mirror.mapping(1).is_none());
        assert_eq!(mirror.stats().cancel_failures, 1);
    }

    #[tokio::test]
    async fn test_cancel_without_mapping_is_noop() {
        let execution = Arc::new(StubExecution::new(vec![]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(1), false);

        let outcome = mirror.handle_order(&canceled(404, "@0")).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::NotMapped));
        assert!(execution.cancelled().await.is_empty());
        assert!(execution.placed().await.is_empty());
    }

    #[tokio::test]
    async fn test_immediate_fill_is_never_cancelled() {
        let execution = Arc::new(StubExecution::new(vec![Ok(OrderPlacement::ImmediateFill)]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(8), false);

        let outcome = mirror.handle_order(&open(42, "@7", dec!(8))).await;
        assert!(matches!(outcome, MirrorOutcome::ImmediateFill { .. }));
        assert_eq!(mirror.state_of(42), LeaderState::Mirrored(FollowerOrder::ImmediateFill));

        let outcome = mirror.handle_order(&canceled(42, "@7")).await;
        assert_eq!(outcome, MirrorOutcome::Unmapped);
        assert!(execution.cancelled().await.is_empty());
        assert!(mirror.mapping(42).is_none());
    }

    #[tokio::test]
    async fn test_zero_size_rejects_mirroring() {
        let mut snapshot = snapshot_with_pairs(1);
        snapshot.contexts[0].mid_px = Some(dec!(123456));
        snapshot.meta.tokens[1].sz_decimals = 0;

        let execution = Arc::new(StubExecution::new(vec![]));
        let mut mirror = mirror_with(execution.clone(), snapshot, false);

        let outcome = mirror.handle_order(&open(3, "@0", dec!(123000))).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::ZeroSize));
        assert!(execution.placed().await.is_empty());
        assert_eq!(mirror.state_of(3), LeaderState::Unseen);
    }

    #[tokio::test]
    async fn test_metadata_failure_aborts_single_event() {
        let execution = Arc::new(StubExecution::new(vec![Ok(OrderPlacement::Resting { order_id: 1 })]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(2), false);

        let outcome = mirror.handle_order(&open(1, "@9", dec!(1))).await;
        assert!(matches!(outcome, MirrorOutcome::Skipped(SkipReason::Metadata(_))));

        // The next event is still mirrored
        let outcome = mirror.handle_order(&open(2, "@1", dec!(1))).await;
        assert!(matches!(outcome, MirrorOutcome::Placed { .. }));
        assert_eq!(mirror.stats().metadata_failures, 1);
    }

    #[tokio::test]
    async fn test_placement_failure_leaves_order_unseen() {
        let execution = Arc::new(StubExecution::new(vec![
            Err(ExecutionError::OrderRejected("Order must have minimum value of $10.".into())),
            Ok(OrderPlacement::Resting { order_id: 77 }),
        ]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(1), false);

        let outcome = mirror.handle_order(&open(1, "@0", dec!(1))).await;
        assert!(matches!(outcome, MirrorOutcome::PlacementFailed(_)));
        assert_eq!(mirror.state_of(1), LeaderState::Unseen);

        // A duplicate open retries
        let outcome = mirror.handle_order(&open(1, "@0", dec!(1))).await;
        assert!(matches!(outcome, MirrorOutcome::Placed { follower_oid: 77, .. }));
        assert_eq!(execution.placed().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_state_suppresses_retries() {
        let execution = Arc::new(StubExecution::new(vec![Err(ExecutionError::OrderRejected(
            "insufficient balance".into(),
        ))]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(1), true);

        mirror.handle_order(&open(1, "@0", dec!(1))).await;
        assert_eq!(mirror.state_of(1), LeaderState::Failed);

        let outcome = mirror.handle_order(&open(1, "@0", dec!(1))).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::PreviouslyFailed));
        assert_eq!(execution.placed().await.len(), 1);

        // Leader cancel closes the failed entry
        mirror.handle_order(&canceled(1, "@0")).await;
        assert_eq!(mirror.state_of(1), LeaderState::Unseen);
    }

    #[tokio::test]
    async fn test_duplicate_open_does_not_double_place() {
        let execution = Arc::new(StubExecution::new(vec![
            Ok(OrderPlacement::Resting { order_id: 1 }),
            Ok(OrderPlacement::Resting { order_id: 2 }),
        ]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(1), false);

        mirror.handle_order(&open(1, "@0", dec!(1))).await;
        let outcome = mirror.handle_order(&open(1, "@0", dec!(1))).await;

        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::AlreadyMirrored));
        assert_eq!(execution.placed().await.len(), 1);
        assert_eq!(mirror.state_of(1), LeaderState::Mirrored(FollowerOrder::Resting(1)));
    }

    #[tokio::test]
    async fn test_filled_event_drops_mapping_without_cancel() {
        let execution = Arc::new(StubExecution::new(vec![Ok(OrderPlacement::Resting { order_id: 3 })]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(1), false);

        mirror.handle_order(&open(1, "@0", dec!(1))).await;
        let filled = event(1, "@0", OrderSide::Buy, dec!(1), LeaderOrderStatus::Filled);
        let outcome = mirror.handle_order(&filled).await;

        assert_eq!(outcome, MirrorOutcome::Unmapped);
        assert_eq!(mirror.state_of(1), LeaderState::Unseen);
        assert_eq!(mirror.stats().active_mappings, 0);
        assert!(execution.cancelled().await.is_empty());

        // A later cancel for the same id has nothing to cancel
        let outcome = mirror.handle_order(&canceled(1, "@0")).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::NotMapped));
        assert!(execution.cancelled().await.is_empty());

        // Unmapped fills are only observed
        let outcome = mirror.handle_order(&filled).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::Observed));
    }

    #[tokio::test]
    async fn test_non_positive_price_is_not_mirrored() {
        let execution = Arc::new(StubExecution::new(vec![Ok(OrderPlacement::Resting { order_id: 1 })]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(1), true);

        let outcome = mirror.handle_order(&open(1, "@0", dec!(0))).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::InvalidPrice));

        let outcome = mirror.handle_order(&open(2, "@0", dec!(-1.5))).await;
        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::InvalidPrice));

        assert!(execution.placed().await.is_empty());
        assert_eq!(mirror.state_of(1), LeaderState::Unseen);
        assert_eq!(mirror.state_of(2), LeaderState::Unseen);
        assert_eq!(mirror.stats().skipped, 2);
    }

    #[tokio::test]
    async fn test_size_overflow_is_not_mirrored() {
        let execution = Arc::new(StubExecution::new(vec![Ok(OrderPlacement::Resting { order_id: 1 })]));
        let mut snapshot = snapshot_with_pairs(1);
        snapshot.contexts[0].mid_px = Some(Decimal::new(1, 28));
        let mut mirror = mirror_with(execution.clone(), snapshot, false);

        let outcome = mirror.handle_order(&open(4, "@0", dec!(1))).await;

        assert_eq!(outcome, MirrorOutcome::Skipped(SkipReason::SizeOverflow));
        assert!(execution.placed().await.is_empty());
        assert_eq!(mirror.state_of(4), LeaderState::Unseen);
    }

    #[tokio::test]
    async fn test_handle_event_processes_batch_in_order() {
        let execution = Arc::new(StubExecution::new(vec![Ok(OrderPlacement::Resting { order_id: 50 })]));
        let mut mirror = mirror_with(execution.clone(), snapshot_with_pairs(1), false);

        mirror
            .handle_event(StreamEvent::OrderUpdates(vec![open(1, "@0", dec!(1)), canceled(1, "@0")]))
            .await;
        mirror
            .handle_event(StreamEvent::Fills(vec![
                Fill {
                    market: "@0".to_string(),
                    side: OrderSide::Sell,
                    size: dec!(1),
                    price: dec!(1),
                    fee: dec!(0.001),
                    closed_pnl: Decimal::ZERO,
                },
                Fill {
                    market: "ETH".to_string(),
                    side: OrderSide::Buy,
                    size: dec!(1),
                    price: dec!(3000),
                    fee: dec!(0.3),
                    closed_pnl: Decimal::ZERO,
                },
            ]))
            .await;

        assert_eq!(execution.cancelled().await.len(), 1);
        let stats = mirror.stats();
        assert_eq!(stats.mirrored, 1);
        assert_eq!(stats.cancels_sent, 1);
        assert_eq!(stats.leader_fills, 1);
        assert_eq!(stats.active_mappings, 0);
    }
}
