//! Decoded stream events, produced once at the transport boundary.

use super::order::{Fill, LeaderOrderEvent};

/// One inbound stream message after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Batch from the order-lifecycle channel, in venue order
    OrderUpdates(Vec<LeaderOrderEvent>),

    /// Fills from the user-events channel (possibly empty)
    Fills(Vec<Fill>),

    /// Subscription acknowledgement, carrying the subscription type if present
    SubscriptionAck(Option<String>),

    /// Reply to a keepalive ping
    Pong,

    /// A channel this client does not handle
    Unrecognized(String),
}
