//! Data models for leader orders, fills, stream events, and spot market metadata.

mod event;
mod market;
mod order;

pub use event::StreamEvent;
pub use market::{is_eligible_for_mirroring, spot_index, AssetMetadata, MarketKind, SpotMarket};
pub use order::{Fill, LeaderOrderEvent, LeaderOrderStatus, OrderSide};
