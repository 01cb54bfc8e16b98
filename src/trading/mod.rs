//! Trading logic: metadata resolution, order mirroring, execution seam.

mod config;
mod execution;
mod order_mirror;
pub(crate) mod resolver;

pub use config::MirrorConfig;
pub use execution::{
    ExecutionAdapter, ExecutionError, MirrorOrderRequest, OrderPlacement, PaperExecution,
    TimeInForce,
};
pub use order_mirror::{MirrorStats, OrderMirror};
pub use resolver::{MetadataResolver, SpotMetadataSource, SpotSnapshot};
