//! Asset metadata resolver: spot market identifier -> reference price and size precision.
//!
//! Holds one cached snapshot of the spot universe and market contexts. The
//! snapshot is fetched lazily and refetched once it is older than the
//! configured max age (or never, when no max age is set).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{SpotAssetCtx, SpotMeta};
use crate::models::{spot_index, AssetMetadata, SpotMarket};

/// Size precision used when the base token cannot be found.
pub const DEFAULT_SIZE_PRECISION: u32 = 6;

/// Reasons a market cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("metadata unavailable: {0}")]
    Unavailable(String),

    #[error("unknown spot asset: {0}")]
    UnknownAsset(String),

    #[error("no positive price available for {0}")]
    NoPriceAvailable(String),

    #[error("spot index {index} out of range ({len} contexts)")]
    IndexOutOfRange { index: u32, len: usize },
}

/// Spot universe plus per-pair contexts, fetched together.
#[derive(Debug, Clone, Default)]
pub struct SpotSnapshot {
    pub meta: SpotMeta,
    pub contexts: Vec<SpotAssetCtx>,
}

impl SpotSnapshot {
    /// Resolve a market identifier against this snapshot.
    pub fn lookup(&self, market: &str) -> Result<AssetMetadata, MetadataError> {
        if let Some(index) = spot_index(market) {
            return self.lookup_index(market, index);
        }

        if market.contains('/') {
            let pair = self
                .meta
                .universe
                .iter()
                .find(|p| p.name == market)
                .ok_or_else(|| MetadataError::UnknownAsset(market.to_string()))?;
            return self.lookup_index(market, pair.index);
        }

        Err(MetadataError::UnknownAsset(market.to_string()))
    }

    fn lookup_index(&self, name: &str, index: u32) -> Result<AssetMetadata, MetadataError> {
        let ctx = self
            .contexts
            .get(index as usize)
            .ok_or(MetadataError::IndexOutOfRange {
                index,
                len: self.contexts.len(),
            })?;

        let reference_price = ctx
            .mid_px
            .or(ctx.mark_px)
            .filter(|px| *px > Decimal::ZERO)
            .ok_or_else(|| MetadataError::NoPriceAvailable(name.to_string()))?;

        Ok(AssetMetadata {
            market: SpotMarket {
                name: name.to_string(),
                index,
            },
            reference_price,
            size_precision: self.size_precision(index),
        })
    }

    /// Size decimals of the pair's base token.
    fn size_precision(&self, index: u32) -> u32 {
        self.meta
            .universe
            .iter()
            .find(|p| p.index == index)
            .and_then(|pair| pair.tokens.first())
            .and_then(|base| self.meta.tokens.iter().find(|t| t.index == *base))
            .map(|token| token.sz_decimals)
            .unwrap_or(DEFAULT_SIZE_PRECISION)
    }
}

/// Source of spot snapshots (the info endpoint in production).
#[async_trait]
pub trait SpotMetadataSource: Send + Sync {
    async fn fetch_spot_snapshot(&self) -> anyhow::Result<SpotSnapshot>;
}

struct CachedSnapshot {
    snapshot: SpotSnapshot,
    fetched_at: Instant,
}

/// Resolves spot markets with a process-lifetime snapshot cache.
pub struct MetadataResolver {
    source: Arc<dyn SpotMetadataSource>,
    max_age: Option<Duration>,
    cache: Option<CachedSnapshot>,
}

impl MetadataResolver {
    /// Create a resolver. `max_age = None` keeps the first snapshot forever.
    pub fn new(source: Arc<dyn SpotMetadataSource>, max_age: Option<Duration>) -> Self {
        Self {
            source,
            max_age,
            cache: None,
        }
    }

    /// Resolve a market to its reference price and size precision.
    pub async fn resolve(&mut self, market: &str) -> Result<AssetMetadata, MetadataError> {
        let snapshot = self.snapshot().await?;
        let metadata = snapshot.lookup(market)?;

        debug!(
            market = %market,
            index = metadata.market.index,
            price = %metadata.reference_price,
            size_precision = metadata.size_precision,
            "Resolved spot metadata"
        );

        Ok(metadata)
    }

    /// Force a refetch of the snapshot.
    pub async fn refresh(&mut self) -> Result<(), MetadataError> {
        let snapshot = self
            .source
            .fetch_spot_snapshot()
            .await
            .map_err(|e| MetadataError::Unavailable(format!("{:#}", e)))?;

        info!(pairs = snapshot.meta.universe.len(), "Loaded spot metadata");

        self.cache = Some(CachedSnapshot {
            snapshot,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    fn is_stale(&self) -> bool {
        match (&self.cache, self.max_age) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(cached), Some(max_age)) => cached.fetched_at.elapsed() >= max_age,
        }
    }

    async fn snapshot(&mut self) -> Result<&SpotSnapshot, MetadataError> {
        if self.is_stale() {
            self.refresh().await?;
        }
        self.cache
            .as_ref()
            .map(|cached| &cached.snapshot)
            .ok_or_else(|| MetadataError::Unavailable("snapshot not loaded".to_string()))
    }
}
