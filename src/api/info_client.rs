//! Hyperliquid info API client for spot metadata and market contexts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::trading::{SpotMetadataSource, SpotSnapshot};

use super::types::*;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the info endpoint (read-only operations).
pub struct InfoClient {
    client: Client,
    info_url: String,
}

impl InfoClient {
    /// Create a new info client for the given `/info` URL.
    pub fn new(info_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            info_url: info_url.into(),
        })
    }

    async fn post_info<T: DeserializeOwned>(&self, request_type: &'static str) -> Result<T> {
        debug!(url = %self.info_url, request_type, "Posting info request");

        let response = self
            .client
            .post(&self.info_url)
            .json(&InfoRequest { request_type })
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", request_type))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} request failed: {} - {}", request_type, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", request_type))
    }

    /// Fetch the spot universe together with per-pair market contexts.
    pub async fn spot_meta_and_asset_ctxs(&self) -> Result<SpotMetaAndAssetCtxs> {
        self.post_info("spotMetaAndAssetCtxs").await
    }
}

#[async_trait]
impl SpotMetadataSource for InfoClient {
    async fn fetch_spot_snapshot(&self) -> Result<SpotSnapshot> {
        let SpotMetaAndAssetCtxs(meta, contexts) = self.spot_meta_and_asset_ctxs().await?;
        debug!(
            pairs = meta.universe.len(),
            tokens = meta.tokens.len(),
            contexts = contexts.len(),
            "Fetched spot snapshot"
        );
        Ok(SpotSnapshot { meta, contexts })
    }
}
