//! Bot runner: stream connection lifecycle around the order mirror.
//!
//! Handles:
//! - Connecting to the leader stream with exponential backoff
//! - Feeding decoded events to the order mirror one at a time
//! - Reconnecting when the stream drops
//! - Graceful shutdown on Ctrl-C (follower orders are left in place)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backoff::{future::retry_notify, ExponentialBackoff, ExponentialBackoffBuilder};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{Endpoints, LeaderConnection, LeaderStream, StreamConfig, StreamError};
use crate::models::{MarketKind, StreamEvent};
use crate::trading::{
    ExecutionAdapter, MetadataResolver, MirrorConfig, MirrorStats, OrderMirror,
    SpotMetadataSource,
};

/// Main bot runner.
pub struct MirrorBot {
    config: MirrorConfig,
    stream: LeaderStream,
    mirror: OrderMirror,

    // Shutdown signal
    shutdown: Arc<watch::Sender<bool>>,
}

impl MirrorBot {
    /// Create a new bot instance.
    pub fn new(
        config: MirrorConfig,
        endpoints: &Endpoints,
        execution: Arc<dyn ExecutionAdapter>,
        metadata: Arc<dyn SpotMetadataSource>,
    ) -> Result<Self> {
        config.validate()?;

        let stream = LeaderStream::new(stream_config(&config, endpoints));
        let resolver = MetadataResolver::new(metadata, config.metadata_max_age);
        let mirror = OrderMirror::new(
            execution,
            resolver,
            config.fixed_notional,
            config.suppress_failed_retries,
        );
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            stream,
            mirror,
            shutdown: Arc::new(shutdown),
        })
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<watch::Sender<bool>> {
        self.shutdown.clone()
    }

    /// Main run loop. Returns once shutdown is signalled.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            leader = %self.config.leader_address,
            notional = %self.config.fixed_notional,
            dry_run = self.config.dry_run,
            "Starting order mirror"
        );

        // Register shutdown handler
        let signal = self.shutdown_signal();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            signal.send_replace(true);
        });

        let mut shutdown = self.shutdown.subscribe();

        while !*shutdown.borrow() {
            let connection = tokio::select! {
                _ = shutdown.changed() => break,
                connection = connect_with_backoff(&self.stream, &self.config) => connection?,
            };

            if self.consume(connection, &mut shutdown).await {
                break;
            }
            warn!("Leader stream disconnected, reconnecting");
        }

        info!("Order mirror stopped");
        Ok(())
    }

    /// Feed events to the mirror until the stream ends (`false`) or shutdown (`true`).
    async fn consume(
        &mut self,
        mut connection: LeaderConnection,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        loop {
            let next = tokio::select! {
                _ = shutdown.changed() => None,
                event = connection.next_event() => Some(event),
            };

            match next {
                // Handled outside the select so an in-flight event always completes
                Some(Some(event)) => self.mirror.handle_event(event).await,
                Some(None) => return false,
                None => {
                    connection.close().await;
                    return true;
                }
            }
        }
    }

    /// Get current stats.
    pub fn stats(&self) -> MirrorStats {
        self.mirror.stats()
    }
}

/// Stream settings derived from the mirror configuration.
pub fn stream_config(config: &MirrorConfig, endpoints: &Endpoints) -> StreamConfig {
    StreamConfig {
        ws_url: endpoints.websocket.clone(),
        leader: config.leader_address.clone(),
        keepalive_interval: config.keepalive_interval,
        connect_timeout: config.connect_timeout,
    }
}

fn reconnect_backoff(config: &MirrorConfig) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(config.reconnect_initial_delay)
        .with_max_interval(config.reconnect_max_delay)
        .with_max_elapsed_time(None)
        .build()
}

/// Connect and subscribe, retrying until it succeeds.
async fn connect_with_backoff(stream: &LeaderStream, config: &MirrorConfig) -> Result<LeaderConnection> {
    let connection = retry_notify(
        reconnect_backoff(config),
        || async move { stream.connect().await.map_err(backoff::Error::transient) },
        |e: StreamError, delay: Duration| {
            warn!(error = %e, retry_in = ?delay, "Stream connection failed");
        },
    )
    .await?;
    Ok(connection)
}

/// Log the leader's order updates and fills without mirroring anything.
pub async fn watch_leader(config: &MirrorConfig, endpoints: &Endpoints) -> Result<()> {
    let stream = LeaderStream::new(stream_config(config, endpoints));

    loop {
        let mut connection = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            connection = connect_with_backoff(&stream, config) => connection?,
        };

        loop {
            let next = tokio::select! {
                _ = tokio::signal::ctrl_c() => None,
                event = connection.next_event() => Some(event),
            };

            match next {
                Some(Some(event)) => log_event(&event),
                Some(None) => break,
                None => {
                    connection.close().await;
                    return Ok(());
                }
            }
        }
        warn!("Leader stream disconnected, reconnecting");
    }
}

fn log_event(event: &StreamEvent) {
    match event {
        StreamEvent::OrderUpdates(updates) => {
            for update in updates {
                info!(
                    kind = %MarketKind::classify(&update.market),
                    status = update.status.as_str(),
                    side = %update.side,
                    size = %update.size,
                    market = %update.market,
                    price = %update.limit_price,
                    leader_oid = update.leader_oid,
                    "Leader order"
                );
            }
        }
        StreamEvent::Fills(fills) => {
            for fill in fills {
                info!(
                    kind = %MarketKind::classify(&fill.market),
                    side = %fill.side,
                    size = %fill.size,
                    market = %fill.market,
                    price = %fill.price,
                    notional = %fill.notional(),
                    "Leader fill"
                );
            }
        }
        other => debug!(event = ?other, "Stream event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::resolver::tests::{snapshot_with_pairs, StubMetadata};
    use crate::trading::PaperExecution;
    use backoff::backoff::Backoff;

    fn config() -> MirrorConfig {
        MirrorConfig {
            leader_address: "0xleader".to_string(),
            reconnect_initial_delay: Duration::from_millis(100),
            reconnect_max_delay: Duration::from_secs(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_stream_config_from_mirror_config() {
        let endpoints = Endpoints::new(true);
        let stream = stream_config(&config(), &endpoints);
        assert_eq!(stream.ws_url, "wss://api.hyperliquid-testnet.xyz/ws");
        assert_eq!(stream.leader, "0xleader");
        assert_eq!(stream.keepalive_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_reconnect_backoff_is_bounded_and_unlimited() {
        let mut backoff = reconnect_backoff(&config());
        for _ in 0..50 {
            let delay = backoff.next_backoff();
            assert!(matches!(delay, Some(d) if d <= Duration::from_secs(3)));
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = MirrorBot::new(
            MirrorConfig::default(),
            &Endpoints::new(false),
            Arc::new(PaperExecution::new()),
            Arc::new(StubMetadata::new(snapshot_with_pairs(1))),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_returns_after_shutdown() {
        let mut bot = MirrorBot::new(
            config(),
            &Endpoints::from_base("http://127.0.0.1:1"),
            Arc::new(PaperExecution::new()),
            Arc::new(StubMetadata::new(snapshot_with_pairs(1))),
        )
        .unwrap();

        bot.shutdown_signal().send_replace(true);
        tokio_test::assert_ok!(bot.run().await);
        assert_eq!(bot.stats().events, 0);
    }
}
