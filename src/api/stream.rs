//! Hyperliquid websocket client for the leader's order and fill channels.
//!
//! One connection carries two subscriptions for the leader address:
//! `orderUpdates` (order lifecycle) and `userEvents` (fills). A background task
//! sends `{"method":"ping"}` on a fixed interval; the venue answers on the
//! `pong` channel. Inbound frames are decoded into [`StreamEvent`]s here and
//! nowhere else.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::Message, Error as WsError},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::models::{Fill, LeaderOrderEvent, LeaderOrderStatus, StreamEvent};

use super::types::*;

/// Order lifecycle channel.
pub const ORDER_UPDATES_CHANNEL: &str = "orderUpdates";
/// User events channel (fills).
pub const USER_EVENTS_CHANNEL: &str = "userEvents";
const SUBSCRIPTION_RESPONSE_CHANNEL: &str = "subscriptionResponse";
const PONG_CHANNEL: &str = "pong";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Errors that can occur on the leader stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("WebSocket connection failed: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Connection timeout")]
    Timeout,
}

/// Configuration for the leader stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Websocket endpoint URL
    pub ws_url: String,
    /// Leader address to subscribe for
    pub leader: String,
    /// Interval between keepalive pings
    pub keepalive_interval: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
}

/// Connects to the venue stream for a single leader.
pub struct LeaderStream {
    config: StreamConfig,
}

impl LeaderStream {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Open the websocket, subscribe to both channels and start the keepalive.
    pub async fn connect(&self) -> Result<LeaderConnection, StreamError> {
        info!(url = %self.config.ws_url, leader = %self.config.leader, "Connecting to leader stream");

        let connect_result = timeout(self.config.connect_timeout, connect_async(&self.config.ws_url)).await;

        let ws_stream = match connect_result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(StreamError::Connection(e.to_string())),
            Err(_) => return Err(StreamError::Timeout),
        };

        let (write, read) = ws_stream.split();
        let write = Arc::new(Mutex::new(write));

        for channel in [ORDER_UPDATES_CHANNEL, USER_EVENTS_CHANNEL] {
            let msg = subscription_message("subscribe", channel, &self.config.leader)?;
            write.lock().await.send(Message::Text(msg)).await?;
            info!(channel, leader = %self.config.leader, "Subscribed");
        }

        let keepalive = tokio::spawn(keepalive_loop(write.clone(), self.config.keepalive_interval));

        Ok(LeaderConnection {
            leader: self.config.leader.clone(),
            write,
            read,
            keepalive,
        })
    }
}

/// An open, subscribed stream connection.
pub struct LeaderConnection {
    leader: String,
    write: Arc<Mutex<WsSink>>,
    read: SplitStream<WsStream>,
    keepalive: JoinHandle<()>,
}

impl LeaderConnection {
    /// Next decoded event, or `None` once the connection is closed.
    ///
    /// Malformed frames are logged and skipped.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => match decode_message(&text) {
                    Ok(event) => return Some(event),
                    Err(e) => {
                        warn!(error = %e, frame = %truncate(&text, 200), "Skipping malformed stream message");
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    debug!("Received ping, sending pong");
                    if let Err(e) = self.write.lock().await.send(Message::Pong(data)).await {
                        warn!(error = %e, "Failed to answer ping");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Stream closed by server");
                    return None;
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!(len = data.len(), "Skipping binary stream message");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Stream read error");
                    return None;
                }
                None => {
                    info!("Stream ended");
                    return None;
                }
            }
        }
    }

    /// Unsubscribe both channels and close the socket.
    pub async fn close(self) {
        self.keepalive.abort();

        let mut write = self.write.lock().await;
        for channel in [ORDER_UPDATES_CHANNEL, USER_EVENTS_CHANNEL] {
            match subscription_message("unsubscribe", channel, &self.leader) {
                Ok(msg) => {
                    if let Err(e) = write.send(Message::Text(msg)).await {
                        debug!(channel, error = %e, "Unsubscribe failed");
                    }
                }
                Err(e) => debug!(channel, error = %e, "Failed to encode unsubscribe"),
            }
        }
        if let Err(e) = write.close().await {
            debug!(error = %e, "Error closing stream");
        }
        info!("Stream connection closed");
    }
}

impl Drop for LeaderConnection {
    fn drop(&mut self) {
        self.keepalive.abort();
    }
}

async fn keepalive_loop(write: Arc<Mutex<WsSink>>, period: Duration) {
    let ping = match serde_json::to_string(&PingRequest { method: "ping" }) {
        Ok(ping) => ping,
        Err(e) => {
            warn!(error = %e, "Failed to encode keepalive");
            return;
        }
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        debug!("Sending keepalive ping");
        if let Err(e) = write.lock().await.send(Message::Text(ping.clone())).await {
            // Read side observes the disconnect
            warn!(error = %e, "Failed to send keepalive ping");
        }
    }
}

fn subscription_message(method: &'static str, channel: &str, leader: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string(&SubscriptionRequest {
        method,
        subscription: Subscription {
            kind: channel,
            user: leader,
        },
    })
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Decode one inbound text frame.
///
/// Unknown channels decode to [`StreamEvent::Unrecognized`]; only frames that
/// are not JSON, or whose payload does not match its channel, are errors.
pub fn decode_message(text: &str) -> Result<StreamEvent, serde_json::Error> {
    let envelope: WsEnvelope = serde_json::from_str(text)?;

    let event = match envelope.channel.as_str() {
        ORDER_UPDATES_CHANNEL => {
            let updates: Vec<WsOrderUpdate> = serde_json::from_value(envelope.data)?;
            StreamEvent::OrderUpdates(updates.into_iter().map(to_leader_event).collect())
        }
        USER_EVENTS_CHANNEL => {
            let user_event: WsUserEvent = serde_json::from_value(envelope.data)?;
            StreamEvent::Fills(user_event.fills.into_iter().map(to_fill).collect())
        }
        SUBSCRIPTION_RESPONSE_CHANNEL => {
            let ack: WsSubscriptionAck = serde_json::from_value(envelope.data)?;
            StreamEvent::SubscriptionAck(ack.subscription.map(|s| s.kind))
        }
        PONG_CHANNEL => StreamEvent::Pong,
        other => StreamEvent::Unrecognized(other.to_string()),
    };

    Ok(event)
}

fn to_leader_event(update: WsOrderUpdate) -> LeaderOrderEvent {
    let millis = if update.status_timestamp > 0 {
        update.status_timestamp
    } else {
        update.order.timestamp
    };

    LeaderOrderEvent {
        market: update.order.coin,
        side: update.order.side,
        size: update.order.sz,
        limit_price: update.order.limit_px,
        leader_oid: update.order.oid,
        status: LeaderOrderStatus::from_wire(&update.status),
        timestamp: millis_to_datetime(millis),
    }
}

fn to_fill(fill: WsFill) -> Fill {
    Fill {
        market: fill.coin,
        side: fill.side,
        size: fill.sz,
        price: fill.px,
        fee: fill.fee,
        closed_pnl: fill.closed_pnl,
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
}
