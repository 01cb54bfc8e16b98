//! Wire types for the Hyperliquid info, exchange, and streaming APIs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::OrderSide;

// ---------------------------------------------------------------------------
// Info API
// ---------------------------------------------------------------------------

/// Request body for `POST /info`.
#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest {
    #[serde(rename = "type")]
    pub request_type: &'static str,
}

/// Spot token entry from `spotMeta.tokens`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotToken {
    pub sz_decimals: u32,
    #[serde(default)]
    pub index: u32,
}

/// Spot pair entry from `spotMeta.universe`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotPair {
    pub name: String,
    /// Token indices as `[base, quote]`
    pub tokens: Vec<u32>,
    pub index: u32,
}

/// Response of `{"type": "spotMeta"}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotMeta {
    #[serde(default)]
    pub tokens: Vec<SpotToken>,
    #[serde(default)]
    pub universe: Vec<SpotPair>,
}

/// Per-pair market context, ordered like the spot universe.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotAssetCtx {
    #[serde(default)]
    pub mid_px: Option<Decimal>,
    #[serde(default)]
    pub mark_px: Option<Decimal>,
}

/// Response of `{"type": "spotMetaAndAssetCtxs"}`: a two-element array.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotMetaAndAssetCtxs(pub SpotMeta, pub Vec<SpotAssetCtx>);

// ---------------------------------------------------------------------------
// Streaming API
// ---------------------------------------------------------------------------

/// Inbound envelope; `data` is decoded according to `channel`.
#[derive(Debug, Clone, Deserialize)]
pub struct WsEnvelope {
    pub channel: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Item of the `orderUpdates` channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsOrderUpdate {
    pub order: WsBasicOrder,
    pub status: String,
    #[serde(default)]
    pub status_timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsBasicOrder {
    pub coin: String,
    pub side: OrderSide,
    pub limit_px: Decimal,
    pub sz: Decimal,
    pub oid: u64,
    #[serde(default)]
    pub timestamp: i64,
}

/// Payload of the `userEvents` channel. Only fills are of interest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsUserEvent {
    #[serde(default)]
    pub fills: Vec<WsFill>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsFill {
    pub coin: String,
    pub px: Decimal,
    pub sz: Decimal,
    pub side: OrderSide,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub closed_pnl: Decimal,
}

/// Payload of the `subscriptionResponse` channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsSubscriptionAck {
    #[serde(default)]
    pub subscription: Option<WsSubscriptionRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsSubscriptionRef {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Outbound subscribe / unsubscribe request.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest<'a> {
    pub method: &'static str,
    pub subscription: Subscription<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub user: &'a str,
}

/// Application-level keepalive ping.
#[derive(Debug, Clone, Serialize)]
pub struct PingRequest {
    pub method: &'static str,
}

// ---------------------------------------------------------------------------
// Exchange API
// ---------------------------------------------------------------------------

/// `order` action. Field order matters: the action is msgpack-hashed for signing.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub orders: Vec<OrderWire>,
    pub grouping: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWire {
    /// Asset id (`10000 + spot index` for spot)
    pub a: u32,
    /// Is buy
    pub b: bool,
    /// Limit price
    pub p: String,
    /// Size
    pub s: String,
    /// Reduce only
    pub r: bool,
    /// Order type
    pub t: OrderTypeWire,
    /// Client order id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderTypeWire {
    pub limit: LimitWire,
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitWire {
    pub tif: &'static str,
}

/// `cancel` action.
#[derive(Debug, Clone, Serialize)]
pub struct CancelAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub cancels: Vec<CancelWire>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelWire {
    pub a: u32,
    pub o: u64,
}

/// ECDSA signature in the form the exchange endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureWire {
    pub r: String,
    pub s: String,
    pub v: u8,
}

/// Body of `POST /exchange`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest<'a, A: Serialize> {
    pub action: &'a A,
    pub nonce: u64,
    pub signature: SignatureWire,
    pub vault_address: Option<String>,
}

/// Response of `POST /exchange`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    pub status: String,
    pub response: ExchangeResponseBody,
}

/// Either an error message or structured action results.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExchangeResponseBody {
    Message(String),
    Data(ExchangeResponseData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponseData {
    #[serde(default)]
    pub data: Option<ActionStatuses>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionStatuses {
    #[serde(default)]
    pub statuses: Vec<ActionStatus>,
}

/// Per-order result within an exchange response.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ActionStatus {
    Resting { resting: RestingOrder },
    Filled { filled: FilledOrder },
    Error { error: String },
    /// Plain string statuses such as `"success"` for cancels
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestingOrder {
    pub oid: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilledOrder {
    pub oid: u64,
    #[serde(default)]
    pub total_sz: Decimal,
    #[serde(default)]
    pub avg_px: Decimal,
}

impl ExchangeResponse {
    /// First per-order status, if the response carries any.
    pub fn first_status(&self) -> Option<&ActionStatus> {
        match &self.response {
            ExchangeResponseBody::Data(data) => data.data.as_ref()?.statuses.first(),
            ExchangeResponseBody::Message(_) => None,
        }
    }

    /// Top-level error message for `status: "err"` responses.
    pub fn error_message(&self) -> Option<&str> {
        match &self.response {
            ExchangeResponseBody::Message(msg) if self.status != "ok" => Some(msg),
            _ => None,
        }
    }
}
