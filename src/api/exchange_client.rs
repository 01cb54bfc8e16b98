//! Hyperliquid exchange client for follower order execution.
//!
//! Every exchange action is signed as an L1 action:
//! - the action is msgpack-encoded, followed by the nonce and a vault flag,
//!   and hashed into a `connectionId`
//! - the `connectionId` is wrapped in an EIP-712 `Agent` struct under the
//!   `Exchange` domain and signed with the follower's key

use alloy_primitives::{keccak256, Address, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::SpotMarket;
use crate::trading::{
    ExecutionAdapter, ExecutionError, MirrorOrderRequest, OrderPlacement,
};

use super::types::*;

/// Spot asset ids are offset from the spot universe index.
pub const SPOT_ASSET_OFFSET: u32 = 10_000;

/// Chain id of the `Exchange` signing domain (same on mainnet and testnet).
const SIGNING_CHAIN_ID: u64 = 1337;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Exchange API client executing follower orders.
pub struct ExchangeClient {
    http: Client,
    signer: PrivateKeySigner,
    exchange_url: String,
    is_mainnet: bool,
}

impl ExchangeClient {
    /// Create a new exchange client.
    ///
    /// # Arguments
    /// * `private_key` - Follower private key (hex string, with or without 0x prefix)
    /// * `exchange_url` - Full `/exchange` endpoint URL
    /// * `is_mainnet` - Selects the `Agent` source tag used in signatures
    pub fn new(private_key: &str, exchange_url: impl Into<String>, is_mainnet: bool) -> Result<Self> {
        let pk = private_key.strip_prefix("0x").unwrap_or(private_key);
        let signer = PrivateKeySigner::from_str(pk).context("Invalid private key")?;

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            signer,
            exchange_url: exchange_url.into(),
            is_mainnet,
        })
    }

    /// Create from `HYPERLIQUID_PRIVATE_KEY`.
    pub fn from_env(exchange_url: impl Into<String>, is_mainnet: bool) -> Result<Self> {
        let private_key = std::env::var("HYPERLIQUID_PRIVATE_KEY")
            .context("HYPERLIQUID_PRIVATE_KEY not set")?;
        Self::new(&private_key, exchange_url, is_mainnet)
    }

    /// Follower wallet address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Build the `order` action for a single GTC limit order.
    fn build_order_action(request: &MirrorOrderRequest) -> OrderAction {
        OrderAction {
            kind: "order",
            orders: vec![OrderWire {
                a: Self::asset_id(&request.market),
                b: request.side.is_buy(),
                p: Self::decimal_to_wire(request.limit_price),
                s: Self::decimal_to_wire(request.size),
                r: false,
                t: OrderTypeWire {
                    limit: LimitWire {
                        tif: request.time_in_force.as_wire(),
                    },
                },
                c: Some(Self::generate_cloid()),
            }],
            grouping: "na",
        }
    }

    fn build_cancel_action(order_id: u64, market: &SpotMarket) -> CancelAction {
        CancelAction {
            kind: "cancel",
            cancels: vec![CancelWire {
                a: Self::asset_id(market),
                o: order_id,
            }],
        }
    }

    /// Sign an action and post it to the exchange endpoint.
    async fn post_action<A: Serialize>(&self, action: &A) -> Result<ExchangeResponse> {
        let nonce = Utc::now().timestamp_millis() as u64;
        let signature = self.sign_l1_action(action, nonce).await?;

        let request = ExchangeRequest {
            action,
            nonce,
            signature,
            vault_address: None,
        };

        debug!(url = %self.exchange_url, nonce, "Posting exchange action");

        let resp = self
            .http
            .post(&self.exchange_url)
            .json(&request)
            .send()
            .await
            .context("Failed to send exchange request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Exchange request failed: {} - {}", status, text));
        }

        resp.json().await.context("Failed to parse exchange response")
    }

    /// Sign an L1 action, returning the signature in wire form.
    async fn sign_l1_action<A: Serialize>(&self, action: &A, nonce: u64) -> Result<SignatureWire> {
        let connection_id = Self::compute_connection_id(action, nonce)?;
        let struct_hash = Self::compute_agent_hash(self.source(), &connection_id);
        let domain_hash = Self::compute_domain_separator();

        // keccak256("\x19\x01" + domainSeparator + structHash)
        let mut message = vec![0x19, 0x01];
        message.extend_from_slice(&domain_hash);
        message.extend_from_slice(&struct_hash);

        let final_hash = keccak256(&message);

        let signature = self
            .signer
            .sign_hash(&final_hash)
            .await
            .context("Failed to sign action")?;

        let bytes = signature.as_bytes();
        Ok(SignatureWire {
            r: format!("0x{}", hex::encode(&bytes[..32])),
            s: format!("0x{}", hex::encode(&bytes[32..64])),
            v: bytes[64],
        })
    }

    fn source(&self) -> &'static str {
        if self.is_mainnet {
            "a"
        } else {
            "b"
        }
    }

    /// keccak256(msgpack(action) ++ nonce_be ++ 0x00), the last byte marking "no vault".
    fn compute_connection_id<A: Serialize>(action: &A, nonce: u64) -> Result<[u8; 32]> {
        let mut data = rmp_serde::to_vec_named(action).context("Failed to encode action")?;
        data.extend_from_slice(&nonce.to_be_bytes());
        data.push(0x00);
        Ok(keccak256(&data).0)
    }

    /// EIP-712 struct hash of `Agent(string source,bytes32 connectionId)`.
    fn compute_agent_hash(source: &str, connection_id: &[u8; 32]) -> [u8; 32] {
        let type_hash = keccak256(b"Agent(string source,bytes32 connectionId)");
        let source_hash = keccak256(source.as_bytes());

        let mut encoded = Vec::with_capacity(96);
        encoded.extend_from_slice(type_hash.as_slice());
        encoded.extend_from_slice(source_hash.as_slice());
        encoded.extend_from_slice(connection_id);

        keccak256(&encoded).0
    }

    /// Compute the EIP-712 domain separator.
    fn compute_domain_separator() -> [u8; 32] {
        let type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );
        let name_hash = keccak256(b"Exchange");
        let version_hash = keccak256(b"1");

        let mut encoded = Vec::with_capacity(160);
        encoded.extend_from_slice(type_hash.as_slice());
        encoded.extend_from_slice(name_hash.as_slice());
        encoded.extend_from_slice(version_hash.as_slice());
        encoded.extend_from_slice(&Self::encode_uint256(SIGNING_CHAIN_ID));
        encoded.extend_from_slice(&Self::encode_address(Address::ZERO));

        keccak256(&encoded).0
    }

    fn asset_id(market: &SpotMarket) -> u32 {
        SPOT_ASSET_OFFSET + market.index
    }

    /// Decimal in the venue's wire form: no trailing zeros, no exponent.
    fn decimal_to_wire(value: Decimal) -> String {
        value.normalize().to_string()
    }

    /// Encode address to 32-byte padded format.
    fn encode_address(addr: Address) -> [u8; 32] {
        let mut buf = [0u8; 32];
        buf[12..].copy_from_slice(addr.as_slice());
        buf
    }

    fn encode_uint256(value: u64) -> [u8; 32] {
        U256::from(value).to_be_bytes()
    }

    /// Random 128-bit client order id.
    fn generate_cloid() -> String {
        format!("0x{:032x}", uuid::Uuid::new_v4().as_u128())
    }
}

/// Map the first per-order status to a placement result.
fn placement_from_response(resp: &ExchangeResponse) -> Result<OrderPlacement, ExecutionError> {
    if let Some(msg) = resp.error_message() {
        return Err(ExecutionError::OrderRejected(msg.to_string()));
    }

    match resp.first_status() {
        Some(ActionStatus::Resting { resting }) => Ok(OrderPlacement::Resting {
            order_id: resting.oid,
        }),
        Some(ActionStatus::Filled { filled }) => {
            info!(
                oid = filled.oid,
                total_sz = %filled.total_sz,
                avg_px = %filled.avg_px,
                "Follower order filled on placement"
            );
            Ok(OrderPlacement::ImmediateFill)
        }
        Some(ActionStatus::Error { error }) => Err(ExecutionError::OrderRejected(error.clone())),
        Some(ActionStatus::Text(text)) => Err(ExecutionError::OrderRejected(format!(
            "unexpected status: {}",
            text
        ))),
        None => Err(ExecutionError::OrderRejected(
            "response carried no order status".to_string(),
        )),
    }
}

fn cancel_succeeded(resp: &ExchangeResponse) -> bool {
    resp.status == "ok" && matches!(resp.first_status(), Some(ActionStatus::Text(s)) if s == "success")
}

#[async_trait]
impl ExecutionAdapter for ExchangeClient {
    async fn place_order(
        &self,
        request: &MirrorOrderRequest,
    ) -> Result<OrderPlacement, ExecutionError> {
        let action = Self::build_order_action(request);
        let resp = self
            .post_action(&action)
            .await
            .map_err(|e| ExecutionError::Transport(format!("{:#}", e)))?;
        placement_from_response(&resp)
    }

    async fn cancel_order(&self, order_id: u64, market: &SpotMarket) -> bool {
        let action = Self::build_cancel_action(order_id, market);
        match self.post_action(&action).await {
            Ok(resp) => {
                let ok = cancel_succeeded(&resp);
                if !ok {
                    warn!(order_id, market = %market.name, response = ?resp.response, "Cancel rejected");
                }
                ok
            }
            Err(e) => {
                warn!(order_id, market = %market.name, error = %format!("{:#}", e), "Cancel request failed");
                false
            }
        }
    }
}
