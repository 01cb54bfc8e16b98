//! Market identifiers: spot/derivative classification and resolved spot metadata.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Prefix marking an index-form spot identifier (`@107`).
const INDEX_MARKER: char = '@';

/// Separator between base and quote in a pair-form spot identifier (`PURR/USDC`).
const PAIR_SEPARATOR: char = '/';

/// Kind of market an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketKind {
    Spot,
    Derivative,
}

impl MarketKind {
    /// Classify a market identifier.
    ///
    /// Index-form (`@N`) and pair-form (`BASE/QUOTE`) identifiers are spot;
    /// bare symbols (`BTC`) and anything unrecognised are derivatives.
    pub fn classify(market: &str) -> Self {
        if market.starts_with(INDEX_MARKER) || market.contains(PAIR_SEPARATOR) {
            MarketKind::Spot
        } else {
            MarketKind::Derivative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKind::Spot => "SPOT",
            MarketKind::Derivative => "DERIVATIVE",
        }
    }
}

impl std::fmt::Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the numeric index of an `@N` identifier.
///
/// Returns `None` for pair or bare identifiers and for malformed or negative indices.
pub fn spot_index(market: &str) -> Option<u32> {
    let digits = market.strip_prefix(INDEX_MARKER)?;
    let index: i64 = digits.parse().ok()?;
    u32::try_from(index).ok()
}

/// Whether orders on this market should be mirrored.
///
/// Spot only; index-form identifiers must carry a well-formed, non-negative index.
pub fn is_eligible_for_mirroring(market: &str) -> bool {
    if market.is_empty() || market == "N/A" {
        return false;
    }
    if MarketKind::classify(market) != MarketKind::Spot {
        return false;
    }
    if market.starts_with(INDEX_MARKER) {
        return spot_index(market).is_some();
    }
    true
}

/// A spot market resolved to its venue index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpotMarket {
    /// Identifier as the leader used it
    pub name: String,

    /// Spot universe index (`@index`)
    pub index: u32,
}

impl SpotMarket {
    /// Index-form identifier for this market.
    pub fn index_name(&self) -> String {
        format!("{}{}", INDEX_MARKER, self.index)
    }
}

/// Reference price and size precision for a spot market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub market: SpotMarket,

    /// Mid price, falling back to mark price
    pub reference_price: Decimal,

    /// Decimal places allowed in the order size
    pub size_precision: u32,
}
