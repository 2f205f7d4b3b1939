//! Contract types shared between the orchestrator and its collaborators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::CustomSettings;

/// Opaque identifier for a managed wallet.
pub type WalletId = Uuid;

/// Snapshot of a wallet, read from the owning wallet registry at bot start.
///
/// The orchestrator never mutates the stored wallet; cycle-count updates flow
/// back through the cycle-completion callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    /// Base58 public address on the venue.
    pub public_key: String,
    #[serde(default)]
    pub cycles_completed: u32,
    #[serde(default)]
    pub is_active: bool,
    /// Per-wallet settings override; wins over global settings only when its
    /// `enabled` flag is set.
    #[serde(default)]
    pub custom_settings: Option<CustomSettings>,
}

/// Direction of one swap leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Outcome of one swap leg, successful or not. Immutable once created;
/// appended to the bot's history in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Venue transaction signature; absent when the leg never reached the
    /// venue.
    pub signature: Option<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    /// Trade size in SOL.
    pub amount: Decimal,
    pub input_mint: String,
    pub output_mint: String,
    /// Error text for failed legs.
    pub error: Option<String>,
}

/// Point-in-time view of one bot, refreshed by its engine after every cycle.
#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub is_active: bool,
    pub cycles_completed: u32,
    pub last_action_time: DateTime<Utc>,
    pub transactions: Vec<TransactionRecord>,
    pub use_custom_settings: bool,
}

/// One row of the registry listing.
#[derive(Debug, Clone, Serialize)]
pub struct BotSummary {
    pub wallet_id: WalletId,
    pub public_key: String,
    pub cycles_completed: u32,
    pub last_action_time: DateTime<Utc>,
    pub use_custom_settings: bool,
}

/// Invoked with `(wallet_id, cycles_completed, recycled)` after every
/// completed cycle, and exactly once more with `recycled = true` when the
/// wallet retires.
pub type CycleCallback = Arc<dyn Fn(WalletId, u32, bool) + Send + Sync>;

/// Leading characters of a public key, for log lines.
pub fn short_key(public_key: &str) -> &str {
    public_key.get(..8).unwrap_or(public_key)
}
