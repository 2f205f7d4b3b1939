//! Trade settings, per-wallet overrides, and app configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Wallet;

/// Native SOL mint, the default trade counterpart.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Parameters driving one bot's trading cycles.
///
/// Global settings and per-wallet custom settings share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSettings {
    /// Shortest wait between cycles, in seconds.
    pub min_interval_secs: u64,
    /// Longest wait between cycles, in seconds.
    pub max_interval_secs: u64,
    /// Smallest trade size, in SOL.
    pub min_amount: Decimal,
    /// Largest trade size, in SOL.
    pub max_amount: Decimal,
    /// Cycles a wallet completes before it is retired.
    pub cycles_before_recycle: u32,
    /// Draw amount and interval uniformly from their ranges instead of
    /// always using the minimum.
    pub randomized: bool,
    /// Asset to trade against SOL; `None` means native SOL.
    #[serde(default)]
    pub trade_mint: Option<String>,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            min_interval_secs: 60,
            max_interval_secs: 300,
            min_amount: Decimal::new(1, 2), // 0.01 SOL
            max_amount: Decimal::new(1, 1), // 0.1 SOL
            cycles_before_recycle: 10,
            randomized: true,
            trade_mint: None,
        }
    }
}

impl TradeSettings {
    /// Range sanity checks shared by global and custom settings.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.min_interval_secs > self.max_interval_secs {
            return Err(SettingsError::IntervalRange {
                min: self.min_interval_secs,
                max: self.max_interval_secs,
            });
        }
        if self.min_amount > self.max_amount {
            return Err(SettingsError::AmountRange {
                min: self.min_amount,
                max: self.max_amount,
            });
        }
        if self.cycles_before_recycle == 0 {
            return Err(SettingsError::ZeroCycleThreshold);
        }
        Ok(())
    }
}

/// Per-wallet settings override block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSettings {
    /// Whether this override is in effect. Disabled overrides are kept on
    /// the wallet but ignored at resolution time.
    pub enabled: bool,
    #[serde(flatten)]
    pub settings: TradeSettings,
}

/// Why a settings block could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("min_interval {min}s exceeds max_interval {max}s")]
    IntervalRange { min: u64, max: u64 },
    #[error("min_amount {min} exceeds max_amount {max}")]
    AmountRange { min: Decimal, max: Decimal },
    #[error("cycles_before_recycle must be at least 1")]
    ZeroCycleThreshold,
    #[error("trade mint address is required")]
    EmptyTradeMint,
}

/// Effective parameter set driving one bot.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub trade: TradeSettings,
    /// Resolved trade asset; native SOL unless an override names another.
    pub trade_mint: String,
    pub use_custom: bool,
}

/// Merge per-wallet overrides with the global defaults.
///
/// Custom settings win only when their `enabled` flag is set; the trade mint
/// falls back to native SOL. Runs once, at bot start.
pub fn resolve_settings(
    wallet: &Wallet,
    global: &TradeSettings,
) -> Result<ResolvedSettings, SettingsError> {
    let (trade, use_custom) = match &wallet.custom_settings {
        Some(custom) if custom.enabled => (custom.settings.clone(), true),
        _ => (global.clone(), false),
    };
    trade.validate()?;

    let trade_mint = match trade.trade_mint.as_deref() {
        Some(mint) if !mint.trim().is_empty() => mint.to_string(),
        Some(_) => return Err(SettingsError::EmptyTradeMint),
        None => NATIVE_MINT.to_string(),
    };

    Ok(ResolvedSettings {
        trade,
        trade_mint,
        use_custom,
    })
}

/// App-level configuration for the binary, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rpc_url: String,
    pub swap_gateway_url: String,
    /// Path to the JSON wallet roster supplied by the owning system.
    pub wallet_roster: String,
    pub settings: TradeSettings,
}

impl AppConfig {
    /// Load from environment variables, with devnet-friendly defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let rpc_url = std::env::var("MAKER_RPC_URL")
            .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string());
        let swap_gateway_url = std::env::var("MAKER_SWAP_GATEWAY_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let wallet_roster =
            std::env::var("MAKER_WALLET_ROSTER").unwrap_or_else(|_| "wallets.json".to_string());

        let mut settings = TradeSettings::default();
        if let Ok(raw) = std::env::var("MAKER_SETTINGS") {
            settings = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("Invalid MAKER_SETTINGS: {}", e))?;
        }
        settings.validate()?;

        Ok(Self {
            rpc_url,
            swap_gateway_url,
            wallet_roster,
            settings,
        })
    }
}

/// Read the JSON wallet roster the owning system maintains.
pub fn load_wallet_roster(path: &str) -> anyhow::Result<Vec<Wallet>> {
    use anyhow::Context;

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read wallet roster: {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid wallet roster: {}", path))
}
