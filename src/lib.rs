//! Market-maker bot orchestrator.
//!
//! Runs one autonomous trading task per wallet: repeated buy/sell cycles
//! with randomized sizing and pacing, until the wallet reaches its recycle
//! threshold and is retired.

pub mod config;
pub mod engine;
pub mod executor;
pub mod gateway;
pub mod policy;
pub mod recycle;
pub mod registry;
pub mod types;


// Re-export main types for convenience
pub use config::{
    resolve_settings, AppConfig, CustomSettings, ResolvedSettings, SettingsError, TradeSettings,
    NATIVE_MINT,
};
pub use engine::EngineTimings;
pub use executor::{BalanceError, BalanceSource, SwapError, SwapExecutor, SwapRequest};
pub use gateway::{RpcBalanceClient, SwapGatewayClient};
pub use recycle::RecycleHook;
pub use registry::{BotRegistry, StartError};
pub use types::{
    short_key, BotStatus, BotSummary, CycleCallback, TradeSide, TransactionRecord, Wallet,
    WalletId,
};
