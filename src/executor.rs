//! Collaborator seams for swap execution and balance queries.
//!
//! The engine only sees these traits; HTTP implementations live in
//! `gateway`, tests supply scripted mocks.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::NATIVE_MINT;
use crate::types::{TradeSide, TransactionRecord, Wallet};

/// One swap leg to submit to the venue.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    /// Asset traded against native SOL.
    pub trade_mint: String,
    /// Trade size in SOL.
    pub amount: Decimal,
    pub side: TradeSide,
}

impl SwapRequest {
    /// Mint spent by this leg.
    pub fn input_mint(&self) -> &str {
        match self.side {
            TradeSide::Buy => NATIVE_MINT,
            TradeSide::Sell => &self.trade_mint,
        }
    }

    /// Mint received by this leg.
    pub fn output_mint(&self) -> &str {
        match self.side {
            TradeSide::Buy => &self.trade_mint,
            TradeSide::Sell => NATIVE_MINT,
        }
    }

    /// History record for a leg the venue rejected or the transport lost.
    pub fn failure_record(&self, error: &SwapError) -> TransactionRecord {
        TransactionRecord {
            signature: None,
            success: false,
            timestamp: chrono::Utc::now(),
            side: self.side,
            amount: self.amount,
            input_mint: self.input_mint().to_string(),
            output_mint: self.output_mint().to_string(),
            error: Some(error.to_string()),
        }
    }
}

/// Swap failures. Recoverable from the engine's point of view: the leg is
/// recorded as failed and the cycle still advances.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("no route found for swap from {input} to {output}")]
    NoRoute { input: String, output: String },
    #[error("venue rejected the swap: {0}")]
    Rejected(String),
    #[error("swap transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("swap gateway returned {status}: {body}")]
    Gateway { status: u16, body: String },
}

/// Balance query failures. Recoverable: the engine backs off and re-checks.
#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error("balance transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed balance response: {0}")]
    Malformed(String),
}

/// Executes one swap leg on behalf of a wallet. Key material and routing are
/// the implementor's concern; the engine only supplies the wallet snapshot
/// and the leg parameters.
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn execute_swap(
        &self,
        wallet: &Wallet,
        request: &SwapRequest,
    ) -> Result<TransactionRecord, SwapError>;
}

/// Point-in-time SOL balance for an address.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance(&self, public_key: &str) -> Result<Decimal, BalanceError>;
}
