//! HTTP collaborators: the swap gateway sidecar and Solana JSON-RPC.
//!
//! The gateway owns key material, quoting, and transaction submission; this
//! client only reports legs and reads back signatures.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::executor::{BalanceError, BalanceSource, SwapError, SwapExecutor, SwapRequest};
use crate::types::{short_key, TransactionRecord, Wallet};

const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Slippage passed through to the gateway, in basis points.
const DEFAULT_SLIPPAGE_BPS: u32 = 50;

/// Request timeout shared by both clients.
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Convert a SOL amount to lamports, saturating at zero for non-positive
/// input.
pub fn to_lamports(amount: Decimal) -> u64 {
    (amount * Decimal::from(LAMPORTS_PER_SOL))
        .to_u64()
        .unwrap_or(0)
}

/// Convert lamports to a SOL amount.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)
}

/// Swap execution via the swap gateway sidecar.
pub struct SwapGatewayClient {
    client: Client,
    base_url: String,
    slippage_bps: u32,
}

impl SwapGatewayClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        })
    }
}

#[derive(Debug, Serialize)]
struct GatewaySwapRequest<'a> {
    wallet: &'a str,
    input_mint: &'a str,
    output_mint: &'a str,
    amount_lamports: u64,
    slippage_bps: u32,
}

#[derive(Debug, Deserialize)]
struct GatewaySwapResponse {
    signature: String,
}

#[async_trait]
impl SwapExecutor for SwapGatewayClient {
    async fn execute_swap(
        &self,
        wallet: &Wallet,
        request: &SwapRequest,
    ) -> Result<TransactionRecord, SwapError> {
        let url = format!("{}/v1/swap", self.base_url);
        let amount_lamports = to_lamports(request.amount);

        let body = GatewaySwapRequest {
            wallet: &wallet.public_key,
            input_mint: request.input_mint(),
            output_mint: request.output_mint(),
            amount_lamports,
            slippage_bps: self.slippage_bps,
        };

        debug!(
            "Submitting {} leg for wallet {}...: {} lamports {} -> {}",
            request.side,
            short_key(&wallet.public_key),
            amount_lamports,
            request.input_mint(),
            request.output_mint()
        );

        let response = self.client.post(&url).json(&body).send().await?;

        match response.status() {
            status if status.is_success() => {
                let resp: GatewaySwapResponse = response.json().await?;
                Ok(TransactionRecord {
                    signature: Some(resp.signature),
                    success: true,
                    timestamp: chrono::Utc::now(),
                    side: request.side,
                    amount: request.amount,
                    input_mint: request.input_mint().to_string(),
                    output_mint: request.output_mint().to_string(),
                    error: None,
                })
            }
            reqwest::StatusCode::NOT_FOUND => Err(SwapError::NoRoute {
                input: request.input_mint().to_string(),
                output: request.output_mint().to_string(),
            }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SwapError::Gateway {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

/// Balance queries against a Solana JSON-RPC endpoint.
pub struct RpcBalanceClient {
    client: Client,
    url: String,
}

impl RpcBalanceClient {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'static str,
    params: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<RpcBalanceResult>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcBalanceResult {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[async_trait]
impl BalanceSource for RpcBalanceClient {
    async fn balance(&self, public_key: &str) -> Result<Decimal, BalanceError> {
        let req = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "getBalance",
            params: [public_key],
        };

        let response = self.client.post(&self.url).json(&req).send().await?;
        let resp: RpcResponse = response.json().await?;

        if let Some(err) = resp.error {
            return Err(BalanceError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = resp
            .result
            .ok_or_else(|| BalanceError::Malformed("missing result field".to_string()))?;

        Ok(lamports_to_sol(result.value))
    }
}
