//! Bot registry - owns the wallet-id to running-bot map.
//!
//! The map is the only state shared across bots. All mutation goes through
//! the registry's async mutex, which keeps the one-bot-per-wallet invariant
//! under concurrent starts and stops.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{watch, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::config::{resolve_settings, SettingsError, TradeSettings};
use crate::engine::{EngineTimings, TradingCycleEngine};
use crate::executor::{BalanceError, BalanceSource, SwapExecutor};
use crate::recycle::{RecycleCoordinator, RecycleHook};
use crate::types::{short_key, BotStatus, BotSummary, CycleCallback, Wallet, WalletId};

/// Why a bot could not be started. Every variant leaves the registry
/// unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("a bot is already running for this wallet")]
    DuplicateBot,
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),
    #[error("balance check failed: {0}")]
    Balance(#[from] BalanceError),
    #[error("insufficient balance: minimum required {required} SOL, current {available} SOL")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },
}

/// What the registry keeps per running bot: a stop signal and the status
/// cell its engine refreshes. The engine state itself belongs to the task.
struct BotHandle {
    public_key: String,
    /// Identifies the engine run this handle belongs to. Stops are
    /// cooperative, so a stopped engine can outlive its handle; the token
    /// keeps its cleanup from evicting a replacement bot's handle.
    run_token: Uuid,
    stop: watch::Sender<bool>,
    status: Arc<StdMutex<BotStatus>>,
}

/// Creates, tracks, and terminates one trading bot per wallet.
pub struct BotRegistry {
    bots: Arc<Mutex<HashMap<WalletId, BotHandle>>>,
    swap: Arc<dyn SwapExecutor>,
    balance: Arc<dyn BalanceSource>,
    recycle_hook: Option<Arc<dyn RecycleHook>>,
    timings: EngineTimings,
}

impl BotRegistry {
    pub fn new(swap: Arc<dyn SwapExecutor>, balance: Arc<dyn BalanceSource>) -> Self {
        Self::with_timings(swap, balance, EngineTimings::default())
    }

    pub fn with_timings(
        swap: Arc<dyn SwapExecutor>,
        balance: Arc<dyn BalanceSource>,
        timings: EngineTimings,
    ) -> Self {
        Self {
            bots: Arc::new(Mutex::new(HashMap::new())),
            swap,
            balance,
            recycle_hook: None,
            timings,
        }
    }

    /// Install the external fund-transfer hook fired at recycle time.
    pub fn with_recycle_hook(mut self, hook: Arc<dyn RecycleHook>) -> Self {
        self.recycle_hook = Some(hook);
        self
    }

    /// Start a bot for `wallet`, returning its initial status snapshot.
    ///
    /// The map lock is held across settings resolution and the balance
    /// precheck, so concurrent starts for one wallet id serialize and
    /// exactly one succeeds.
    pub async fn start(
        &self,
        wallet: Wallet,
        global_settings: &TradeSettings,
        on_cycle_complete: CycleCallback,
    ) -> Result<BotStatus, StartError> {
        let mut bots = self.bots.lock().await;

        if bots.contains_key(&wallet.id) {
            info!(
                "Market maker already running for wallet {}...",
                short_key(&wallet.public_key)
            );
            return Err(StartError::DuplicateBot);
        }

        let settings = resolve_settings(&wallet, global_settings)?;

        let available = self.balance.balance(&wallet.public_key).await?;
        // * 2 to cover both legs plus fees
        let required = settings.trade.min_amount * Decimal::from(2);
        if available < required {
            return Err(StartError::InsufficientBalance {
                required,
                available,
            });
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let status = Arc::new(StdMutex::new(BotStatus {
            is_active: true,
            cycles_completed: wallet.cycles_completed,
            last_action_time: chrono::Utc::now(),
            transactions: Vec::new(),
            use_custom_settings: settings.use_custom,
        }));
        let initial = status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        info!(
            "Started market making for wallet {}... using {} settings",
            short_key(&wallet.public_key),
            if settings.use_custom { "custom" } else { "global" }
        );

        let wallet_id = wallet.id;
        let public_key = wallet.public_key.clone();
        let recycler =
            RecycleCoordinator::new(self.recycle_hook.clone(), on_cycle_complete.clone());
        let engine = TradingCycleEngine::new(
            wallet,
            settings,
            Arc::clone(&self.swap),
            Arc::clone(&self.balance),
            self.timings,
            Arc::clone(&status),
            stop_rx,
            on_cycle_complete,
            recycler,
        );

        let run_token = Uuid::new_v4();
        bots.insert(
            wallet_id,
            BotHandle {
                public_key,
                run_token,
                stop: stop_tx,
                status,
            },
        );

        let map = Arc::clone(&self.bots);
        tokio::spawn(async move {
            engine.run().await;
            let mut bots = map.lock().await;
            // only deregister our own handle; a replacement bot may have
            // been started while this engine was finishing a leg
            if bots
                .get(&wallet_id)
                .map_or(false, |handle| handle.run_token == run_token)
            {
                bots.remove(&wallet_id);
            }
        });

        Ok(initial)
    }

    /// Signal a bot to stop and drop its registry entry. Returns whether a
    /// bot was found; calling again for the same id returns false.
    pub async fn stop(&self, wallet_id: WalletId) -> bool {
        let mut bots = self.bots.lock().await;
        match bots.remove(&wallet_id) {
            Some(handle) => {
                let _ = handle.stop.send(true);
                info!(
                    "Stopped market making for wallet {}...",
                    short_key(&handle.public_key)
                );
                true
            }
            None => false,
        }
    }

    /// Status snapshot for one bot, or `None` when no bot is registered for
    /// the id.
    pub async fn status(&self, wallet_id: WalletId) -> Option<BotStatus> {
        let bots = self.bots.lock().await;
        bots.get(&wallet_id)
            .map(|handle| handle.status.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// Summaries of every registered bot. Call again for a fresh view.
    pub async fn list(&self) -> Vec<BotSummary> {
        let bots = self.bots.lock().await;
        bots.iter()
            .map(|(id, handle)| {
                let status = handle.status.lock().unwrap_or_else(|e| e.into_inner());
                BotSummary {
                    wallet_id: *id,
                    public_key: handle.public_key.clone(),
                    cycles_completed: status.cycles_completed,
                    last_action_time: status.last_action_time,
                    use_custom_settings: status.use_custom_settings,
                }
            })
            .collect()
    }

    /// Signal every bot to stop; returns how many were running.
    pub async fn stop_all(&self) -> usize {
        let mut bots = self.bots.lock().await;
        let count = bots.len();
        for (_, handle) in bots.drain() {
            let _ = handle.stop.send(true);
        }
        if count > 0 {
            info!("Stopped {} running bots", count);
        }
        count
    }
}
