//! Per-bot trading cycle state machine.
//!
//! One engine runs per wallet, owned by its spawned task. Each cycle walks
//! `Checking -> Trading -> Waiting` and back; `Recycling` and `Stopped` are
//! terminal. Swap and balance failures never terminate the machine; they
//! are recorded and retried with a backoff.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ResolvedSettings;
use crate::executor::{BalanceSource, SwapExecutor, SwapRequest};
use crate::policy;
use crate::recycle::RecycleCoordinator;
use crate::types::{short_key, BotStatus, CycleCallback, TradeSide, TransactionRecord, Wallet};

/// Fixed delays and limits of the cycle machine. Defaults mirror the
/// production cadence; tests compress them.
#[derive(Debug, Clone, Copy)]
pub struct EngineTimings {
    /// Retry delay after a low-balance check.
    pub low_balance_retry: Duration,
    /// Backoff after a failed balance fetch or other caught failure.
    pub failure_backoff: Duration,
    /// Gap between the buy and sell legs of one cycle.
    pub inter_trade_gap: Duration,
    /// Consecutive failures tolerated before the bot gives up.
    /// `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            low_balance_retry: Duration::from_secs(60),
            failure_backoff: Duration::from_secs(60),
            inter_trade_gap: Duration::from_secs(10),
            max_consecutive_failures: None,
        }
    }
}

/// Phase of the cycle machine. `Trading` carries the amount the balance was
/// checked against, so the traded size never exceeds what `Checking` saw.
#[derive(Debug)]
enum CyclePhase {
    Checking,
    Trading { amount: Decimal },
    Waiting { delay: Duration },
    Recycling,
    Stopped,
}

pub(crate) struct TradingCycleEngine {
    wallet: Wallet,
    settings: ResolvedSettings,
    swap: Arc<dyn SwapExecutor>,
    balance: Arc<dyn BalanceSource>,
    timings: EngineTimings,
    cycles_completed: u32,
    last_action_time: DateTime<Utc>,
    transactions: Vec<TransactionRecord>,
    consecutive_failures: u32,
    status: Arc<Mutex<BotStatus>>,
    stop_rx: watch::Receiver<bool>,
    on_cycle_complete: CycleCallback,
    recycler: RecycleCoordinator,
    rng: StdRng,
}

impl TradingCycleEngine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        wallet: Wallet,
        settings: ResolvedSettings,
        swap: Arc<dyn SwapExecutor>,
        balance: Arc<dyn BalanceSource>,
        timings: EngineTimings,
        status: Arc<Mutex<BotStatus>>,
        stop_rx: watch::Receiver<bool>,
        on_cycle_complete: CycleCallback,
        recycler: RecycleCoordinator,
    ) -> Self {
        let cycles_completed = wallet.cycles_completed;
        Self {
            wallet,
            settings,
            swap,
            balance,
            timings,
            cycles_completed,
            last_action_time: Utc::now(),
            transactions: Vec::new(),
            consecutive_failures: 0,
            status,
            stop_rx,
            on_cycle_complete,
            recycler,
            rng: StdRng::from_entropy(),
        }
    }

    /// Drive the machine until a terminal phase. The caller deregisters the
    /// bot once this returns.
    pub(crate) async fn run(mut self) {
        info!(
            "Trading engine started for wallet {}... ({}/{} cycles done)",
            self.short_key(),
            self.cycles_completed,
            self.settings.trade.cycles_before_recycle
        );

        let mut phase = CyclePhase::Checking;
        loop {
            phase = match phase {
                CyclePhase::Checking => self.check().await,
                CyclePhase::Trading { amount } => self.trade(amount).await,
                CyclePhase::Waiting { delay } => self.wait(delay).await,
                CyclePhase::Recycling => {
                    self.recycler.recycle(&self.wallet, self.cycles_completed).await;
                    self.mark_inactive();
                    return;
                }
                CyclePhase::Stopped => {
                    info!("Trading engine stopped for wallet {}...", self.short_key());
                    self.mark_inactive();
                    return;
                }
            };
        }
    }

    async fn check(&mut self) -> CyclePhase {
        if self.stop_requested() {
            return CyclePhase::Stopped;
        }

        if self.cycles_completed >= self.settings.trade.cycles_before_recycle {
            return CyclePhase::Recycling;
        }

        let balance = match self.balance.balance(&self.wallet.public_key).await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(
                    "Balance check failed for wallet {}...: {}",
                    self.short_key(),
                    err
                );
                return self.backoff(self.timings.failure_backoff);
            }
        };

        let amount = policy::trade_amount(&self.settings.trade, &mut self.rng);
        // * 2 to cover both legs plus fees
        let required = amount * Decimal::from(2);
        if balance < required {
            warn!(
                "Insufficient balance in wallet {}...: {} SOL on hand, {} SOL needed",
                self.short_key(),
                balance,
                required
            );
            return self.backoff(self.timings.low_balance_retry);
        }

        CyclePhase::Trading { amount }
    }

    async fn trade(&mut self, amount: Decimal) -> CyclePhase {
        info!(
            "Executing trade cycle {} for wallet {}...",
            self.cycles_completed + 1,
            self.short_key()
        );

        let buy = SwapRequest {
            trade_mint: self.settings.trade_mint.clone(),
            amount,
            side: TradeSide::Buy,
        };
        self.execute_leg(&buy).await;

        tokio::time::sleep(self.timings.inter_trade_gap).await;

        let sell = SwapRequest {
            trade_mint: self.settings.trade_mint.clone(),
            amount,
            side: TradeSide::Sell,
        };
        self.execute_leg(&sell).await;

        // one cycle per attempted pair, independent of per-leg success
        self.cycles_completed += 1;
        self.last_action_time = Utc::now();
        self.consecutive_failures = 0;
        self.refresh_status();
        (self.on_cycle_complete)(self.wallet.id, self.cycles_completed, false);

        let delay = policy::wait_interval(&self.settings.trade, &mut self.rng);
        debug!(
            "Next trade cycle for wallet {}... in {}s",
            self.short_key(),
            delay.as_secs()
        );
        CyclePhase::Waiting { delay }
    }

    /// Sleep out `delay`, or stop early if a stop request lands first.
    async fn wait(&mut self, delay: Duration) -> CyclePhase {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return CyclePhase::Checking,
                changed = self.stop_rx.changed() => {
                    // a closed channel means the registry dropped us
                    if changed.is_err() || *self.stop_rx.borrow() {
                        return CyclePhase::Stopped;
                    }
                }
            }
        }
    }

    async fn execute_leg(&mut self, request: &SwapRequest) {
        let record = match self.swap.execute_swap(&self.wallet, request).await {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "{} leg failed for wallet {}...: {}",
                    request.side,
                    self.short_key(),
                    err
                );
                request.failure_record(&err)
            }
        };
        self.transactions.push(record);
    }

    /// Count a failed check and decide whether to keep retrying.
    fn backoff(&mut self, delay: Duration) -> CyclePhase {
        self.consecutive_failures += 1;
        if let Some(cap) = self.timings.max_consecutive_failures {
            if self.consecutive_failures > cap {
                error!(
                    "Giving up on wallet {}... after {} consecutive failures",
                    self.short_key(),
                    self.consecutive_failures
                );
                return CyclePhase::Stopped;
            }
        }
        CyclePhase::Waiting { delay }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    fn refresh_status(&self) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        status.cycles_completed = self.cycles_completed;
        status.last_action_time = self.last_action_time;
        status.transactions = self.transactions.clone();
    }

    fn mark_inactive(&self) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        status.is_active = false;
    }

    fn short_key(&self) -> &str {
        short_key(&self.wallet.public_key)
    }
}
