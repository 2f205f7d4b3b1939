//! End-to-end orchestrator scenarios driven with paused timers:
//! start -> check -> buy/sell legs -> cycle callback -> recycle/stop.


use async_trait::async_trait;
use maker_runner::{
    BotRegistry, CycleCallback, EngineTimings, RecycleHook, StartError, TradeSettings, TradeSide,
    Wallet, WalletId,
};
use mock_venue::{MockBalanceSource, MockSwapExecutor};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

fn test_wallet() -> Wallet {
    Wallet {
        id: Uuid::new_v4(),
        public_key: "7fUAJdStEuGbc3sM84cKRL6yYaaSstyLSU4ve5oovLS7".to_string(),
        cycles_completed: 0,
        is_active: true,
        custom_settings: None,
    }
}

/// Non-randomized settings with a one-second cadence.
fn fast_settings(cycles_before_recycle: u32) -> TradeSettings {
    TradeSettings {
        min_interval_secs: 1,
        max_interval_secs: 1,
        min_amount: Decimal::new(1, 2),
        max_amount: Decimal::new(1, 2),
        cycles_before_recycle,
        randomized: false,
        trade_mint: None,
    }
}

type CycleEvent = (WalletId, u32, bool);

fn capture_callback() -> (CycleCallback, mpsc::UnboundedReceiver<CycleEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: CycleCallback = Arc::new(move |wallet_id, cycles, recycled| {
        let _ = tx.send((wallet_id, cycles, recycled));
    });
    (callback, rx)
}

#[tokio::test(start_paused = true)]
async fn full_lifecycle_recycles_after_threshold() {
    let swap = Arc::new(MockSwapExecutor::new());
    let balance = Arc::new(MockBalanceSource::with_sol(10));
    let registry = BotRegistry::new(swap.clone(), balance);
    let (callback, mut rx) = capture_callback();

    let wallet = test_wallet();
    let wallet_id = wallet.id;
    let status = registry
        .start(wallet, &fast_settings(2), callback)
        .await
        .unwrap();
    assert!(status.is_active);
    assert_eq!(status.cycles_completed, 0);

    // every completed cycle notifies, then exactly one recycle notification
    assert_eq!(rx.recv().await, Some((wallet_id, 1, false)));
    assert_eq!(rx.recv().await, Some((wallet_id, 2, false)));
    assert_eq!(rx.recv().await, Some((wallet_id, 2, true)));

    // the engine deregisters itself after the recycle notification
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(registry.status(wallet_id).await.is_none());
    assert!(registry.list().await.is_empty());

    // two legs per cycle, buy before sell
    let calls = swap.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0].side, TradeSide::Buy);
    assert_eq!(calls[1].side, TradeSide::Sell);

    // no further notifications after recycling
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn start_rejects_insufficient_balance() {
    let swap = Arc::new(MockSwapExecutor::new());
    // below the 2 x min_amount floor of 0.02 SOL
    let balance = Arc::new(MockBalanceSource::with_balance(Decimal::new(15, 3)));
    let registry = BotRegistry::new(swap, balance);
    let (callback, _rx) = capture_callback();

    let err = registry
        .start(test_wallet(), &fast_settings(2), callback)
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::InsufficientBalance { .. }));
    assert!(registry.list().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_buy_leg_still_counts_the_cycle() {
    let swap = Arc::new(MockSwapExecutor::failing_buys());
    let balance = Arc::new(MockBalanceSource::with_sol(10));
    let registry = BotRegistry::new(swap.clone(), balance);
    let (callback, mut rx) = capture_callback();

    let wallet = test_wallet();
    let wallet_id = wallet.id;
    registry
        .start(wallet, &fast_settings(5), callback)
        .await
        .unwrap();

    assert_eq!(rx.recv().await, Some((wallet_id, 1, false)));

    let status = registry.status(wallet_id).await.unwrap();
    assert_eq!(status.cycles_completed, 1);
    assert_eq!(status.transactions.len(), 2);

    let buy = &status.transactions[0];
    assert_eq!(buy.side, TradeSide::Buy);
    assert!(!buy.success);
    assert!(buy.error.is_some());

    let sell = &status.transactions[1];
    assert_eq!(sell.side, TradeSide::Sell);
    assert!(sell.success);

    // scheduling proceeds normally despite the failed leg
    assert_eq!(rx.recv().await, Some((wallet_id, 2, false)));

    assert!(registry.stop(wallet_id).await);
}

#[tokio::test(start_paused = true)]
async fn concurrent_starts_yield_exactly_one_bot() {
    let swap = Arc::new(MockSwapExecutor::new());
    let balance = Arc::new(MockBalanceSource::with_sol(10).with_delay(Duration::from_millis(50)));
    let registry = Arc::new(BotRegistry::new(swap, balance));
    let (callback, _rx) = capture_callback();

    let wallet = test_wallet();
    let wallet_id = wallet.id;
    let settings = TradeSettings {
        min_interval_secs: 3600,
        max_interval_secs: 3600,
        ..fast_settings(100)
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let wallet = wallet.clone();
        let settings = settings.clone();
        let callback = Arc::clone(&callback);
        handles.push(tokio::spawn(async move {
            registry.start(wallet, &settings, callback).await
        }));
    }

    let mut successes = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(StartError::DuplicateBot) => duplicates += 1,
            Err(other) => panic!("unexpected start error: {}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(registry.list().await.len(), 1);
    assert!(registry.status(wallet_id).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_removes_the_bot() {
    let swap = Arc::new(MockSwapExecutor::new());
    let balance = Arc::new(MockBalanceSource::with_sol(10));
    let registry = BotRegistry::new(swap.clone(), balance);
    let (callback, mut rx) = capture_callback();

    // never-started id
    assert!(!registry.stop(Uuid::new_v4()).await);

    let wallet = test_wallet();
    let wallet_id = wallet.id;
    let settings = TradeSettings {
        min_interval_secs: 3600,
        max_interval_secs: 3600,
        ..fast_settings(100)
    };
    registry.start(wallet, &settings, callback).await.unwrap();

    // let one cycle finish so the bot is parked in its waiting phase
    assert_eq!(rx.recv().await, Some((wallet_id, 1, false)));

    assert!(registry.stop(wallet_id).await);
    assert!(registry.list().await.is_empty());
    assert!(registry.status(wallet_id).await.is_none());
    assert!(!registry.stop(wallet_id).await);

    // the stopped engine schedules no further legs
    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert_eq!(swap.calls().len(), 2);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn restart_after_stop_survives_the_old_engines_shutdown() {
    let gate = Arc::new(Semaphore::new(0));
    let swap = Arc::new(MockSwapExecutor::gating_sells(Arc::clone(&gate)));
    let balance = Arc::new(MockBalanceSource::with_sol(10));
    let registry = BotRegistry::new(swap.clone(), balance.clone());
    let (old_callback, mut old_rx) = capture_callback();

    let wallet = test_wallet();
    let wallet_id = wallet.id;
    let settings = TradeSettings {
        min_interval_secs: 3600,
        max_interval_secs: 3600,
        ..fast_settings(100)
    };
    registry
        .start(wallet.clone(), &settings, old_callback)
        .await
        .unwrap();

    // let the first engine reach its gated sell leg
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(swap.calls().len(), 2);

    // stop is cooperative: the old engine is still finishing its trade, so
    // a replacement can be started for the same wallet right away
    assert!(registry.stop(wallet_id).await);
    let (callback, mut rx) = capture_callback();
    registry.start(wallet, &settings, callback).await.unwrap();

    // release the old engine and let it observe its stop signal
    gate.add_permits(100);
    assert_eq!(old_rx.recv().await, Some((wallet_id, 1, false)));
    tokio::time::sleep(Duration::from_secs(60)).await;

    // the replacement is untouched by the old engine's shutdown
    assert_eq!(rx.recv().await, Some((wallet_id, 1, false)));
    assert!(registry.status(wallet_id).await.is_some());
    assert_eq!(registry.list().await.len(), 1);
    assert!(registry.stop(wallet_id).await);
}

#[tokio::test(start_paused = true)]
async fn low_balance_retries_without_counting_cycles() {
    let swap = Arc::new(MockSwapExecutor::new());
    let balance = Arc::new(MockBalanceSource::with_sol(10));
    let registry = BotRegistry::new(swap.clone(), balance.clone());
    let (callback, mut rx) = capture_callback();

    let wallet = test_wallet();
    let wallet_id = wallet.id;
    registry
        .start(wallet, &fast_settings(5), callback)
        .await
        .unwrap();

    // drain the wallet before the engine's first check runs
    balance.set_balance(Decimal::new(5, 3));

    // several 60s retry windows pass without a single trade
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(swap.calls().is_empty());
    assert!(rx.try_recv().is_err());
    let status = registry.status(wallet_id).await.unwrap();
    assert!(status.is_active);
    assert_eq!(status.cycles_completed, 0);

    // top the wallet back up and the next check trades again
    balance.set_balance(Decimal::from(10));
    assert_eq!(rx.recv().await, Some((wallet_id, 1, false)));

    assert!(registry.stop(wallet_id).await);
}

struct RecordingRecycleHook {
    recycled: Mutex<Vec<WalletId>>,
}

#[async_trait]
impl RecycleHook for RecordingRecycleHook {
    async fn on_recycle(&self, wallet: &Wallet) -> anyhow::Result<()> {
        self.recycled.lock().unwrap().push(wallet.id);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn recycle_hook_fires_before_the_terminal_notification() {
    let swap = Arc::new(MockSwapExecutor::new());
    let balance = Arc::new(MockBalanceSource::with_sol(10));
    let hook = Arc::new(RecordingRecycleHook {
        recycled: Mutex::new(Vec::new()),
    });
    let registry =
        BotRegistry::new(swap, balance).with_recycle_hook(Arc::clone(&hook) as Arc<dyn RecycleHook>);
    let (callback, mut rx) = capture_callback();

    let wallet = test_wallet();
    let wallet_id = wallet.id;
    registry
        .start(wallet, &fast_settings(1), callback)
        .await
        .unwrap();

    assert_eq!(rx.recv().await, Some((wallet_id, 1, false)));
    assert_eq!(rx.recv().await, Some((wallet_id, 1, true)));

    // the hook saw the retiring wallet exactly once
    assert_eq!(hook.recycled.lock().unwrap().as_slice(), &[wallet_id]);
}

#[tokio::test(start_paused = true)]
async fn retry_cap_terminates_a_persistently_failing_bot() {
    let swap = Arc::new(MockSwapExecutor::new());
    // the start precheck succeeds, every engine check fails
    let balance = Arc::new(MockBalanceSource::with_sol(10).failing_after(1));
    let timings = EngineTimings {
        max_consecutive_failures: Some(2),
        ..EngineTimings::default()
    };
    let registry = BotRegistry::with_timings(swap.clone(), balance, timings);
    let (callback, mut rx) = capture_callback();

    let wallet = test_wallet();
    let wallet_id = wallet.id;
    registry
        .start(wallet, &fast_settings(5), callback)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(600)).await;

    // gave up without trading, without notifying, and deregistered itself
    assert!(swap.calls().is_empty());
    assert!(rx.try_recv().is_err());
    assert!(registry.status(wallet_id).await.is_none());
    assert!(registry.list().await.is_empty());
}
