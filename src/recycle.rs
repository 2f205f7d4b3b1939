//! Terminal recycle handling.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::types::{short_key, CycleCallback, Wallet};

/// External hook fired when a wallet retires.
///
/// Moving remaining funds out of the retiring wallet and creating a
/// replacement are the owning system's job; the orchestrator only signals
/// the event. Hook failures are logged and never fatal.
#[async_trait]
pub trait RecycleHook: Send + Sync {
    async fn on_recycle(&self, wallet: &Wallet) -> anyhow::Result<()>;
}

/// Emits the terminal recycle notification for a bot.
pub(crate) struct RecycleCoordinator {
    hook: Option<Arc<dyn RecycleHook>>,
    on_cycle_complete: CycleCallback,
}

impl RecycleCoordinator {
    pub(crate) fn new(hook: Option<Arc<dyn RecycleHook>>, on_cycle_complete: CycleCallback) -> Self {
        Self {
            hook,
            on_cycle_complete,
        }
    }

    /// Runs exactly once, on entering the recycling phase.
    pub(crate) async fn recycle(&self, wallet: &Wallet, cycles_completed: u32) {
        info!(
            "Wallet {}... reached {} cycles, recycling",
            short_key(&wallet.public_key),
            cycles_completed
        );

        match &self.hook {
            Some(hook) => {
                if let Err(err) = hook.on_recycle(wallet).await {
                    warn!(
                        "Recycle hook failed for wallet {}...: {:#}",
                        short_key(&wallet.public_key),
                        err
                    );
                }
            }
            None => {
                warn!(
                    "No recycle hook installed; funds remain in retired wallet {}...",
                    short_key(&wallet.public_key)
                );
            }
        }

        (self.on_cycle_complete)(wallet.id, cycles_completed, true);
    }
}
