//! Periodic directory refresh.
//!
//! # Responsibility
//! - Re-fetch the directory on a fixed period and replace the cache.
//! - Guarantee that at most one fetch-and-replace cycle is in flight.
//!
//! # Invariants
//! - The refresh gate is held for the whole fetch-and-replace cycle.
//! - A periodic tick that finds the gate held is skipped, never queued.
//! - Refreshes after a write wait for the gate instead of skipping, so the
//!   cache reflects the write.
//! - Background failures are logged only; the previous cache stays valid.
//! - Stopping the handle cancels the timer and any in-flight cycle.

use crate::cache::DirectorySnapshot;
use crate::classify::FailureOrigin;
use crate::client::ContactsApi;
use crate::error::{DirectoryResult, ErrorKind};
use crate::model::contact::Contact;
use crate::observer::{report_failure, DirectoryObserver};
use crate::query::QueryEngine;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Result of one refresh tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cache replaced with a new generation.
    Replaced { generation: u64, contacts: usize },
    /// Another cycle was in flight; nothing was fetched.
    Skipped,
    /// Fetch failed; cache left untouched.
    Failed(ErrorKind),
}

/// Fetches the directory and swaps the cache, one cycle at a time.
pub struct RefreshScheduler {
    api: Arc<dyn ContactsApi>,
    engine: Arc<QueryEngine>,
    observer: Arc<dyn DirectoryObserver>,
    period: Duration,
    gate: Arc<Mutex<()>>,
}

impl RefreshScheduler {
    pub fn new(
        api: Arc<dyn ContactsApi>,
        engine: Arc<QueryEngine>,
        observer: Arc<dyn DirectoryObserver>,
        period: Duration,
    ) -> Self {
        Self {
            api,
            engine,
            observer,
            period,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> RefreshState {
        match self.gate.try_lock() {
            Ok(_) => RefreshState::Idle,
            Err(_) => RefreshState::Refreshing,
        }
    }

    /// Runs one periodic refresh unless a cycle is already in flight.
    pub async fn tick(&self) -> RefreshOutcome {
        let Ok(guard) = Arc::clone(&self.gate).try_lock_owned() else {
            debug!("event=refresh_tick module=refresh status=skipped reason=in_flight");
            return RefreshOutcome::Skipped;
        };

        match self.run_cycle(guard).await {
            Ok(snapshot) => RefreshOutcome::Replaced {
                generation: snapshot.generation(),
                contacts: snapshot.contacts().len(),
            },
            Err(err) => {
                let classification =
                    report_failure(self.observer.as_ref(), &err, FailureOrigin::Refresh);
                RefreshOutcome::Failed(classification.kind)
            }
        }
    }

    /// Fetches and replaces the cache, waiting for any in-flight cycle.
    ///
    /// Used for the initial load and after writes; the caller classifies
    /// failures with its own origin.
    pub async fn refresh_now(&self) -> DirectoryResult<Arc<DirectorySnapshot>> {
        let guard = Arc::clone(&self.gate).lock_owned().await;
        self.run_cycle(guard).await
    }

    /// Starts the periodic timer. The first tick fires one period from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let scheduler = Arc::clone(self);
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut in_flight = JoinSet::new();
            info!(
                "event=refresh_started module=refresh status=ok period_ms={}",
                period.as_millis()
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let scheduler = Arc::clone(&scheduler);
                        in_flight.spawn(async move { scheduler.tick().await });
                    }
                    Some(_) = in_flight.join_next() => {}
                }
            }

            in_flight.shutdown().await;
            info!("event=refresh_stopped module=refresh status=ok");
        });

        RefreshHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn run_cycle(
        &self,
        _guard: OwnedMutexGuard<()>,
    ) -> DirectoryResult<Arc<DirectorySnapshot>> {
        let raw = self.api.fetch_all().await?;
        let contacts = raw.into_iter().map(Contact::from_raw).collect::<Vec<_>>();
        let snapshot = self.engine.cache().replace(contacts);
        let visible = self.engine.visible_contacts();
        self.observer.directory_replaced(&snapshot, &visible);
        Ok(snapshot)
    }
}

/// Owner of a running refresh timer.
///
/// Dropping the handle cancels the timer; `stop` also waits for teardown.
pub struct RefreshHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Cancels the timer and any in-flight cycle, then waits for both.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
