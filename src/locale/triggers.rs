//! Event sources that re-arm locale reconciliation after the first navigation.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant, MissedTickBehavior};

use crate::host::Visibility;
use crate::locale::sync::{LocaleSync, ReconcileOutcome, Trigger};
use crate::storage::keys;

/// Running trigger tasks. Dropping the handle leaves them running.
pub struct LocaleSyncHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl LocaleSyncHandle {
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }

    /// Stop polling and all listeners.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("Language sync stopped");
    }
}

/// Start every trigger: the startup pass (or post-login burst), cookie
/// polling, visibility and storage listeners.
pub fn start(sync: &Arc<LocaleSync>) -> LocaleSyncHandle {
    let mut tasks = Vec::with_capacity(4);

    if sync.is_from_login_page() || sync.is_fresh_login() {
        tracing::info!("Arrived from login, running post-login language sync");
        if let Some(burst) = sync_after_login(sync) {
            tasks.push(burst);
        }
    } else {
        let this = Arc::clone(sync);
        tasks.push(tokio::spawn(async move {
            sleep(this.config().initial_delay()).await;
            this.reconcile(Trigger::Startup);
        }));
    }

    tasks.push(tokio::spawn(poll_cookie(Arc::clone(sync))));
    tasks.push(tokio::spawn(watch_visibility(Arc::clone(sync))));
    tasks.push(tokio::spawn(watch_storage(Arc::clone(sync))));

    LocaleSyncHandle { tasks }
}

/// Post-login burst: reconcile on the configured schedule to win the race
/// against the login page's own cookie write. `None` if a burst is running.
pub fn sync_after_login(sync: &Arc<LocaleSync>) -> Option<JoinHandle<()>> {
    if !sync.claim_burst() {
        tracing::debug!("Post-login sync already in progress, skipping");
        return None;
    }
    let this = Arc::clone(sync);
    Some(tokio::spawn(async move {
        run_burst(&this).await;
        this.release_burst();
    }))
}

/// The burst schedule on demand, without the single-burst guard.
pub fn force_sync_with_retries(sync: &Arc<LocaleSync>) -> JoinHandle<()> {
    let this = Arc::clone(sync);
    tokio::spawn(async move { run_burst(&this).await })
}

async fn run_burst(sync: &Arc<LocaleSync>) {
    let started = Instant::now();
    for offset in sync.config().burst_schedule() {
        sleep_until(started + offset).await;
        let outcome = sync.reconcile(Trigger::PostLogin);
        tracing::debug!(?offset, ?outcome, "post-login sync pass");
    }
}

async fn poll_cookie(sync: Arc<LocaleSync>) {
    let mut last_seen = sync.cookie_value();
    let mut ticker = tokio::time::interval(sync.config().poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        if let Err(e) = sync.deps.storage.refresh() {
            tracing::warn!("Failed to refresh local storage: {}", e);
        }

        let current = sync.cookie_value();
        if current.is_none() || current == last_seen {
            continue;
        }

        tracing::info!("Language cookie changed: {:?} -> {:?}", last_seen, current);
        match sync.reconcile(Trigger::CookiePoll) {
            // Retry on the next tick
            ReconcileOutcome::Skipped { .. } => {}
            _ => last_seen = current,
        }
    }
}

async fn watch_visibility(sync: Arc<LocaleSync>) {
    let mut rx = sync.deps.document.watch_visibility();
    let mut previous = *rx.borrow_and_update();

    while rx.changed().await.is_ok() {
        let current = *rx.borrow_and_update();
        if previous == Visibility::Hidden && current == Visibility::Visible {
            tracing::debug!("Page became visible, syncing language");
            sleep(sync.config().visibility_delay()).await;
            sync.reconcile(Trigger::Visibility);
        }
        previous = current;
    }
}

async fn watch_storage(sync: Arc<LocaleSync>) {
    let mut rx = sync.deps.storage.subscribe();
    let cookie_key = sync.config().cookie_name.clone();

    loop {
        match rx.recv().await {
            Ok(event) if event.key == cookie_key || event.key == keys::CURRENT_LANGUAGE => {
                tracing::info!("Language changed in another tab: {:?}", event.new_value);
                sleep(sync.config().storage_delay()).await;
                sync.reconcile(Trigger::StorageEvent);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Storage listener lagged by {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
