use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

use crate::backend::Backend;
use crate::config::LocaleConfig;
use crate::cookies::CookieJar;
use crate::error::{SessionError, SessionResult};
use crate::host::{DomEvent, Document, Navigator};
use crate::i18n::{Language, TranslationCache};
use crate::locale::resolve::{is_applied, plan_change, resolve_target, LocaleChange, LocaleSnapshot, LocaleSource};
use crate::session::SessionGuard;
use crate::storage::{keys, LocalStorage};
use crate::store::{LayoutAction, UiStore};

/// What asked for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Startup,
    Visibility,
    CookiePoll,
    StorageEvent,
    PostLogin,
    RouteGate,
    Manual,
}

impl Trigger {
    /// Cookie polls only fire on an observed change and bursts race the
    /// login page's cookie write; neither may be swallowed by the debounce.
    fn bypasses_debounce(&self) -> bool {
        matches!(self, Trigger::CookiePoll | Trigger::PostLogin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InProgress,
    Debounced,
}

/// One applied reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncAttempt {
    pub change: LocaleChange,
    pub source: LocaleSource,
    pub trigger: Trigger,
    /// Store and document agreed with the target right after applying.
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Skipped { reason: SkipReason },
    Unchanged { language: Language },
    Applied(SyncAttempt),
}

/// Result of the delayed check that follows an applied change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    Confirmed,
    Superseded,
    Reloaded { attempt: u32 },
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocaleDebugState {
    pub cookie: Option<String>,
    pub identity_language: Option<String>,
    pub store_language: Language,
    pub document_dir: Option<String>,
    pub browser_language: Option<String>,
    pub target: Language,
    pub source: LocaleSource,
    pub in_progress: bool,
    pub last_sync_ms_ago: Option<u128>,
    pub reload_attempts: i64,
    pub from_login_page: bool,
}

#[derive(Default)]
struct SyncState {
    in_progress: bool,
    last_sync: Option<Instant>,
    burst_active: bool,
}

/// Everything LocaleSync reads from or writes to.
pub struct LocaleSyncDeps {
    pub cookies: CookieJar,
    pub guard: Arc<SessionGuard>,
    pub backend: Arc<dyn Backend>,
    pub store: UiStore,
    pub document: Document,
    pub storage: LocalStorage,
    pub navigator: Arc<dyn Navigator>,
    pub translations: TranslationCache,
    pub browser_language: Option<String>,
}

/// Keeps the store's language and direction in line with the locale cookie.
///
/// Every trigger funnels into [`LocaleSync::reconcile`], which is idempotent:
/// re-running it against an unchanged cookie is a no-op.
pub struct LocaleSync {
    pub(crate) config: LocaleConfig,
    pub(crate) deps: LocaleSyncDeps,
    default_language: Language,
    state: Mutex<SyncState>,
}

/// Clears the in-progress flag when a pass ends, however it ends.
struct PassGuard<'a> {
    state: &'a Mutex<SyncState>,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().in_progress = false;
    }
}

impl LocaleSync {
    pub fn new(config: LocaleConfig, deps: LocaleSyncDeps) -> Arc<Self> {
        let default_language = Language::from_backend(&config.default_language);
        Arc::new(Self {
            config,
            deps,
            default_language,
            state: Mutex::new(SyncState::default()),
        })
    }

    pub fn config(&self) -> &LocaleConfig {
        &self.config
    }

    /// Raw locale cookie value; the poller compares this between ticks.
    pub fn cookie_value(&self) -> Option<String> {
        self.deps.cookies.get(&self.config.cookie_name)
    }

    pub fn snapshot(&self) -> LocaleSnapshot {
        LocaleSnapshot {
            cookie: self.cookie_value(),
            identity_language: self
                .deps
                .guard
                .current_identity()
                .and_then(|identity| identity.language),
            browser_language: self.deps.browser_language.clone(),
        }
    }

    pub fn current_language(&self) -> Language {
        self.deps.store.state().language
    }

    fn begin(&self, bypass_debounce: bool) -> Result<PassGuard<'_>, SkipReason> {
        let mut state = self.state.lock();
        if state.in_progress {
            return Err(SkipReason::InProgress);
        }
        if !bypass_debounce {
            if let Some(last) = state.last_sync {
                if last.elapsed() < self.config.sync_debounce() {
                    return Err(SkipReason::Debounced);
                }
            }
        }
        state.in_progress = true;
        state.last_sync = Some(Instant::now());
        Ok(PassGuard { state: &self.state })
    }

    pub fn reconcile(self: &Arc<Self>, trigger: Trigger) -> ReconcileOutcome {
        let _pass = match self.begin(trigger.bypasses_debounce()) {
            Ok(pass) => pass,
            Err(reason) => {
                tracing::debug!(?trigger, ?reason, "Language sync skipped");
                return ReconcileOutcome::Skipped { reason };
            }
        };

        self.deps
            .storage
            .set(keys::LAST_SYNC_TIME, Utc::now().timestamp_millis().to_string());

        let (target, source) = resolve_target(&self.snapshot(), self.default_language);
        let Some(change) = plan_change(&self.deps.store.state(), target) else {
            tracing::debug!(?trigger, "Language already {}, no change needed", target);
            return ReconcileOutcome::Unchanged { language: target };
        };

        tracing::info!(?trigger, ?source, "Language change: {} -> {}", change.from, change.to);
        let verified = self.apply(change);
        self.schedule_verification(target);

        ReconcileOutcome::Applied(SyncAttempt {
            change,
            source,
            trigger,
            verified,
        })
    }

    /// Push a change through every lightweight channel, then re-read it back.
    fn apply(&self, change: LocaleChange) -> bool {
        let deps = &self.deps;
        deps.translations.invalidate(change.from);
        deps.translations.invalidate(change.to);

        deps.store.dispatch(LayoutAction::ChangeLanguage(change.to));
        deps.store.dispatch(LayoutAction::ChangeDirection(change.direction));
        deps.document.apply_language(change.to);
        deps.storage.set(keys::CURRENT_LANGUAGE, change.to.code());
        deps.document
            .dispatch_event(DomEvent::LanguageChanged { language: change.to });

        if self.is_change_applied(change.to) {
            return true;
        }

        tracing::warn!("Store did not take language {}, dispatching again", change.to);
        deps.store.dispatch(LayoutAction::ChangeLanguage(change.to));
        deps.store.dispatch(LayoutAction::ChangeDirection(change.direction));
        deps.document.apply_language(change.to);
        self.is_change_applied(change.to)
    }

    fn schedule_verification(self: &Arc<Self>, target: Language) {
        let this = Arc::clone(self);
        let delay = self.config.verify_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.finish_verification(target);
        });
    }

    /// Terminal check for an applied change. A full reload is the bounded
    /// last resort; the attempt counter lives in storage so it survives the
    /// reload it causes.
    pub fn finish_verification(&self, target: Language) -> Verification {
        let (current_target, _) = resolve_target(&self.snapshot(), self.default_language);
        if current_target != target {
            tracing::debug!("Verification for {} superseded by {}", target, current_target);
            return Verification::Superseded;
        }

        if self.is_change_applied(target) {
            self.deps.storage.remove(keys::LOCALE_RELOAD_ATTEMPTS);
            tracing::debug!("Language change to {} applied, no refresh needed", target);
            return Verification::Confirmed;
        }

        let attempt = self
            .deps
            .storage
            .get_i64(keys::LOCALE_RELOAD_ATTEMPTS)
            .unwrap_or(0)
            .max(0) as u32
            + 1;
        self.deps
            .storage
            .set(keys::LOCALE_RELOAD_ATTEMPTS, attempt.to_string());

        if attempt > self.config.max_reload_attempts {
            tracing::warn!("Max reload attempts reached, not reloading again");
            return Verification::Exhausted;
        }

        tracing::warn!("Language change to {} not applied, reloading (attempt {})", target, attempt);
        self.deps.navigator.reload();
        Verification::Reloaded { attempt }
    }

    pub fn is_change_applied(&self, target: Language) -> bool {
        is_applied(&self.deps.store.state(), self.deps.document.dir(), target)
    }

    /// Explicit user choice: the backend must acknowledge before the UI moves.
    pub async fn change_language(self: &Arc<Self>, target: Language) -> SessionResult<()> {
        let _pass = self
            .begin(true)
            .map_err(|_| SessionError::locale_update("language sync already in progress"))?;

        let token = self
            .deps
            .guard
            .anti_forgery_token()
            .await
            .map_err(|e| SessionError::locale_update(e.to_string()))?;

        let result = self
            .deps
            .backend
            .set_language(target.code(), &token.cookie_token)
            .await
            .map_err(|e| match e {
                SessionError::LocaleUpdateError(_) => e,
                other => SessionError::locale_update(other.to_string()),
            })?;
        tracing::debug!("Language update acknowledged: {}", result);

        if let Some(change) = plan_change(&self.deps.store.state(), target) {
            self.apply(change);
        }
        tracing::info!("Language changed to {}", target);
        Ok(())
    }

    /// Cheap comparison of cookie-implied language and store; mutates nothing.
    pub fn quick_sync_check(&self) -> bool {
        let expected = self
            .cookie_value()
            .map(|c| Language::from_backend(&c))
            .unwrap_or(Language::English);
        self.current_language() == expected
    }

    /// Whether the identity's stored preference matches the store.
    pub fn is_language_synchronized(&self) -> bool {
        match self.deps.guard.current_identity().and_then(|i| i.language) {
            Some(language) => Language::from_backend(&language) == self.current_language(),
            None => true,
        }
    }

    pub fn is_from_login_page(&self) -> bool {
        match self.deps.navigator.referrer() {
            Some(referrer) => self
                .config
                .login_referrer_markers
                .iter()
                .any(|marker| referrer.contains(marker.as_str())),
            None => false,
        }
    }

    pub fn is_fresh_login(&self) -> bool {
        match self.deps.storage.get_i64(keys::LAST_LOGIN_TIME) {
            Some(at) => {
                Utc::now().timestamp_millis() - at < self.config.fresh_login_window().num_milliseconds()
            }
            None => false,
        }
    }

    /// Claim the post-login burst slot; false if a burst is already running.
    pub(crate) fn claim_burst(&self) -> bool {
        let mut state = self.state.lock();
        if state.burst_active {
            return false;
        }
        state.burst_active = true;
        true
    }

    pub(crate) fn release_burst(&self) {
        self.state.lock().burst_active = false;
    }

    pub fn debug_state(&self) -> LocaleDebugState {
        let snapshot = self.snapshot();
        let (target, source) = resolve_target(&snapshot, self.default_language);
        let state = self.state.lock();
        LocaleDebugState {
            cookie: snapshot.cookie,
            identity_language: snapshot.identity_language,
            store_language: self.current_language(),
            document_dir: self.deps.document.dir().map(|d| d.as_str().to_string()),
            browser_language: snapshot.browser_language,
            target,
            source,
            in_progress: state.in_progress,
            last_sync_ms_ago: state.last_sync.map(|t| t.elapsed().as_millis()),
            reload_attempts: self.deps.storage.get_i64(keys::LOCALE_RELOAD_ATTEMPTS).unwrap_or(0),
            from_login_page: self.is_from_login_page(),
        }
    }
}
