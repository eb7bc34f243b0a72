use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::RoutingConfig;
use crate::host::Navigator;
use crate::locale::{LocaleSync, Trigger};
use crate::route::login_redirect_url;
use crate::session::SessionGuard;
use crate::storage::{keys, LocalStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateSkip {
    RedirectInProgress,
    AlreadyChecked,
}

/// What the gate did for one route change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Skipped { reason: GateSkip },
    Render,
    RedirectedAfterLogin { to: String },
    RedirectedInApp { to: String },
    RedirectedToLogin { url: String },
    /// Check failed but a recent login excuses it; content stays up.
    Tolerated { error: String },
    StayOnLogin,
    /// The mount went away while the check was pending.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateView {
    Nothing,
    Children,
}

impl GateDecision {
    pub fn view(&self) -> GateView {
        match self {
            GateDecision::Render
            | GateDecision::Tolerated { .. }
            | GateDecision::StayOnLogin
            | GateDecision::Skipped { reason: GateSkip::AlreadyChecked } => GateView::Children,
            _ => GateView::Nothing,
        }
    }
}

pub(crate) struct GateShared {
    pub(crate) guard: Arc<SessionGuard>,
    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) storage: LocalStorage,
    locale: Option<Arc<LocaleSync>>,
    pub(crate) config: RoutingConfig,
    login_url: String,
    redirecting: AtomicBool,
}

impl GateShared {
    fn is_redirecting(&self) -> bool {
        self.redirecting.load(Ordering::SeqCst)
    }

    /// Take the redirect lock; released after the grace period so the router can settle.
    fn begin_redirect(self: &Arc<Self>) -> bool {
        if self
            .redirecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.storage.set(keys::IS_REDIRECTING, "true");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(this.config.redirect_grace()).await;
            this.redirecting.store(false, Ordering::SeqCst);
            this.storage.remove(keys::IS_REDIRECTING);
        });
        true
    }
}

/// Navigation-time gate in front of the protected app shell.
///
/// Trusts only the external login page: unauthenticated visitors are sent
/// there with a `next` parameter pointing back at the path they wanted.
#[derive(Clone)]
pub struct RouteGate {
    shared: Arc<GateShared>,
}

impl RouteGate {
    pub fn new(
        guard: Arc<SessionGuard>,
        navigator: Arc<dyn Navigator>,
        storage: LocalStorage,
        locale: Option<Arc<LocaleSync>>,
        config: RoutingConfig,
        login_url: impl Into<String>,
    ) -> Self {
        Self {
            shared: Arc::new(GateShared {
                guard,
                navigator,
                storage,
                locale,
                config,
                login_url: login_url.into(),
                redirecting: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn shared(&self) -> Arc<GateShared> {
        Arc::clone(&self.shared)
    }

    pub fn is_redirecting(&self) -> bool {
        self.shared.is_redirecting()
    }

    /// A fresh mount starts with an empty checked-path set.
    pub fn mount(&self) -> GateMount {
        GateMount {
            shared: Arc::clone(&self.shared),
            state: Arc::new(Mutex::new(MountState {
                mounted: true,
                checked: HashSet::new(),
            })),
        }
    }
}

struct MountState {
    mounted: bool,
    checked: HashSet<String>,
}

/// One mounted instance of the gate.
#[derive(Clone)]
pub struct GateMount {
    shared: Arc<GateShared>,
    state: Arc<Mutex<MountState>>,
}

impl GateMount {
    pub fn unmount(&self) {
        let mut state = self.state.lock();
        state.mounted = false;
        state.checked.clear();
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    /// Run the gate for a path change. Callers render nothing until it returns.
    pub async fn on_route(&self, path: &str) -> GateDecision {
        let shared = &self.shared;
        let on_login = path == shared.config.login_route;

        if shared.is_redirecting() {
            tracing::debug!("Redirect in progress, skipping check for {}", path);
            return GateDecision::Skipped { reason: GateSkip::RedirectInProgress };
        }

        {
            let mut state = self.state.lock();
            if !on_login && state.checked.contains(path) {
                return GateDecision::Skipped { reason: GateSkip::AlreadyChecked };
            }
            state.checked.insert(path.to_string());
        }

        let result = shared.guard.verify_identity().await;

        if !self.is_mounted() {
            tracing::debug!("Gate unmounted while checking {}, dropping result", path);
            return GateDecision::Dropped;
        }

        match result {
            Ok(_) => {
                if let Some(locale) = &shared.locale {
                    locale.reconcile(Trigger::RouteGate);
                }
                if on_login {
                    self.leave_login()
                } else {
                    GateDecision::Render
                }
            }
            Err(err) => {
                if shared.guard.has_prior_login() {
                    tracing::warn!("Auth check failed after a recent login, keeping session: {}", err);
                    return GateDecision::Tolerated { error: err.to_string() };
                }

                shared.guard.clear_session();
                if on_login {
                    return GateDecision::StayOnLogin;
                }

                if !shared.begin_redirect() {
                    return GateDecision::Skipped { reason: GateSkip::RedirectInProgress };
                }
                shared.storage.set(keys::REDIRECT_AFTER_LOGIN, path);
                let url = login_redirect_url(&shared.login_url, path);
                tracing::info!("Not authenticated on {}, redirecting to login", path);
                shared.navigator.hard_navigate(&url);
                GateDecision::RedirectedToLogin { url }
            }
        }
    }

    /// Authenticated on the login path: go to the stashed target and clear it.
    fn leave_login(&self) -> GateDecision {
        let shared = &self.shared;
        if !shared.begin_redirect() {
            return GateDecision::Skipped { reason: GateSkip::RedirectInProgress };
        }

        let target = shared
            .storage
            .get(keys::REDIRECT_AFTER_LOGIN)
            .filter(|p| !p.is_empty() && *p != shared.config.login_route)
            .unwrap_or_else(|| shared.config.default_landing.clone());
        shared.storage.remove(keys::REDIRECT_AFTER_LOGIN);

        tracing::info!("Authenticated on login page, redirecting to {}", target);
        shared.navigator.navigate(&target);
        GateDecision::RedirectedAfterLogin { to: target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NavigationRecord;
    use crate::session::Credentials;
    use crate::testing::Harness;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn fresh_unauthenticated_visit_redirects_with_next() {
        let h = Harness::new();
        h.backend.set_authenticated(false);
        let gate = h.route_gate();

        assert!(!h.guard.has_local_evidence());
        let decision = gate.mount().on_route("/reports").await;

        let expected = "http://localhost:8000/login/?next=%2F%23%2Freports".to_string();
        assert_eq!(decision, GateDecision::RedirectedToLogin { url: expected.clone() });
        assert_eq!(decision.view(), GateView::Nothing);
        assert_eq!(h.storage.get(keys::REDIRECT_AFTER_LOGIN).as_deref(), Some("/reports"));
        assert_eq!(h.navigator.last(), Some(NavigationRecord::External(expected)));
    }

    #[tokio::test(start_paused = true)]
    async fn redirect_stash_round_trip() {
        let h = Harness::new();
        h.backend.set_authenticated(false);
        let gate = h.route_gate();
        gate.mount().on_route("/reports").await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        h.backend.set_authenticated(true);
        h.guard.login(&Credentials::new("nora", "secret")).await.unwrap();
        let decision = gate.mount().on_route("/login").await;

        assert_eq!(decision, GateDecision::RedirectedAfterLogin { to: "/reports".into() });
        assert_eq!(h.storage.get(keys::REDIRECT_AFTER_LOGIN), None);

        // A later login does not reuse the stale stash
        tokio::time::sleep(Duration::from_secs(3)).await;
        h.guard.login(&Credentials::new("nora", "secret")).await.unwrap();
        let decision = gate.mount().on_route("/login").await;
        assert_eq!(decision, GateDecision::RedirectedAfterLogin { to: "/dashboard".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn checked_paths_are_skipped_except_login() {
        let h = Harness::new();
        let gate = h.route_gate();
        let mount = gate.mount();

        assert_eq!(mount.on_route("/orders").await, GateDecision::Render);
        assert_eq!(
            mount.on_route("/orders").await,
            GateDecision::Skipped { reason: GateSkip::AlreadyChecked }
        );

        // Remount checks again
        tokio::time::sleep(Duration::from_secs(3)).await;
        mount.unmount();
        assert_eq!(gate.mount().on_route("/orders").await, GateDecision::Render);
        assert_eq!(h.backend.whoami_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn redirect_lock_blocks_overlapping_checks_until_grace_expires() {
        let h = Harness::new();
        let gate = h.route_gate();
        h.guard.verify_identity().await.unwrap();

        let first = gate.mount().on_route("/login").await;
        assert!(matches!(first, GateDecision::RedirectedAfterLogin { .. }));
        assert!(gate.is_redirecting());
        assert!(h.storage.get_bool(keys::IS_REDIRECTING));

        let second = gate.mount().on_route("/login").await;
        assert_eq!(second, GateDecision::Skipped { reason: GateSkip::RedirectInProgress });

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!gate.is_redirecting());
        assert!(!h.storage.get_bool(keys::IS_REDIRECTING));
    }

    #[tokio::test(start_paused = true)]
    async fn recent_login_tolerates_failed_check() {
        let h = Harness::new();
        h.guard.login(&Credentials::new("nora", "secret")).await.unwrap();
        h.backend.set_authenticated(false);
        tokio::time::sleep(Duration::from_secs(3)).await;

        let decision = h.route_gate().mount().on_route("/reports").await;

        assert!(matches!(decision, GateDecision::Tolerated { .. }));
        assert_eq!(decision.view(), GateView::Children);
        assert!(h.navigator.history().iter().all(|r| !matches!(r, NavigationRecord::External(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_on_login_path_stays_put() {
        let h = Harness::new();
        h.backend.set_authenticated(false);
        let decision = h.route_gate().mount().on_route("/login").await;
        assert_eq!(decision, GateDecision::StayOnLogin);
        assert!(h.navigator.history().is_empty());
        assert_eq!(h.storage.get(keys::REDIRECT_AFTER_LOGIN), None);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_while_pending_drops_result() {
        let h = Harness::new();
        h.backend.set_authenticated(false);
        h.backend.set_latency(Duration::from_millis(500));
        let mount = h.route_gate().mount();

        let pending = {
            let mount = mount.clone();
            tokio::spawn(async move { mount.on_route("/reports").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        mount.unmount();

        assert_eq!(pending.await.unwrap(), GateDecision::Dropped);
        assert!(h.navigator.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_identity_triggers_locale_sync() {
        let h = Harness::new();
        h.cookies.set("django_language", "ar");
        let decision = h.route_gate_with_locale().mount().on_route("/chat").await;

        assert_eq!(decision, GateDecision::Render);
        assert_eq!(h.store.state().language, crate::i18n::Language::Arabic);
    }
}
