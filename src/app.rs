use std::sync::Arc;

use crate::backend::{Backend, HttpBackend};
use crate::config::AppConfig;
use crate::cookies::CookieJar;
use crate::error::SessionResult;
use crate::host::{Document, Navigator};
use crate::i18n::{Language, TranslationCache};
use crate::identity::Identity;
use crate::locale::{self, LocaleSync, LocaleSyncDeps, LocaleSyncHandle, ReconcileOutcome, Trigger};
use crate::route::{ProtectedRoute, RouteGate};
use crate::session::{Credentials, SessionBelief, SessionGuard};
use crate::storage::{keys, LocalStorage};
use crate::store::{LayoutState, UiStore};

/// Everything the dashboard shell needs, wired once per page load.
///
/// Owns exactly one [`SessionGuard`] and one [`LocaleSync`]; the route gate
/// and protected routes share them.
pub struct Dashboard {
    pub config: AppConfig,
    pub cookies: CookieJar,
    pub storage: LocalStorage,
    pub store: UiStore,
    pub document: Document,
    pub translations: TranslationCache,
    guard: Arc<SessionGuard>,
    locale: Arc<LocaleSync>,
    gate: RouteGate,
}

impl Dashboard {
    /// Wire against the real HTTP backend at `config.backend.base_url`.
    pub fn connect(
        config: AppConfig,
        storage: LocalStorage,
        navigator: Arc<dyn Navigator>,
        browser_language: Option<String>,
    ) -> SessionResult<Self> {
        let cookies = CookieJar::new(&config.backend.base_url)?;
        let backend = Arc::new(HttpBackend::new(config.backend.clone(), &cookies)?);
        Ok(Self::new(config, backend, cookies, storage, navigator, browser_language))
    }

    pub fn new(
        config: AppConfig,
        backend: Arc<dyn Backend>,
        cookies: CookieJar,
        storage: LocalStorage,
        navigator: Arc<dyn Navigator>,
        browser_language: Option<String>,
    ) -> Self {
        let belief = SessionBelief::new(
            storage.clone(),
            cookies.clone(),
            config.session.session_cookie.clone(),
            config.session.transient_tolerance(),
        );
        let guard = Arc::new(SessionGuard::new(
            backend.clone(),
            cookies.clone(),
            belief,
            navigator.clone(),
            config.session.clone(),
            config.backend.login_url.clone(),
        ));

        // Last applied language survives a reload
        let initial = storage
            .get(keys::CURRENT_LANGUAGE)
            .and_then(|code| Language::from_code(&code))
            .unwrap_or_else(|| Language::from_backend(&config.locale.default_language));
        let store = UiStore::new(LayoutState {
            language: initial,
            direction: initial.direction(),
        });
        let document = Document::new();
        document.apply_language(initial);

        let translations = TranslationCache::new();
        let locale = LocaleSync::new(
            config.locale.clone(),
            LocaleSyncDeps {
                cookies: cookies.clone(),
                guard: guard.clone(),
                backend,
                store: store.clone(),
                document: document.clone(),
                storage: storage.clone(),
                navigator: navigator.clone(),
                translations: translations.clone(),
                browser_language,
            },
        );

        let gate = RouteGate::new(
            guard.clone(),
            navigator,
            storage.clone(),
            Some(locale.clone()),
            config.routing.clone(),
            config.backend.login_url.clone(),
        );

        Self {
            config,
            cookies,
            storage,
            store,
            document,
            translations,
            guard,
            locale,
            gate,
        }
    }

    pub fn guard(&self) -> &Arc<SessionGuard> {
        &self.guard
    }

    pub fn locale(&self) -> &Arc<LocaleSync> {
        &self.locale
    }

    pub fn gate(&self) -> &RouteGate {
        &self.gate
    }

    pub fn protected_route(&self) -> ProtectedRoute {
        ProtectedRoute::new(&self.gate)
    }

    /// Start every locale trigger for this page load.
    pub fn start_locale_sync(&self) -> LocaleSyncHandle {
        locale::start(&self.locale)
    }

    /// Log in, then race the login page's locale cookie write with a burst.
    pub async fn login(&self, credentials: &Credentials) -> SessionResult<Identity> {
        let identity = self.guard.login(credentials).await?;
        locale::sync_after_login(&self.locale);
        Ok(identity)
    }

    /// Log in and reconcile the language once before returning, for callers
    /// that exit before a background burst could run.
    pub async fn login_and_sync(
        &self,
        credentials: &Credentials,
    ) -> SessionResult<(Identity, ReconcileOutcome)> {
        let identity = self.guard.login(credentials).await?;
        let outcome = self.locale.reconcile(Trigger::PostLogin);
        Ok((identity, outcome))
    }

    pub async fn logout(&self) {
        self.guard.logout().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessNavigator;
    use crate::i18n::Direction;
    use crate::testing::FakeBackend;

    fn dashboard(storage: LocalStorage) -> (Dashboard, Arc<FakeBackend>) {
        let config = AppConfig::default();
        let cookies = CookieJar::new(&config.backend.base_url).unwrap();
        let backend = Arc::new(FakeBackend::new(cookies.clone()));
        let navigator = Arc::new(HeadlessNavigator::new("/dashboard"));
        let app = Dashboard::new(config, backend.clone(), cookies, storage, navigator, None);
        (app, backend)
    }

    #[tokio::test]
    async fn restores_last_applied_language_on_load() {
        let storage = LocalStorage::in_memory();
        storage.set(keys::CURRENT_LANGUAGE, "ar");
        let (app, _) = dashboard(storage);

        assert_eq!(app.store.state().language, Language::Arabic);
        assert_eq!(app.document.dir(), Some(Direction::Rtl));
        assert_eq!(app.document.lang().as_deref(), Some("ar"));
    }

    #[tokio::test(start_paused = true)]
    async fn login_runs_post_login_burst() {
        let (app, _) = dashboard(LocalStorage::in_memory());
        app.login(&Credentials::new("nora", "secret")).await.unwrap();
        app.cookies.set("django_language", "ar");

        tokio::time::sleep(std::time::Duration::from_secs(4)).await;
        assert_eq!(app.store.state().language, Language::Arabic);
    }

    #[tokio::test]
    async fn login_and_sync_applies_cookie_before_returning() {
        let (app, backend) = dashboard(LocalStorage::in_memory());
        app.cookies.set("django_language", "ar");

        let (identity, outcome) = app
            .login_and_sync(&Credentials::new("nora", "secret"))
            .await
            .unwrap();

        assert_eq!(identity.username, "nora");
        assert!(matches!(outcome, ReconcileOutcome::Applied(_)));
        assert_eq!(app.store.state().language, Language::Arabic);
        assert_eq!(app.document.dir(), Some(Direction::Rtl));
        assert_eq!(backend.login_posts(), 1);
    }
}
