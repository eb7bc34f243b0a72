use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::backend::{Backend, LoginForm};
use crate::config::AppConfig;
use crate::cookies::CookieJar;
use crate::error::{SessionError, SessionResult};
use crate::host::{Document, HeadlessNavigator, Navigator};
use crate::i18n::TranslationCache;
use crate::identity::Identity;
use crate::locale::{LocaleSync, LocaleSyncDeps};
use crate::route::RouteGate;
use crate::session::{SessionBelief, SessionGuard};
use crate::storage::LocalStorage;
use crate::store::{LayoutState, UiStore};

pub fn sample_identity() -> Identity {
    Identity {
        id: 7,
        username: "nora".to_string(),
        email: "nora@example.com".to_string(),
        first_name: "Nora".to_string(),
        last_name: "Haddad".to_string(),
        language: None,
        permissions: vec!["reports.view".to_string()],
        department: Some("Operations".to_string()),
        title: None,
        is_staff: false,
        is_active: true,
        date_joined: None,
    }
}

/// In-process stand-in for the identity backend. Writes the cookies the real
/// one would set into the shared jar.
pub struct FakeBackend {
    cookies: CookieJar,
    identity: Mutex<Identity>,
    authenticated: AtomicBool,
    latency: Mutex<Duration>,
    login_status: AtomicU16,
    issue_csrf_cookie: AtomicBool,
    logout_fails: AtomicBool,
    setlang_fails: AtomicBool,
    whoami_calls: AtomicUsize,
    login_page_fetches: AtomicUsize,
    login_posts: AtomicUsize,
    last_login: Mutex<Option<LoginForm>>,
    setlang_requests: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    pub fn new(cookies: CookieJar) -> Self {
        Self {
            cookies,
            identity: Mutex::new(sample_identity()),
            authenticated: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
            login_status: AtomicU16::new(302),
            issue_csrf_cookie: AtomicBool::new(true),
            logout_fails: AtomicBool::new(false),
            setlang_fails: AtomicBool::new(false),
            whoami_calls: AtomicUsize::new(0),
            login_page_fetches: AtomicUsize::new(0),
            login_posts: AtomicUsize::new(0),
            last_login: Mutex::new(None),
            setlang_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    pub fn set_login_status(&self, status: u16) {
        self.login_status.store(status, Ordering::SeqCst);
    }

    pub fn set_issue_csrf_cookie(&self, issue: bool) {
        self.issue_csrf_cookie.store(issue, Ordering::SeqCst);
    }

    pub fn set_logout_fails(&self, fails: bool) {
        self.logout_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_setlang_fails(&self, fails: bool) {
        self.setlang_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_identity_language(&self, language: Option<&str>) {
        self.identity.lock().language = language.map(String::from);
    }

    pub fn whoami_calls(&self) -> usize {
        self.whoami_calls.load(Ordering::SeqCst)
    }

    pub fn login_page_fetches(&self) -> usize {
        self.login_page_fetches.load(Ordering::SeqCst)
    }

    pub fn login_posts(&self) -> usize {
        self.login_posts.load(Ordering::SeqCst)
    }

    pub fn last_login(&self) -> Option<LoginForm> {
        self.last_login.lock().clone()
    }

    pub fn setlang_requests(&self) -> Vec<(String, String)> {
        self.setlang_requests.lock().clone()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn whoami(&self) -> SessionResult<Identity> {
        self.whoami_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if self.authenticated.load(Ordering::SeqCst) {
            Ok(self.identity.lock().clone())
        } else {
            Err(SessionError::unauthorized("Not authenticated"))
        }
    }

    async fn fetch_login_page(&self) -> SessionResult<String> {
        self.login_page_fetches.fetch_add(1, Ordering::SeqCst);
        if self.issue_csrf_cookie.load(Ordering::SeqCst) {
            self.cookies.set("csrftoken", "csrf-cookie");
        }
        Ok(r#"<form method="post"><input type="hidden" name="csrfmiddlewaretoken" value="form-token"></form>"#
            .to_string())
    }

    async fn submit_login(&self, form: &LoginForm, _csrf_token: &str) -> SessionResult<u16> {
        self.login_posts.fetch_add(1, Ordering::SeqCst);
        *self.last_login.lock() = Some(form.clone());
        let status = self.login_status.load(Ordering::SeqCst);
        if status == 302 || status == 200 {
            self.cookies.set("sessionid", "session-1");
        }
        Ok(status)
    }

    async fn submit_logout(&self, _form_token: &str, _csrf_token: &str) -> SessionResult<()> {
        if self.logout_fails.load(Ordering::SeqCst) {
            return Err(SessionError::Http("logout returned 500".to_string()));
        }
        self.cookies.remove("sessionid");
        Ok(())
    }

    async fn set_language(&self, language: &str, csrf_token: &str) -> SessionResult<Value> {
        self.setlang_requests
            .lock()
            .push((language.to_string(), csrf_token.to_string()));
        if self.setlang_fails.load(Ordering::SeqCst) {
            return Err(SessionError::locale_update("setlang returned 500"));
        }
        self.cookies.set("django_language", language);
        Ok(json!({ "success": true, "language": language }))
    }
}

/// Fully wired client against a [`FakeBackend`].
pub struct Harness {
    pub config: AppConfig,
    pub backend: Arc<FakeBackend>,
    pub cookies: CookieJar,
    pub storage: LocalStorage,
    pub navigator: HeadlessNavigator,
    pub guard: Arc<SessionGuard>,
    pub store: UiStore,
    pub document: Document,
    pub translations: TranslationCache,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(HeadlessNavigator::new("/dashboard"))
    }

    pub fn with_referrer(referrer: &str) -> Self {
        Self::build(HeadlessNavigator::new("/dashboard").with_referrer(referrer))
    }

    fn build(navigator: HeadlessNavigator) -> Self {
        let config = AppConfig::default();
        let cookies = CookieJar::new(&config.backend.base_url).expect("valid test origin");
        let storage = LocalStorage::in_memory();
        let backend = Arc::new(FakeBackend::new(cookies.clone()));
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
            Arc::new(navigator.clone()),
            config.session.clone(),
            config.backend.login_url.clone(),
        ));

        Self {
            config,
            backend,
            cookies,
            storage,
            navigator,
            guard,
            store: UiStore::new(LayoutState::default()),
            document: Document::new(),
            translations: TranslationCache::new(),
        }
    }

    fn navigator_handle(&self) -> Arc<dyn Navigator> {
        Arc::new(self.navigator.clone())
    }

    pub fn locale_sync(&self) -> Arc<LocaleSync> {
        LocaleSync::new(
            self.config.locale.clone(),
            LocaleSyncDeps {
                cookies: self.cookies.clone(),
                guard: self.guard.clone(),
                backend: self.backend.clone(),
                store: self.store.clone(),
                document: self.document.clone(),
                storage: self.storage.clone(),
                navigator: self.navigator_handle(),
                translations: self.translations.clone(),
                browser_language: None,
            },
        )
    }

    pub fn route_gate(&self) -> RouteGate {
        self.gate(None)
    }

    pub fn route_gate_with_locale(&self) -> RouteGate {
        self.gate(Some(self.locale_sync()))
    }

    fn gate(&self, locale: Option<Arc<LocaleSync>>) -> RouteGate {
        RouteGate::new(
            self.guard.clone(),
            self.navigator_handle(),
            self.storage.clone(),
            locale,
            self.config.routing.clone(),
            self.config.backend.login_url.clone(),
        )
    }
}
