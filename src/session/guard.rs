use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::backend::{Backend, LoginForm};
use crate::config::SessionConfig;
use crate::cookies::CookieJar;
use crate::error::{SessionError, SessionResult};
use crate::host::Navigator;
use crate::identity::Identity;
use crate::session::belief::SessionBelief;
use crate::session::csrf::{extract_form_token, AntiForgeryToken};

/// Authentication state of this client.
///
/// `Unknown -> Checking -> {Authenticated, Unauthenticated}`; concurrent
/// entries into `Checking` collapse into one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Unknown,
    Checking,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub auth_choice: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            auth_choice: "local".to_string(),
        }
    }

    pub fn with_auth_choice(mut self, choice: impl Into<String>) -> Self {
        self.auth_choice = choice.into();
        self
    }
}

type Outcome = Option<SessionResult<Identity>>;

struct GuardInner {
    identity: Option<Identity>,
    state: SessionState,
    in_flight: Option<watch::Receiver<Outcome>>,
    last_attempt: Option<Instant>,
    /// When the last successful check finished; cleared by any failure.
    last_success: Option<Instant>,
}

/// How a caller enters `verify`.
enum Entry {
    Cached(Identity),
    Join(watch::Receiver<Outcome>),
    Lead(watch::Sender<Outcome>),
}

/// Single owner of "are we logged in" and "who is it".
///
/// At most one whoami round-trip is outstanding at a time. Callers arriving
/// while it runs share its outcome; callers arriving within the debounce
/// window after a success get the cached identity.
pub struct SessionGuard {
    backend: Arc<dyn Backend>,
    cookies: CookieJar,
    belief: SessionBelief,
    navigator: Arc<dyn Navigator>,
    config: SessionConfig,
    login_url: String,
    inner: Mutex<GuardInner>,
}

impl SessionGuard {
    pub fn new(
        backend: Arc<dyn Backend>,
        cookies: CookieJar,
        belief: SessionBelief,
        navigator: Arc<dyn Navigator>,
        config: SessionConfig,
        login_url: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            cookies,
            belief,
            navigator,
            config,
            login_url: login_url.into(),
            inner: Mutex::new(GuardInner {
                identity: None,
                state: SessionState::Unknown,
                in_flight: None,
                last_attempt: None,
                last_success: None,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.lock().identity.clone()
    }

    pub fn belief(&self) -> &SessionBelief {
        &self.belief
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.inner.lock().last_attempt
    }

    /// Cheap local pre-check: session cookie, persisted flag or cached identity.
    pub fn has_local_evidence(&self) -> bool {
        self.belief.has_evidence() || self.inner.lock().identity.is_some()
    }

    /// Whether a failed check right now would be treated as transient.
    pub fn has_prior_login(&self) -> bool {
        self.belief.tolerates_failure()
    }

    pub async fn verify_identity(&self) -> SessionResult<Identity> {
        self.verify(false).await
    }

    /// `force` skips the debounce and never adopts a check that was already
    /// running: it waits that one out and then leads its own.
    async fn verify(&self, force: bool) -> SessionResult<Identity> {
        let tx = loop {
            match self.enter(force) {
                Entry::Cached(identity) => return Ok(identity),
                Entry::Join(rx) if force => {
                    let _ = Self::join(rx).await;
                }
                Entry::Join(rx) => return Self::join(rx).await,
                Entry::Lead(tx) => break tx,
            }
        };

        let reset = InFlightReset { inner: &self.inner };
        let result = self.backend.whoami().await;
        let result = self.settle(result);
        drop(reset);

        let _ = tx.send(Some(result.clone()));
        result
    }

    fn enter(&self, force: bool) -> Entry {
        let mut inner = self.inner.lock();

        if let Some(rx) = &inner.in_flight {
            tracing::debug!("Identity check already in flight, joining");
            return Entry::Join(rx.clone());
        }

        if !force {
            if let (Some(done), Some(identity)) = (inner.last_success, &inner.identity) {
                if done.elapsed() < self.config.identity_debounce() {
                    tracing::debug!("Identity check debounced, serving cached identity");
                    return Entry::Cached(identity.clone());
                }
            }
        }

        let (tx, rx) = watch::channel(None);
        inner.in_flight = Some(rx);
        inner.last_attempt = Some(Instant::now());
        inner.state = SessionState::Checking;
        Entry::Lead(tx)
    }

    async fn join(mut rx: watch::Receiver<Outcome>) -> SessionResult<Identity> {
        let outcome = rx.wait_for(Option::is_some).await.map(|r| r.clone());
        match outcome {
            Ok(Some(result)) => result,
            _ => Err(SessionError::TransientNetworkFailure(
                "identity check abandoned".to_string(),
            )),
        }
    }

    fn settle(&self, result: SessionResult<Identity>) -> SessionResult<Identity> {
        let mut inner = self.inner.lock();
        inner.in_flight = None;
        inner.last_success = None;

        match result {
            Ok(identity) => {
                inner.last_success = Some(Instant::now());
                tracing::info!("Identity confirmed: {} (id={})", identity.username, identity.id);
                self.belief.record_verified();
                inner.identity = Some(identity.clone());
                inner.state = SessionState::Authenticated;
                Ok(identity)
            }
            Err(err) => {
                if self.belief.tolerates_failure() {
                    tracing::warn!("{}", err.clone().into_transient());
                    inner.state = if inner.identity.is_some() {
                        SessionState::Authenticated
                    } else {
                        SessionState::Unknown
                    };
                } else {
                    tracing::info!("Identity check failed, clearing session evidence: {}", err);
                    inner.identity = None;
                    inner.state = SessionState::Unauthenticated;
                    self.belief.clear();
                }
                Err(match err {
                    SessionError::Unauthorized(_) => err,
                    other => SessionError::Unauthorized(other.to_string()),
                })
            }
        }
    }

    /// Token for state-changing requests. Primes the login page if no cookie is set.
    pub async fn anti_forgery_token(&self) -> SessionResult<AntiForgeryToken> {
        if let Some(token) = self.cookies.get(&self.config.csrf_cookie) {
            return Ok(AntiForgeryToken::from_cookie(token));
        }

        tracing::debug!("No anti-forgery cookie, priming login page");
        let html = self.backend.fetch_login_page().await?;
        let cookie_token = self.cookies.get(&self.config.csrf_cookie).ok_or_else(|| {
            SessionError::csrf("CSRF token not found in cookies after fetching login page")
        })?;
        let form_token = extract_form_token(&html).unwrap_or_else(|| cookie_token.clone());

        Ok(AntiForgeryToken { cookie_token, form_token })
    }

    pub async fn login(&self, credentials: &Credentials) -> SessionResult<Identity> {
        match self.try_login(credentials).await {
            Ok(identity) => Ok(identity),
            Err(err) => {
                tracing::error!("Login error: {}", err);
                self.clear_session();
                Err(match err {
                    SessionError::LoginError(_) | SessionError::CsrfTokenError(_) => err,
                    other => SessionError::login(other.to_string()),
                })
            }
        }
    }

    async fn try_login(&self, credentials: &Credentials) -> SessionResult<Identity> {
        let token = self.anti_forgery_token().await?;

        let form = LoginForm {
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            auth_choice: credentials.auth_choice.clone(),
            form_token: token.form_token.clone(),
        };
        let status = self.backend.submit_login(&form, &token.cookie_token).await?;
        if status != 200 && status != 302 {
            return Err(SessionError::login(format!("backend answered {}", status)));
        }

        self.belief.record_login();
        self.verify(true).await
    }

    /// Best-effort remote logout, then local evidence is dropped and the
    /// browser leaves for the external login page no matter what.
    pub async fn logout(&self) {
        if let Err(e) = self.notify_logout().await {
            tracing::warn!("Logout error (ignored): {}", e);
        }
        self.clear_session();
        self.navigator.hard_navigate(&self.login_url);
    }

    async fn notify_logout(&self) -> SessionResult<()> {
        let token = self.anti_forgery_token().await?;
        self.backend
            .submit_logout(&token.form_token, &token.cookie_token)
            .await
    }

    /// Forget the cached identity and every persisted login marker.
    pub fn clear_session(&self) {
        let mut inner = self.inner.lock();
        inner.identity = None;
        inner.state = SessionState::Unauthenticated;
        inner.last_success = None;
        self.belief.clear();
    }
}

/// Clears the in-flight marker if the leading call is dropped mid-request.
struct InFlightReset<'a> {
    inner: &'a Mutex<GuardInner>,
}

impl Drop for InFlightReset<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.in_flight.take().is_some() && inner.state == SessionState::Checking {
            inner.state = SessionState::Unknown;
        }
    }
}
