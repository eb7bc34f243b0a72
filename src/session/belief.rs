use chrono::Utc;

use crate::cookies::CookieJar;
use crate::storage::{keys, LocalStorage};

/// Client-local approximation of "is there a valid server session".
///
/// Only ever a hint for whether to attempt or skip a network check; the
/// backend stays the source of truth.
#[derive(Clone)]
pub struct SessionBelief {
    storage: LocalStorage,
    cookies: CookieJar,
    session_cookie: String,
    tolerance: chrono::Duration,
}

impl SessionBelief {
    pub fn new(
        storage: LocalStorage,
        cookies: CookieJar,
        session_cookie: impl Into<String>,
        tolerance: chrono::Duration,
    ) -> Self {
        Self {
            storage,
            cookies,
            session_cookie: session_cookie.into(),
            tolerance,
        }
    }

    pub fn has_session_cookie(&self) -> bool {
        self.cookies.contains(&self.session_cookie)
    }

    pub fn was_logged_in(&self) -> bool {
        self.storage.get_bool(keys::WAS_LOGGED_IN)
    }

    pub fn cached_session_id(&self) -> Option<String> {
        self.storage.get(keys::SESSION_ID).filter(|id| !id.is_empty())
    }

    /// Cookie or persisted flag; never touches the network.
    pub fn has_evidence(&self) -> bool {
        self.has_session_cookie() || self.was_logged_in()
    }

    /// Millis since epoch of the most recent login or successful verification.
    pub fn last_confirmed_at(&self) -> Option<i64> {
        let verified = self.storage.get_i64(keys::LAST_VERIFIED_TIME);
        let login = self.storage.get_i64(keys::LAST_LOGIN_TIME);
        verified.max(login)
    }

    /// A prior login excuses a failed check only within the tolerance window.
    pub fn tolerates_failure(&self) -> bool {
        if !self.was_logged_in() {
            return false;
        }
        match self.last_confirmed_at() {
            Some(at) => Utc::now().timestamp_millis() - at < self.tolerance.num_milliseconds(),
            None => false,
        }
    }

    pub fn record_login(&self) {
        let now = Utc::now().timestamp_millis();
        self.storage.set(keys::WAS_LOGGED_IN, "true");
        self.storage.set(keys::LAST_LOGIN_TIME, now.to_string());
        self.remember_session_id();
    }

    pub fn record_verified(&self) {
        self.storage.set(keys::WAS_LOGGED_IN, "true");
        self.storage
            .set(keys::LAST_VERIFIED_TIME, Utc::now().timestamp_millis().to_string());
        self.remember_session_id();
    }

    fn remember_session_id(&self) {
        if let Some(id) = self.cookies.get(&self.session_cookie) {
            self.storage.set(keys::SESSION_ID, id);
        }
    }

    /// Drop every persisted login marker. The redirect stash is left alone.
    pub fn clear(&self) {
        self.storage.set(keys::WAS_LOGGED_IN, "false");
        self.storage.remove(keys::SESSION_ID);
        self.storage.remove(keys::LAST_VERIFIED_TIME);
        self.storage.remove(keys::LAST_LOGIN_TIME);
        self.storage.remove(keys::IS_REDIRECTING);
    }
}
