use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use url::Url;

use crate::error::SessionResult;

/// Read access to the cookies the backend shares with this client.
///
/// The jar is the same one the HTTP client writes `Set-Cookie` responses
/// into, so every read reflects the latest server-side mutation. None of
/// these values are authoritative: the backend and the login page write them
/// outside our control.
#[derive(Clone)]
pub struct CookieJar {
    jar: Arc<Jar>,
    origin: Url,
}

impl CookieJar {
    pub fn new(origin: &str) -> SessionResult<Self> {
        Ok(Self {
            jar: Arc::new(Jar::default()),
            origin: Url::parse(origin)?,
        })
    }

    /// Jar to hand to `reqwest::ClientBuilder::cookie_provider`.
    pub fn provider(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Raw `Cookie` header value for the backend origin.
    pub fn raw(&self) -> Option<String> {
        self.jar
            .cookies(&self.origin)
            .and_then(|value| value.to_str().ok().map(|s| s.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let raw = self.raw()?;
        raw.split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&self, name: &str, value: &str) {
        self.jar
            .add_cookie_str(&format!("{}={}; Path=/", name, value), &self.origin);
    }

    pub fn remove(&self, name: &str) {
        self.jar
            .add_cookie_str(&format!("{}=; Path=/; Max-Age=0", name), &self.origin);
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.raw()
            .map(|raw| {
                raw.split(';')
                    .filter_map(|pair| pair.trim().split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn restore(&self, cookies: &BTreeMap<String, String>) {
        for (name, value) in cookies {
            self.set(name, value);
        }
    }
}

impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieJar")
            .field("origin", &self.origin.as_str())
            .field("cookies", &self.snapshot().keys().collect::<Vec<_>>())
            .finish()
    }
}
