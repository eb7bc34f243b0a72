use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER};
use reqwest::redirect::Policy;
use serde_json::{json, Value};

use crate::config::BackendConfig;
use crate::cookies::CookieJar;
use crate::error::{SessionError, SessionResult};
use crate::identity::{Identity, WhoamiResponse};

/// Form submitted to the login endpoint.
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub auth_choice: String,
    pub form_token: String,
}

/// Remote identity backend. The only component that talks HTTP.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /api/users/whoami`
    async fn whoami(&self) -> SessionResult<Identity>;

    /// `GET <login-url>`: priming call that sets the anti-forgery cookie; returns the page body.
    async fn fetch_login_page(&self) -> SessionResult<String>;

    /// `POST <login-url>`; returns the raw HTTP status.
    async fn submit_login(&self, form: &LoginForm, csrf_token: &str) -> SessionResult<u16>;

    /// `POST <logout-url>`
    async fn submit_logout(&self, form_token: &str, csrf_token: &str) -> SessionResult<()>;

    /// `POST /api/setlang`
    async fn set_language(&self, language: &str, csrf_token: &str) -> SessionResult<Value>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Build a client that shares `jar` for every request and sees redirects as-is.
    pub fn new(config: BackendConfig, jar: &CookieJar) -> SessionResult<Self> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar.provider())
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn csrf_headers(&self, csrf_token: &str) -> SessionResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-CSRFToken",
            HeaderValue::from_str(csrf_token)
                .map_err(|_| SessionError::csrf("token is not a valid header value"))?,
        );
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        if let Ok(referer) = HeaderValue::from_str(&self.config.login_url) {
            headers.insert(REFERER, referer);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn whoami(&self) -> SessionResult<Identity> {
        let url = self.url(&self.config.whoami_path);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SessionError::unauthorized(format!("whoami request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::unauthorized(format!("whoami returned {}", status)));
        }

        let body: WhoamiResponse = response
            .json()
            .await
            .map_err(|e| SessionError::unauthorized(format!("invalid whoami payload: {}", e)))?;
        Ok(body.user)
    }

    async fn fetch_login_page(&self) -> SessionResult<String> {
        let response = self
            .client
            .get(&self.config.login_url)
            .header(ACCEPT, "text/html")
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|e| SessionError::csrf(format!("login page unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::csrf(format!("failed to fetch login page: {}", status)));
        }
        response
            .text()
            .await
            .map_err(|e| SessionError::csrf(e.to_string()))
    }

    async fn submit_login(&self, form: &LoginForm, csrf_token: &str) -> SessionResult<u16> {
        let fields = [
            ("username", form.username.as_str()),
            ("password", form.password.as_str()),
            ("ad_choice", form.auth_choice.as_str()),
            ("csrfmiddlewaretoken", form.form_token.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.login_url)
            .headers(self.csrf_headers(csrf_token)?)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .form(&fields)
            .send()
            .await
            .map_err(|e| SessionError::login(format!("cannot reach {}: {}", self.config.login_url, e)))?;

        let status = response.status().as_u16();
        tracing::debug!("POST {} -> {}", self.config.login_url, status);
        Ok(status)
    }

    async fn submit_logout(&self, form_token: &str, csrf_token: &str) -> SessionResult<()> {
        let response = self
            .client
            .post(&self.config.logout_url)
            .headers(self.csrf_headers(csrf_token)?)
            .form(&[("csrfmiddlewaretoken", form_token)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(SessionError::Http(format!("logout returned {}", status)))
        }
    }

    async fn set_language(&self, language: &str, csrf_token: &str) -> SessionResult<Value> {
        let url = self.url(&self.config.setlang_path);
        let response = self
            .client
            .post(&url)
            .headers(self.csrf_headers(csrf_token)?)
            .json(&json!({ "language": language }))
            .send()
            .await
            .map_err(|e| SessionError::locale_update(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::locale_update(format!("setlang returned {}", status)));
        }
        Ok(response.json().await.unwrap_or(Value::Null))
    }
}
