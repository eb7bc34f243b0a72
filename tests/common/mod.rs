#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use dashboard_session::config::AppConfig;
use dashboard_session::host::HeadlessNavigator;
use dashboard_session::storage::LocalStorage;
use dashboard_session::Dashboard;

const CSRF_TOKEN: &str = "csrf-abc123";
const FORM_TOKEN: &str = "form-abc123";

#[derive(Default)]
struct MockState {
    /// session id -> username
    sessions: Mutex<HashMap<String, String>>,
    /// username -> stored language preference
    languages: Mutex<HashMap<String, String>>,
    next_session: AtomicUsize,
    whoami_calls: AtomicUsize,
    setlang_calls: AtomicUsize,
}

/// In-process stand-in for the Django identity backend.
pub struct MockBackend {
    pub port: u16,
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockBackend {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let state = Arc::new(MockState::default());

        let app = Router::new()
            .route("/api/users/whoami", get(whoami))
            .route("/login", get(login_page).post(login_submit))
            .route("/logout", post(logout))
            .route("/api/setlang", post(setlang))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock backend")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { port, base_url, state })
    }

    /// Stored preference the backend hands out on login and in whoami.
    pub fn set_user_language(&self, username: &str, language: &str) {
        self.state
            .languages
            .lock()
            .unwrap()
            .insert(username.to_string(), language.to_string());
    }

    pub fn user_language(&self, username: &str) -> Option<String> {
        self.state.languages.lock().unwrap().get(username).cloned()
    }

    /// Drop every server-side session, as if they expired.
    pub fn expire_sessions(&self) {
        self.state.sessions.lock().unwrap().clear();
    }

    pub fn whoami_calls(&self) -> usize {
        self.state.whoami_calls.load(Ordering::SeqCst)
    }

    pub fn setlang_calls(&self) -> usize {
        self.state.setlang_calls.load(Ordering::SeqCst)
    }

    /// Development defaults pointed at this backend, with short timers.
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default().with_base_url(&self.base_url);
        config.routing.redirect_grace_ms = 20;
        config.locale.sync_debounce_ms = 50;
        config.locale.initial_delay_ms = 10;
        config.locale.poll_interval_ms = 100;
        config.locale.verify_delay_ms = 100;
        config.locale.burst_schedule_ms = vec![0, 50, 150];
        config
    }

    pub fn dashboard(&self, path: &str) -> Result<(Dashboard, HeadlessNavigator)> {
        let navigator = HeadlessNavigator::new(path);
        let app = Dashboard::connect(
            self.config(),
            LocalStorage::in_memory(),
            Arc::new(navigator.clone()),
            None,
        )?;
        Ok((app, navigator))
    }
}

fn cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn csrf_ok(headers: &HeaderMap) -> bool {
    let header_token = headers.get("X-CSRFToken").and_then(|v| v.to_str().ok());
    let cookie_token = cookies(headers).get("csrftoken").cloned();
    header_token.is_some() && header_token.map(String::from) == cookie_token
}

async fn whoami(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.whoami_calls.fetch_add(1, Ordering::SeqCst);

    let session = cookies(&headers).get("sessionid").cloned();
    let username = session.and_then(|id| state.sessions.lock().unwrap().get(&id).cloned());
    match username {
        Some(username) => {
            let language = state.languages.lock().unwrap().get(&username).cloned();
            Json(json!({
                "user": {
                    "id": 7,
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "first_name": "Nora",
                    "last_name": "Haddad",
                    "language": language,
                    "permissions": ["reports.view"],
                    "is_staff": false,
                    "is_active": true
                }
            }))
            .into_response()
        }
        None => (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Authentication credentials were not provided." })))
            .into_response(),
    }
}

async fn login_page() -> Response {
    let body = format!(
        r#"<html><body><form method="post"><input type="hidden" name="csrfmiddlewaretoken" value="{}"></form></body></html>"#,
        FORM_TOKEN
    );
    (
        [(header::SET_COOKIE, format!("csrftoken={}; Path=/", CSRF_TOKEN))],
        Html(body),
    )
        .into_response()
}

async fn login_submit(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    if !csrf_ok(&headers) || form.get("csrfmiddlewaretoken").map(String::as_str) != Some(FORM_TOKEN) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let username = form.get("username").cloned().unwrap_or_default();
    let password = form.get("password").cloned().unwrap_or_default();
    if password != "secret" {
        // Django re-renders the form with 200 on bad credentials
        return Html("<html><body>Please enter a correct username and password.</body></html>").into_response();
    }

    let id = format!("session-{}", state.next_session.fetch_add(1, Ordering::SeqCst) + 1);
    state.sessions.lock().unwrap().insert(id.clone(), username.clone());

    let mut response = (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response();
    let set_cookies = response.headers_mut();
    if let Ok(value) = format!("sessionid={}; Path=/", id).parse() {
        set_cookies.append(header::SET_COOKIE, value);
    }
    if let Some(language) = state.languages.lock().unwrap().get(&username) {
        if let Ok(value) = format!("django_language={}; Path=/", language).parse() {
            set_cookies.append(header::SET_COOKIE, value);
        }
    }
    response
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !csrf_ok(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if let Some(id) = cookies(&headers).get("sessionid") {
        state.sessions.lock().unwrap().remove(id);
    }
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, "/login".to_string()),
            (header::SET_COOKIE, "sessionid=; Path=/; Max-Age=0".to_string()),
        ],
    )
        .into_response()
}

async fn setlang(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.setlang_calls.fetch_add(1, Ordering::SeqCst);
    if !csrf_ok(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }

    let language = body.get("language").and_then(Value::as_str).unwrap_or("en").to_string();
    let session = cookies(&headers).get("sessionid").cloned();
    if let Some(username) = session.and_then(|id| state.sessions.lock().unwrap().get(&id).cloned()) {
        state.languages.lock().unwrap().insert(username, language.clone());
    }

    (
        [(header::SET_COOKIE, format!("django_language={}; Path=/", language))],
        Json(json!({ "success": true, "language": language })),
    )
        .into_response()
}
