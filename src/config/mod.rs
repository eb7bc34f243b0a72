use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub routing: RoutingConfig,
    pub locale: LocaleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Endpoints of the external identity backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub login_url: String,
    pub logout_url: String,
    pub whoami_path: String,
    pub setlang_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub session_cookie: String,
    pub csrf_cookie: String,
    pub identity_debounce_ms: u64,
    /// How long a prior successful login keeps excusing failed identity checks.
    pub transient_tolerance_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub login_route: String,
    pub default_landing: String,
    pub redirect_grace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    pub cookie_name: String,
    pub default_language: String,
    pub sync_debounce_ms: u64,
    pub poll_interval_ms: u64,
    pub initial_delay_ms: u64,
    pub visibility_delay_ms: u64,
    pub storage_delay_ms: u64,
    pub verify_delay_ms: u64,
    pub max_reload_attempts: u32,
    pub burst_schedule_ms: Vec<u64>,
    pub fresh_login_window_secs: u64,
    pub login_referrer_markers: Vec<String>,
}

impl SessionConfig {
    pub fn identity_debounce(&self) -> Duration {
        Duration::from_millis(self.identity_debounce_ms)
    }

    pub fn transient_tolerance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.transient_tolerance_secs as i64)
    }
}

impl RoutingConfig {
    pub fn redirect_grace(&self) -> Duration {
        Duration::from_millis(self.redirect_grace_ms)
    }
}

impl LocaleConfig {
    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn visibility_delay(&self) -> Duration {
        Duration::from_millis(self.visibility_delay_ms)
    }

    pub fn storage_delay(&self) -> Duration {
        Duration::from_millis(self.storage_delay_ms)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }

    pub fn burst_schedule(&self) -> Vec<Duration> {
        self.burst_schedule_ms.iter().map(|ms| Duration::from_millis(*ms)).collect()
    }

    pub fn fresh_login_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.fresh_login_window_secs as i64)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Point every backend endpoint at `base_url`, keeping the configured paths.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        self.backend.login_url = format!("{}/login", base);
        self.backend.logout_url = format!("{}/logout", base);
        self.backend.base_url = base;
        self
    }

    fn with_env_overrides(mut self) -> Self {
        // Backend overrides
        if let Ok(v) = env::var("DASHBOARD_BASE_URL") {
            self = self.with_base_url(&v);
        }
        if let Ok(v) = env::var("DASHBOARD_LOGIN_URL") {
            self.backend.login_url = v;
        }
        if let Ok(v) = env::var("DASHBOARD_LOGOUT_URL") {
            self.backend.logout_url = v;
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_IDENTITY_DEBOUNCE_MS") {
            self.session.identity_debounce_ms = v.parse().unwrap_or(self.session.identity_debounce_ms);
        }
        if let Ok(v) = env::var("SESSION_TRANSIENT_TOLERANCE_SECS") {
            self.session.transient_tolerance_secs = v.parse().unwrap_or(self.session.transient_tolerance_secs);
        }

        // Routing overrides
        if let Ok(v) = env::var("ROUTING_LOGIN_ROUTE") {
            self.routing.login_route = v;
        }
        if let Ok(v) = env::var("ROUTING_DEFAULT_LANDING") {
            self.routing.default_landing = v;
        }
        if let Ok(v) = env::var("ROUTING_REDIRECT_GRACE_MS") {
            self.routing.redirect_grace_ms = v.parse().unwrap_or(self.routing.redirect_grace_ms);
        }

        // Locale overrides
        if let Ok(v) = env::var("LOCALE_DEFAULT_LANGUAGE") {
            self.locale.default_language = v;
        }
        if let Ok(v) = env::var("LOCALE_SYNC_DEBOUNCE_MS") {
            self.locale.sync_debounce_ms = v.parse().unwrap_or(self.locale.sync_debounce_ms);
        }
        if let Ok(v) = env::var("LOCALE_POLL_INTERVAL_MS") {
            // Interval timers cannot tick with a zero period
            self.locale.poll_interval_ms = v.parse().unwrap_or(self.locale.poll_interval_ms).max(1);
        }
        if let Ok(v) = env::var("LOCALE_VERIFY_DELAY_MS") {
            self.locale.verify_delay_ms = v.parse().unwrap_or(self.locale.verify_delay_ms);
        }
        if let Ok(v) = env::var("LOCALE_MAX_RELOAD_ATTEMPTS") {
            self.locale.max_reload_attempts = v.parse().unwrap_or(self.locale.max_reload_attempts);
        }
        if let Ok(v) = env::var("LOCALE_BURST_SCHEDULE_MS") {
            let schedule: Vec<u64> = v.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if !schedule.is_empty() {
                self.locale.burst_schedule_ms = schedule;
            }
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            backend: BackendConfig {
                base_url: "http://localhost:8000".to_string(),
                login_url: "http://localhost:8000/login".to_string(),
                logout_url: "http://localhost:8000/logout".to_string(),
                whoami_path: "/api/users/whoami".to_string(),
                setlang_path: "/api/setlang".to_string(),
            },
            session: SessionConfig {
                session_cookie: "sessionid".to_string(),
                csrf_cookie: "csrftoken".to_string(),
                identity_debounce_ms: 2000,
                transient_tolerance_secs: 15 * 60,
            },
            routing: RoutingConfig {
                login_route: "/login".to_string(),
                default_landing: "/dashboard".to_string(),
                redirect_grace_ms: 500,
            },
            locale: LocaleConfig {
                cookie_name: "django_language".to_string(),
                default_language: "en".to_string(),
                sync_debounce_ms: 3000,
                poll_interval_ms: 5000,
                initial_delay_ms: 1000,
                visibility_delay_ms: 200,
                storage_delay_ms: 100,
                verify_delay_ms: 5000,
                max_reload_attempts: 2,
                burst_schedule_ms: vec![0, 500, 1500, 3000],
                fresh_login_window_secs: 30,
                login_referrer_markers: vec![
                    "/login".to_string(),
                    "localhost:8000/login".to_string(),
                    "localhost:8001/login".to_string(),
                ],
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config = config.with_base_url("https://staging.example.com");
        config.session.transient_tolerance_secs = 5 * 60;
        config.locale.login_referrer_markers = vec!["/login".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config = config.with_base_url("https://app.example.com");
        config.session.transient_tolerance_secs = 2 * 60;
        config.locale.max_reload_attempts = 1;
        config.locale.login_referrer_markers = vec!["/login".to_string()];
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
