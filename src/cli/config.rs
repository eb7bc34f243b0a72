use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::Dashboard;
use crate::config;
use crate::host::HeadlessNavigator;
use crate::storage::LocalStorage;

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("DASHBOARD_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("dashboard")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_cookies() -> anyhow::Result<BTreeMap<String, String>> {
    let config_dir = get_config_dir()?;
    let cookie_file = config_dir.join("cookies.json");

    if !cookie_file.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(cookie_file)?;
    let cookies: BTreeMap<String, String> = serde_json::from_str(&content)?;
    Ok(cookies)
}

pub fn save_cookies(cookies: &BTreeMap<String, String>) -> anyhow::Result<()> {
    let config_dir = get_config_dir()?;
    let cookie_file = config_dir.join("cookies.json");

    let content = serde_json::to_string_pretty(cookies)?;
    fs::write(cookie_file, content)?;
    Ok(())
}

/// One CLI invocation standing in for one page load at `path`.
pub struct CliSession {
    pub dashboard: Dashboard,
    pub navigator: HeadlessNavigator,
}

impl CliSession {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let storage = LocalStorage::open(get_config_dir()?.join("storage.json"))?;
        let navigator = HeadlessNavigator::new(path);
        let browser_language = std::env::var("LANG").ok();

        let dashboard = Dashboard::connect(
            config::config().clone(),
            storage,
            Arc::new(navigator.clone()),
            browser_language,
        )?;
        dashboard.cookies.restore(&load_cookies()?);

        Ok(Self { dashboard, navigator })
    }

    /// Persist cookies the backend issued during this invocation.
    pub fn save(&self) -> anyhow::Result<()> {
        save_cookies(&self.dashboard.cookies.snapshot())
    }
}
