//! The page the client runs in: its location/history and its root document.
//!
//! [`Navigator`] is the seam between the session layer and whatever actually
//! moves the user around. [`HeadlessNavigator`] records navigations instead of
//! performing them and backs both the CLI and the tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::i18n::{Direction, Language};

pub trait Navigator: Send + Sync {
    /// In-app route, e.g. `/reports`.
    fn current_path(&self) -> String;

    /// Referrer of the current page load, if any.
    fn referrer(&self) -> Option<String>;

    /// Client-side route change.
    fn navigate(&self, path: &str);

    /// Full navigation away from the client (external login surface).
    fn hard_navigate(&self, url: &str);

    /// Full page reload.
    fn reload(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum NavigationRecord {
    InApp(String),
    External(String),
    Reload,
}

#[derive(Debug)]
struct NavState {
    path: String,
    referrer: Option<String>,
    history: Vec<NavigationRecord>,
}

#[derive(Debug, Clone)]
pub struct HeadlessNavigator {
    state: Arc<Mutex<NavState>>,
}

impl HeadlessNavigator {
    pub fn new(path: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(NavState {
                path: path.to_string(),
                referrer: None,
                history: Vec::new(),
            })),
        }
    }

    pub fn with_referrer(self, referrer: &str) -> Self {
        self.state.lock().referrer = Some(referrer.to_string());
        self
    }

    /// Simulate the user landing on `path` without recording a navigation.
    pub fn set_path(&self, path: &str) {
        self.state.lock().path = path.to_string();
    }

    pub fn history(&self) -> Vec<NavigationRecord> {
        self.state.lock().history.clone()
    }

    pub fn last(&self) -> Option<NavigationRecord> {
        self.state.lock().history.last().cloned()
    }

    pub fn reload_count(&self) -> usize {
        self.state
            .lock()
            .history
            .iter()
            .filter(|r| **r == NavigationRecord::Reload)
            .count()
    }
}

impl Navigator for HeadlessNavigator {
    fn current_path(&self) -> String {
        self.state.lock().path.clone()
    }

    fn referrer(&self) -> Option<String> {
        self.state.lock().referrer.clone()
    }

    fn navigate(&self, path: &str) {
        let mut state = self.state.lock();
        state.path = path.to_string();
        state.history.push(NavigationRecord::InApp(path.to_string()));
        tracing::info!("Navigated to {}", path);
    }

    fn hard_navigate(&self, url: &str) {
        self.state.lock().history.push(NavigationRecord::External(url.to_string()));
        tracing::info!("Leaving client for {}", url);
    }

    fn reload(&self) {
        self.state.lock().history.push(NavigationRecord::Reload);
        tracing::warn!("Page reload requested");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// In-page custom events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomEvent {
    LanguageChanged { language: Language },
}

#[derive(Debug, Clone, Default)]
struct RootAttributes {
    lang: Option<String>,
    dir: Option<Direction>,
    body_classes: BTreeSet<String>,
}

/// Root document: `lang`/`dir` attributes, body class markers, visibility.
#[derive(Clone)]
pub struct Document {
    attributes: Arc<Mutex<RootAttributes>>,
    visibility: Arc<watch::Sender<Visibility>>,
    events: broadcast::Sender<DomEvent>,
}

impl Document {
    pub fn new() -> Self {
        let (visibility, _) = watch::channel(Visibility::Visible);
        let (events, _) = broadcast::channel(32);
        Self {
            attributes: Arc::new(Mutex::new(RootAttributes::default())),
            visibility: Arc::new(visibility),
            events,
        }
    }

    pub fn lang(&self) -> Option<String> {
        self.attributes.lock().lang.clone()
    }

    pub fn dir(&self) -> Option<Direction> {
        self.attributes.lock().dir
    }

    pub fn body_classes(&self) -> BTreeSet<String> {
        self.attributes.lock().body_classes.clone()
    }

    pub fn set_dir(&self, direction: Direction) {
        self.attributes.lock().dir = Some(direction);
    }

    /// Update `lang`, `dir` and the `ltr`/`rtl` body class markers together.
    pub fn apply_language(&self, language: Language) {
        let direction = language.direction();
        let mut attrs = self.attributes.lock();
        attrs.lang = Some(language.code().to_string());
        attrs.dir = Some(direction);
        attrs.body_classes.remove(Direction::Ltr.as_str());
        attrs.body_classes.remove(Direction::Rtl.as_str());
        attrs.body_classes.insert(direction.as_str().to_string());
    }

    pub fn visibility(&self) -> Visibility {
        *self.visibility.borrow()
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.send_if_modified(|current| {
            if *current == visibility {
                false
            } else {
                *current = visibility;
                true
            }
        });
    }

    pub fn watch_visibility(&self) -> watch::Receiver<Visibility> {
        self.visibility.subscribe()
    }

    pub fn dispatch_event(&self, event: DomEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DomEvent> {
        self.events.subscribe()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
