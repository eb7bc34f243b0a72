use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::i18n::{Direction, Language};

/// Layout slice of the UI state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutState {
    pub language: Language,
    pub direction: Direction,
}

impl Default for LayoutState {
    fn default() -> Self {
        Self {
            language: Language::English,
            direction: Direction::Ltr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutAction {
    ChangeLanguage(Language),
    ChangeDirection(Direction),
}

/// UI state container. Subscribers observe every dispatched change.
#[derive(Clone)]
pub struct UiStore {
    state: Arc<watch::Sender<LayoutState>>,
}

impl UiStore {
    pub fn new(initial: LayoutState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { state: Arc::new(tx) }
    }

    pub fn state(&self) -> LayoutState {
        *self.state.borrow()
    }

    pub fn dispatch(&self, action: LayoutAction) {
        self.state.send_modify(|state| match action {
            LayoutAction::ChangeLanguage(language) => state.language = language,
            LayoutAction::ChangeDirection(direction) => state.direction = direction,
        });
        tracing::debug!(?action, "layout action dispatched");
    }

    pub fn subscribe(&self) -> watch::Receiver<LayoutState> {
        self.state.subscribe()
    }
}

impl Default for UiStore {
    fn default() -> Self {
        Self::new(LayoutState::default())
    }
}
