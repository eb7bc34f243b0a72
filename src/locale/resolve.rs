//! Pure half of locale reconciliation: pick a target, decide whether the
//! store needs to change.

use serde::{Deserialize, Serialize};

use crate::i18n::{Direction, Language};
use crate::store::LayoutState;

/// External signals read at the start of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleSnapshot {
    pub cookie: Option<String>,
    pub identity_language: Option<String>,
    pub browser_language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocaleSource {
    Cookie,
    Identity,
    Browser,
    Default,
}

/// Store mutation a pass wants to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleChange {
    pub from: Language,
    pub to: Language,
    pub direction: Direction,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Precedence: cookie, identity preference, supported browser language, default.
pub fn resolve_target(snapshot: &LocaleSnapshot, default: Language) -> (Language, LocaleSource) {
    if let Some(cookie) = non_empty(&snapshot.cookie) {
        return (Language::from_backend(cookie), LocaleSource::Cookie);
    }
    if let Some(stored) = non_empty(&snapshot.identity_language) {
        return (Language::from_backend(stored), LocaleSource::Identity);
    }
    if let Some(language) = non_empty(&snapshot.browser_language).and_then(Language::from_code) {
        return (language, LocaleSource::Browser);
    }
    (default, LocaleSource::Default)
}

/// `None` when the store already shows `target`.
pub fn plan_change(current: &LayoutState, target: Language) -> Option<LocaleChange> {
    if current.language == target {
        return None;
    }
    Some(LocaleChange {
        from: current.language,
        to: target,
        direction: target.direction(),
    })
}

/// A change took effect once both the store and the document agree with it.
pub fn is_applied(current: &LayoutState, document_dir: Option<Direction>, target: Language) -> bool {
    current.language == target && document_dir == Some(target.direction())
}
