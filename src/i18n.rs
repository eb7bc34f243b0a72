use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// UI languages the dashboard ships translations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Arabic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Language {
    pub const SUPPORTED: [Language; 2] = [Language::English, Language::Arabic];

    /// Backend language code (`en`, `ar`).
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Arabic => "ar",
        }
    }

    /// Strict lookup: only supported codes, region suffix ignored (`ar-SA`).
    pub fn from_code(code: &str) -> Option<Self> {
        let primary = code
            .trim()
            .split(|c| c == '-' || c == '_' || c == '.')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        Self::SUPPORTED.into_iter().find(|l| l.code() == primary)
    }

    /// Lenient lookup used for server-written values: unknown codes map to English.
    pub fn from_backend(code: &str) -> Self {
        Self::from_code(code).unwrap_or(Language::English)
    }

    pub fn direction(&self) -> Direction {
        match self {
            Language::Arabic => Direction::Rtl,
            Language::English => Direction::Ltr,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Bundle = HashMap<String, String>;

/// Loaded translation bundles, keyed by language.
#[derive(Clone, Default)]
pub struct TranslationCache {
    bundles: Arc<Mutex<HashMap<Language, Arc<Bundle>>>>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, language: Language) -> Option<Arc<Bundle>> {
        self.bundles.lock().get(&language).cloned()
    }

    pub fn insert(&self, language: Language, bundle: Bundle) -> Arc<Bundle> {
        let bundle = Arc::new(bundle);
        self.bundles.lock().insert(language, bundle.clone());
        bundle
    }

    pub fn get_or_load<F>(&self, language: Language, load: F) -> Arc<Bundle>
    where
        F: FnOnce(Language) -> Bundle,
    {
        if let Some(bundle) = self.get(language) {
            return bundle;
        }
        self.insert(language, load(language))
    }

    pub fn invalidate(&self, language: Language) {
        if self.bundles.lock().remove(&language).is_some() {
            tracing::debug!("Cleared translation cache for {}", language);
        }
    }

    pub fn clear(&self) {
        self.bundles.lock().clear();
    }
}
