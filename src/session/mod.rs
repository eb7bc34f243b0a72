// Session guard: local evidence, anti-forgery tokens and deduplicated identity checks

pub mod belief;
pub mod csrf;
pub mod guard;

pub use belief::SessionBelief;
pub use csrf::{extract_form_token, AntiForgeryToken};
pub use guard::{Credentials, SessionGuard, SessionState};
