pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod error;
pub mod host;
pub mod i18n;
pub mod identity;
pub mod locale;
pub mod route;
pub mod session;
pub mod storage;
pub mod store;

pub use app::Dashboard;
pub use error::{SessionError, SessionResult};

#[cfg(test)]
pub mod testing;
