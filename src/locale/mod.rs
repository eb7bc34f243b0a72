// Locale reconciliation between the server-issued language cookie and the UI store

pub mod resolve;
pub mod sync;
pub mod triggers;

pub use resolve::{resolve_target, LocaleChange, LocaleSnapshot, LocaleSource};
pub use sync::{
    LocaleDebugState, LocaleSync, LocaleSyncDeps, ReconcileOutcome, SkipReason, SyncAttempt, Trigger,
    Verification,
};
pub use triggers::{force_sync_with_retries, start, sync_after_login, LocaleSyncHandle};
