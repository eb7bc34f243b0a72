use std::time::Duration;

use clap::Subcommand;
use serde_json::json;

use crate::cli::config::CliSession;
use crate::cli::utils::{output_details, output_navigations, output_session_error, output_success};
use crate::cli::OutputFormat;
use crate::i18n::Language;
use crate::locale::{self, Trigger};

#[derive(Subcommand)]
pub enum LocaleCommands {
    #[command(about = "Run one reconciliation pass against the current cookie")]
    Sync {
        #[arg(long, help = "Repeat on the post-login retry schedule")]
        retries: bool,
    },

    #[command(about = "Ask the backend to switch language, then apply it")]
    Set {
        #[arg(help = "Language code (en, ar)")]
        language: String,
    },

    #[command(about = "Show cookie, store and document language state")]
    Status,

    #[command(about = "Run every sync trigger for a while")]
    Watch {
        #[arg(long, default_value_t = 30, help = "How long to keep watching")]
        seconds: u64,
    },
}

pub async fn handle(cmd: LocaleCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let session = CliSession::open("/dashboard")?;
    let app = &session.dashboard;
    let sync = app.locale();

    let result = match cmd {
        LocaleCommands::Sync { retries: false } => {
            let outcome = sync.reconcile(Trigger::Manual);
            output_details(&output_format, "Language sync", json!(outcome))
        }
        LocaleCommands::Sync { retries: true } => {
            locale::force_sync_with_retries(sync).await?;
            output_details(&output_format, "Language state", json!(sync.debug_state()))
        }
        LocaleCommands::Set { language } => {
            let target = Language::from_code(&language)
                .ok_or_else(|| anyhow::anyhow!("Unsupported language '{}'", language))?;
            match sync.change_language(target).await {
                Ok(()) => output_success(
                    &output_format,
                    &format!("Language changed to {}", target),
                    Some(json!({ "language": target, "direction": target.direction().as_str() })),
                ),
                Err(e) => output_session_error(&output_format, &e),
            }
        }
        LocaleCommands::Status => output_details(
            &output_format,
            "Language state",
            json!({
                "state": sync.debug_state(),
                "quick_sync_ok": sync.quick_sync_check(),
                "identity_synchronized": sync.is_language_synchronized(),
            }),
        ),
        LocaleCommands::Watch { seconds } => {
            let handle = app.start_locale_sync();
            tracing::info!("Watching language cookie for {}s", seconds);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
            handle.shutdown();

            output_details(&output_format, "Language state", json!(sync.debug_state()))?;
            output_navigations(&output_format, &session.navigator.history())
        }
    };

    session.save()?;
    result
}
