use clap::Subcommand;
use serde_json::json;

use crate::cli::config::CliSession;
use crate::cli::utils::{output_details, output_navigations, output_session_error, output_success};
use crate::cli::OutputFormat;
use crate::session::Credentials;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login against the identity backend")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Password (falls back to DASHBOARD_PASSWORD)")]
        password: Option<String>,
        #[arg(long, default_value = "local", help = "Authentication source sent with the form")]
        auth_choice: String,
    },

    #[command(about = "Logout and clear local session evidence")]
    Logout,

    #[command(about = "Show local session evidence without calling the backend")]
    Status,

    #[command(about = "Confirm the session with the backend and show the user")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let session = CliSession::open("/login")?;
    let app = &session.dashboard;

    let result = match cmd {
        AuthCommands::Login { username, password, auth_choice } => {
            let password = password
                .or_else(|| std::env::var("DASHBOARD_PASSWORD").ok())
                .ok_or_else(|| anyhow::anyhow!("Password required: use --password or DASHBOARD_PASSWORD"))?;
            let credentials = Credentials::new(username, password).with_auth_choice(auth_choice);

            match app.login_and_sync(&credentials).await {
                Ok((identity, language)) => output_success(
                    &output_format,
                    &format!("Logged in as {}", identity.display_name()),
                    Some(json!({ "user": identity, "language": language })),
                ),
                Err(e) => output_session_error(&output_format, &e),
            }
        }
        AuthCommands::Logout => {
            app.logout().await;
            output_success(&output_format, "Logged out", None)?;
            output_navigations(&output_format, &session.navigator.history())
        }
        AuthCommands::Status => {
            let belief = app.guard().belief();
            output_details(
                &output_format,
                "Session evidence",
                json!({
                    "has_session_cookie": belief.has_session_cookie(),
                    "was_logged_in": belief.was_logged_in(),
                    "session_id": belief.cached_session_id(),
                    "last_confirmed_at": belief.last_confirmed_at(),
                    "tolerates_failure": belief.tolerates_failure(),
                    "state": app.guard().state(),
                }),
            )
        }
        AuthCommands::Whoami => match app.guard().verify_identity().await {
            Ok(identity) => output_details(&output_format, &identity.display_name(), json!(identity)),
            Err(e) => output_session_error(&output_format, &e),
        },
    };

    session.save()?;
    result
}
