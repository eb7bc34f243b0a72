use clap::Subcommand;
use serde_json::json;

use crate::cli::config::CliSession;
use crate::cli::utils::{output_details, output_navigations};
use crate::cli::OutputFormat;
use crate::route::GateView;

#[derive(Subcommand)]
pub enum RouteCommands {
    #[command(about = "Visit an in-app path and show what the gate decides")]
    Visit {
        #[arg(help = "In-app path, e.g. /reports")]
        path: String,
        #[arg(long, help = "Use the per-page protected route instead of the app-level gate")]
        protected: bool,
    },
}

pub async fn handle(cmd: RouteCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        RouteCommands::Visit { path, protected } => {
            let session = CliSession::open(&path)?;
            let app = &session.dashboard;

            let decision = if protected {
                app.protected_route().check(&path).await
            } else {
                app.gate().mount().on_route(&path).await
            };

            output_details(
                &output_format,
                &format!("Route {}", path),
                json!({
                    "path": path,
                    "decision": decision,
                    "renders_children": decision.view() == GateView::Children,
                }),
            )?;
            output_navigations(&output_format, &session.navigator.history())?;
            session.save()
        }
    }
}
