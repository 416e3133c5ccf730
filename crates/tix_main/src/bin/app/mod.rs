pub mod cli;
mod create;
mod mr;
mod readiness;
mod session;
mod setdesc;
mod start;

use anyhow::Result;
use tix_main::load_settings;
use tracing::debug;

pub use cli::{Args, Commands};

pub async fn run(args: Args) -> Result<()> {
    let settings = load_settings(&args.config)?;
    debug!(command = ?args.command, "Running command");

    match args.command {
        Commands::Create { title, no_assign } => {
            create::run(&settings, title.as_deref(), !no_assign).await
        }
        Commands::Start { args } => start::run(&settings, &args).await,
        Commands::Mr { draft, remote } => mr::run(&settings, draft, &remote).await,
        Commands::Setdesc { rag, no_rag, yes } => {
            setdesc::run(&settings, cli::force_retrieval(rag, no_rag), yes).await
        }
        Commands::Ready { label, status } => {
            readiness::ready(&settings, label.as_deref(), status.as_deref()).await
        }
        Commands::Unready { label, unready_label, status } => {
            readiness::unready(
                &settings,
                label.as_deref(),
                unready_label.as_deref(),
                status.as_deref(),
            )
            .await
        }
    }
}
