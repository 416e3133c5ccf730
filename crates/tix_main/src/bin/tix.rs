//! tix: create issues, branches and merge requests from the terminal

use anyhow::Result;
use clap::Parser;
use tix_main::LoggingConfig;

mod app;

use app::{Args, run};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    LoggingConfig::from_verbosity(args.verbose).with_env().init_tracing()?;

    run(args).await
}
