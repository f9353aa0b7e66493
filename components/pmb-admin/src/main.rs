use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::CompleteEnv;
use pmb_admin::{cli, instrumentation};

#[tokio::main]
async fn main() -> Result<()> {
    // Answers `COMPLETE=<shell>` requests and exits; no-op otherwise.
    CompleteEnv::with_factory(cli::cli::Cli::command).complete();

    let cli = cli::cli::Cli::parse();

    let _guard = instrumentation::tracing::init_tracing(cli.log_level.as_deref());
    instrumentation::tracing::init_panic_handler();

    // Main entrypoint simply delegates control to CLI layer.
    // Any error returned here is fatal and exits with a non-zero status.
    cli::cli::run(cli).await
}
