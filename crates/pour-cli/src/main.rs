//! pour - formula-driven install CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pour_cli::ui::Output;
use pour_cli::{Cli, Commands, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never mix with command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = run(cli).await;

    // Drain queued UI events before the process exits.
    Output::new().wait();
    result
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install {
            formulas,
            force,
            ignore_dependencies,
            dry_run,
        } => {
            let opts = pour_cli::ops::install::InstallOptions {
                force,
                ignore_dependencies,
                dry_run,
            };
            cmd::install::install(&formulas, opts).await
        }
        Commands::Remove { packages, force } => cmd::remove::remove(&packages, force),
        Commands::List => cmd::list::list(),
        Commands::Info { package, json } => cmd::info::info(&package, json),
        Commands::Fetch { formulas } => cmd::fetch::fetch(&formulas).await,
        Commands::Lint { formulas } => cmd::lint::lint(&formulas),
        Commands::Convert {
            formula,
            to,
            output,
        } => cmd::convert::convert(&formula, to, output.as_deref()),
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::Check { packages } => cmd::check::check(&packages),
        Commands::History { package } => cmd::history::history(&package),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
