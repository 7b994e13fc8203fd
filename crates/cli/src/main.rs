use clap::Parser;

use quarry_cli::{Cli, run, unconfigured_collaborators};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    quarry_observability::tracing::init(&cli.store.log_config());

    if let Err(err) = run(cli, unconfigured_collaborators()) {
        tracing::error!(error = %err, "quarry exited with an error");
        return Err(err);
    }
    Ok(())
}
