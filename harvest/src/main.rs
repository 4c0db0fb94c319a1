// harvest/src/main.rs

use clap::Parser;

mod cli;
mod commands;
mod render;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=debug harvest simulate ... to see the details
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project } => commands::validate::execute(project),
        Commands::Preview {
            project,
            transforms,
            json,
            document,
        } => commands::preview::execute(project, transforms, json, document).await,
        Commands::Coercion { project, json } => commands::preview::coercion(project, json).await,
        Commands::Coverage { project, json } => commands::preview::coverage(project, json).await,
        Commands::Migrate {
            project,
            execute,
            json,
        } => commands::migrate::execute(project, execute, json).await,
        Commands::Constraints { project, json } => {
            commands::preview::constraints(project, json).await
        }
        Commands::Diff {
            project,
            other,
            document,
        } => commands::preview::diff(project, other, document).await,
        Commands::Simulate { project, json } => commands::apply::simulate(project, json).await,
        Commands::Apply { project, migrate } => commands::apply::execute(project, migrate).await,
        Commands::Publish { project } => commands::versions::publish(project),
        Commands::History { project_dir } => commands::versions::history(project_dir),
        Commands::Rollback {
            project_dir,
            version_id,
            draft,
        } => commands::versions::rollback(project_dir, version_id, draft),
    }
}
