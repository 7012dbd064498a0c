use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use noderig::cli::{Cli, Commands};
use noderig::commands;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_file = cli.global.config_file.as_deref();

    let result = match cli.command {
        Commands::Start { identity_injection } => {
            commands::start::run(config_file, identity_injection).await
        }
        Commands::Status { json } => commands::status::run(config_file, json).await,
        Commands::Doctor => commands::doctor::run(config_file),
        Commands::Seed { rid } => {
            commands::repo::run(config_file, commands::repo::RepoOp::Seed { rid }).await
        }
        Commands::Sync { rid } => {
            commands::repo::run(config_file, commands::repo::RepoOp::Sync { rid }).await
        }
        Commands::Connections => {
            commands::repo::run(config_file, commands::repo::RepoOp::Connections).await
        }
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "noderig", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
