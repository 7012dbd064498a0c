use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "noderig",
    version,
    about = "Run a local radicle node and HTTP gateway"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Use a specific config file
    #[arg(short = 'f', long = "file", global = true)]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the node and gateway in the foreground (Ctrl+C stops them)
    Start {
        /// Supply the node identity from elsewhere; never create one
        #[arg(long)]
        identity_injection: bool,
    },
    /// Show what is running without starting anything
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Check that the radicle binaries are installed
    Doctor,
    /// Seed a repository on the running node
    Seed {
        /// Repository id, e.g. rad:z3gqcJUoA1n9HaHKufZs5FCSGazv5
        rid: String,
    },
    /// Fetch the latest state of a seeded repository
    Sync {
        /// Repository id
        rid: String,
    },
    /// Count peers the running node is connected to
    Connections,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
