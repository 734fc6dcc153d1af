mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::Settings;
use orgsweep_core::audit::DEFAULT_WINDOW_MONTHS;
use orgsweep_core::github::DEFAULT_API_URL;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "orgsweep",
    about = "Archive inactive repositories and prune inactive members of a GitHub organization config",
    version,
    propagate_version = true
)]
struct Cli {
    /// Organization login
    #[arg(long, global = true, env = "GITHUB_ORG")]
    org: Option<String>,

    /// GitHub API token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, global = true, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Organization config file (default: github/<org>.yml, searched upward from cwd)
    #[arg(long, global = true, env = "GITHUB_MGMT_CONFIG")]
    config: Option<PathBuf>,

    /// Length of the audit window in months
    #[arg(long, global = true, env = "AUDIT_WINDOW_MONTHS", default_value_t = DEFAULT_WINDOW_MONTHS)]
    window_months: u32,

    /// Print the changes without saving the config
    #[arg(long, global = true)]
    dry_run: bool,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive repositories with no recent events or activity
    Archive,

    /// Remove inactive members, collaborators, team members, and empty teams
    Prune {
        /// Audit log export (newline-delimited JSON)
        #[arg(long, env = "LOG_PATH")]
        log_path: Option<PathBuf>,
    },

    /// Count collaborators on private repositories who are not org members
    Census {
        /// List the collaborators instead of only counting them
        #[arg(long)]
        list: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let settings = Settings {
        org: cli.org,
        token: cli.token,
        api_url: cli.api_url,
        config: cli.config,
        window_months: cli.window_months,
        dry_run: cli.dry_run,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Archive => cmd::archive::run(&settings),
        Commands::Prune { log_path } => cmd::prune::run(&settings, log_path.as_deref()),
        Commands::Census { list } => cmd::census::run(&settings, list),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
