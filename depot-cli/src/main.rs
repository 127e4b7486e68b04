//! depot CLI - item inventory service
//!
//! Entry point for the `depot` binary:
//! - `serve` runs the HTTP API on top of the repository
//! - `migrate` applies (or reports) schema migrations
//! - `completions` prints shell completion scripts

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;
mod tracing_setup;

use config::DepotConfig;
use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "depot",
    author,
    version,
    about = "Item inventory service backed by PostgreSQL",
    long_about = "Serve the item API and manage its schema. The repository waits for the \
                  database to accept connections and rolls a failed migration run back \
                  to the version it started from."
)]
struct Cli {
    /// Config file (default: ./depot.toml, then ~/.depot/config.toml)
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Apply pending schema migrations
    Migrate(commands::migrate::MigrateArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// `.env` in the current directory, then `~/.depot/.env`. Existing variables win.
fn load_dotenv() {
    dotenvy::dotenv().ok();
    if let Some(dir) = DepotConfig::home_dir() {
        dotenvy::from_path(dir.join(".env")).ok();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    if let Commands::Completions(args) = cli.command {
        return run_completions(args);
    }

    let config = DepotConfig::load(cli.config.as_deref())?;
    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        level: config.log.level.clone(),
    })
    .ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args, &config).await?,
        Commands::Migrate(args) => commands::run_migrate(args, &config).await?,
        Commands::Completions(_) => {}
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
