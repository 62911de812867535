mod report;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arcade_config::{AppConfig, ConfigError};
use arcade_runtime::{build_pipeline, log_outcome, run_watch};

#[derive(Debug, Parser)]
#[command(
    name = "arcade",
    version,
    about = "Watch arcade high-score files and publish new personal bests"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Watch the score directory until interrupted (default).
    Watch,
    /// Run a single pass for one game, as if its score file had changed.
    Process { game_id: String },
    /// Print the local snapshot's best score per game.
    Show {
        /// Print the raw snapshot document instead.
        #[arg(long)]
        json: bool,
    },
    /// Publish the local snapshot without extracting anything.
    Publish,
    /// Validate the configuration and print a summary.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if !cli.config.exists() {
        bail!("config file not found: {}", cli.config.display());
    }
    let config = AppConfig::load_from(&cli.config)?;
    init_tracing(&config);

    let command = cli.command.unwrap_or(Commands::Watch);
    preflight(&command, &config)?;

    match command {
        Commands::Watch => {
            if config.github.gist_id.trim().is_empty() {
                warn!("no gist_id configured; backup copy disabled");
            }
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received; shutting down");
                    let _ = shutdown_tx.send(true);
                }
            });
            run_watch(config, shutdown_rx).await?;
        }
        Commands::Process { game_id } => {
            let pipeline = build_pipeline(&config)?;
            let outcome = pipeline.process_game(&game_id).await;
            log_outcome(&outcome);
            println!("{}", report::pass_summary(&outcome));
        }
        Commands::Show { json } => {
            let pipeline = build_pipeline(&config)?;
            let snapshot = pipeline.local_snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                for line in report::snapshot_lines(&snapshot) {
                    println!("{line}");
                }
            }
        }
        Commands::Publish => {
            let pipeline = build_pipeline(&config)?;
            let outcome = pipeline.republish().await;
            println!("{}", report::publish_summary(&outcome));
            if !outcome.is_published() {
                bail!("publish did not complete");
            }
        }
        Commands::Check => {
            for line in report::config_lines(&config, &cli.config) {
                println!("{line}");
            }
            match config.validate() {
                Ok(()) => println!("configuration ok"),
                Err(err) => bail!("configuration invalid: {err}"),
            }
        }
    }

    Ok(())
}

/// Commands that run the pipeline or talk to the remote need a complete
/// configuration; read-only ones do not.
fn preflight(command: &Commands, config: &AppConfig) -> Result<(), ConfigError> {
    match command {
        Commands::Watch | Commands::Process { .. } | Commands::Publish => config.validate(),
        Commands::Show { .. } | Commands::Check => Ok(()),
    }
}

/// `RUST_LOG` wins; otherwise the configured level applies.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&config.telemetry.log_level).unwrap_or_else(|err| {
            eprintln!("invalid log_level {:?} ({err}); using info", config.telemetry.log_level);
            EnvFilter::new("info")
        })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use arcade_config::GameConfig;

    use super::*;

    fn config_without_token() -> AppConfig {
        let mut config = AppConfig::default();
        config.player.name = "alice".to_string();
        config
            .games
            .insert("galaga".to_string(), GameConfig::default());
        config.system.hi_score_dir = env!("CARGO_MANIFEST_DIR").to_string();
        config.system.hi2txt_jar = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("Cargo.toml")
            .display()
            .to_string();
        config.github.repo_owner = "alice".to_string();
        config.github.repo_name = "arcade".to_string();
        config
    }

    #[test]
    fn publish_requires_a_token() {
        let config = config_without_token();
        assert_eq!(
            preflight(&Commands::Publish, &config),
            Err(ConfigError::MissingRemoteSetting("token"))
        );

        let mut config = config;
        config.github.token = "secret".to_string();
        assert_eq!(preflight(&Commands::Publish, &config), Ok(()));
    }

    #[test]
    fn read_only_commands_skip_validation() {
        let config = AppConfig::default();
        assert!(preflight(&Commands::Show { json: false }, &config).is_ok());
        assert!(preflight(&Commands::Check, &config).is_ok());
        assert!(preflight(&Commands::Watch, &config).is_err());
        assert!(
            preflight(
                &Commands::Process {
                    game_id: "galaga".to_string()
                },
                &config
            )
            .is_err()
        );
    }
}
