mod extract_cmds;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use concord_config::AppConfig;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "concord",
    version,
    about = "Multi-agent memory extraction with consensus"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract memories from a conversation file and print the result as JSON.
    Extract {
        /// Conversation file: a JSON array of `{role, content}` messages or plain text.
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        #[arg(long, default_value = "local")]
        user: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Show recorded extraction sessions.
    History {
        #[arg(long, default_value = "local")]
        user: String,
        #[arg(long)]
        session: String,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration.
    Show,
    /// Write the default configuration to the config path.
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract {
            file,
            user,
            session,
        } => {
            let session = session.unwrap_or_else(|| default_session_id(&file));
            extract_cmds::run_extract(&config, &file, &user, &session).await?;
        }
        Commands::History { user, session } => {
            extract_cmds::run_history(&config, &user, &session).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigCommands::Init { force } => init_config(&cli.config, force)?,
        },
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    AppConfig::default().save_to(path)?;
    println!("wrote default configuration to {}", path.display());
    Ok(())
}

/// Session id derived from the conversation file name.
fn default_session_id(file: &Path) -> String {
    file.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "session".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extract_arguments() {
        let cli = Cli::try_parse_from([
            "concord", "extract", "--file", "chat.json", "--user", "u1", "--session", "s1",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match cli.command {
            Commands::Extract {
                file,
                user,
                session,
            } => {
                assert_eq!(file, PathBuf::from("chat.json"));
                assert_eq!(user, "u1");
                assert_eq!(session.as_deref(), Some("s1"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_path_is_global() {
        let cli =
            Cli::try_parse_from(["concord", "config", "show", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }

    #[test]
    fn extract_requires_a_file() {
        assert!(Cli::try_parse_from(["concord", "extract"]).is_err());
    }

    #[test]
    fn session_defaults_to_file_stem() {
        assert_eq!(default_session_id(Path::new("logs/2024-05-01.json")), "2024-05-01");
        assert_eq!(default_session_id(Path::new("")), "session");
    }
}
