//! formbatch entry point.

mod bridge;
mod commands;
mod config;
mod prompt;
mod render;
mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::bridge::ClientBridge;
use crate::config::CliConfig;

#[derive(Debug, Parser)]
#[command(name = "formbatch", version, about = "Validate, upload and manage spreadsheet forms")]
struct Cli {
    /// Form service API base URL (overrides the config file).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Files uploaded concurrently per chunk (overrides the config file).
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dry-run validate spreadsheets without storing anything.
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate, then upload spreadsheets with interactive controls.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show an interrupted upload session, optionally resuming it.
    Recover {
        #[arg(long)]
        resume: bool,
    },
    /// List stored forms.
    List,
    /// Show one stored form with its questions and options.
    Show { form_id: String },
    /// Delete one stored form.
    Delete { form_id: String },
    /// Delete every stored form.
    DeleteAll {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Replace a stored form with a new spreadsheet.
    Update { form_id: String, file: PathBuf },
    /// Parse a spreadsheet without storing it.
    Parse { file: PathBuf },
    /// Write stored forms to a directory as JSON.
    Export {
        /// Form to export; every form when omitted.
        form_id: Option<String>,
        #[arg(long, short, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match CliConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            CliConfig::default()
        }
    };
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(k) = cli.max_concurrent {
        config.max_concurrent = k;
    }
    tracing::debug!(api_url = %config.api_url, "configuration loaded");

    let client = formbatch_client::Client::new(&config.api_url)?;
    let bridge = Arc::new(ClientBridge::new(client));

    match cli.command {
        Command::Validate { files } => upload::validate(bridge, &files).await,
        Command::Upload { files } => upload::upload(bridge, &config, &files).await,
        Command::Recover { resume } => upload::recover(bridge, &config, resume).await,
        Command::List => commands::list(bridge.as_ref()).await,
        Command::Show { form_id } => commands::show(bridge.as_ref(), &form_id).await,
        Command::Delete { form_id } => commands::delete(bridge.as_ref(), &form_id).await,
        Command::DeleteAll { yes } => commands::delete_all(bridge.as_ref(), yes).await,
        Command::Update { form_id, file } => {
            commands::update(bridge.as_ref(), &form_id, &file).await
        }
        Command::Parse { file } => commands::parse(bridge.as_ref(), &file).await,
        Command::Export { form_id, out } => {
            commands::export(bridge.as_ref(), form_id.as_deref(), &out).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_overrides() {
        let cli = Cli::parse_from([
            "formbatch",
            "upload",
            "a.xlsx",
            "b.xlsx",
            "--max-concurrent",
            "5",
            "--api-url",
            "http://h/api",
        ]);
        assert_eq!(cli.max_concurrent, Some(5));
        assert_eq!(cli.api_url.as_deref(), Some("http://h/api"));
        match cli.command {
            Command::Upload { files } => assert_eq!(files.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn export_defaults_to_current_dir() {
        let cli = Cli::parse_from(["formbatch", "export"]);
        match cli.command {
            Command::Export { form_id, out } => {
                assert!(form_id.is_none());
                assert_eq!(out, PathBuf::from("."));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn upload_requires_files() {
        assert!(Cli::try_parse_from(["formbatch", "upload"]).is_err());
    }
}
