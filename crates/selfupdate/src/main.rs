use anyhow::Context;
use clap::{Parser, Subcommand};
use selfupdate::{config, RunOutcome, SelfUpdateConfig, SelfUpdateError};
use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "selfupdate", version, about = "Pull remote changes into a deployed project")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a commented configuration template
    Config {
        path: PathBuf,
        /// Overwrite an existing file without asking
        #[arg(long)]
        force: bool,
    },
    /// Check the remote and apply changes if there are any
    Perform {
        /// Configuration file; built-in defaults when omitted
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("selfupdate=info,vcs=info,utils=info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Config { path, force } => write_config(&path, force),
        Command::Perform { config } => perform(config.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn write_config(path: &Path, force: bool) -> anyhow::Result<ExitCode> {
    if path.exists() && !force {
        let question = format!("File '{}' already exists. Overwrite? [y/N] ", path.display());
        if !confirm(&question, &mut io::stdin().lock())? {
            println!("Configuration file left untouched.");
            return Ok(ExitCode::FAILURE);
        }
    }
    config::write_template(path)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    println!("Configuration template written to '{}'.", path.display());
    Ok(ExitCode::SUCCESS)
}

fn confirm(question: &str, input: &mut impl BufRead) -> anyhow::Result<bool> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).context("failed to read answer")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn perform(config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = match config_path {
        Some(path) => SelfUpdateConfig::load(path)?,
        None => SelfUpdateConfig::default(),
    };

    let orchestrator = config.into_orchestrator().with_echo(true);
    match orchestrator.perform() {
        Ok(report) => match report.outcome {
            RunOutcome::Updated | RunOutcome::UpToDate => Ok(ExitCode::SUCCESS),
            RunOutcome::Failed(err) => {
                error!(error = %err, "update failed");
                Ok(ExitCode::FAILURE)
            }
        },
        Err(SelfUpdateError::LockContention(_)) => {
            println!("Execution terminated: command is already running.");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err).context("unable to start the update"),
    }
}
