use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Tally: a checklist dashboard that pays out flex time",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct Cli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "tallyrc", global = true)]
    pub tallyrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Live dashboard with an interactive prompt.
    Dash,
    /// Add a task to today's checklist.
    Add {
        name: String,
        #[arg(long = "time", default_value = "")]
        time: String,
    },
    /// Flip one task's completion by its dashboard number.
    Toggle { number: usize },
    /// Remove every completed task.
    Reset,
    /// Confirm the checklist and request the daily reward.
    Reward,
    /// Report screen-time overage minutes.
    Overage { minutes: i64 },
    /// Print the balances and checklist once.
    Status {
        #[arg(long)]
        json: bool,
    },
}

/// Maps the configured `default.command` to a subcommand when none was given
/// on the command line.
pub fn default_command(cfg: &Config) -> Command {
    let name = cfg
        .get("default.command")
        .unwrap_or_else(|| "dash".to_string());
    debug!(command = %name, "no explicit command, using default");
    match name.as_str() {
        "dash" => Command::Dash,
        "status" => Command::Status { json: false },
        "reset" => Command::Reset,
        "reward" => Command::Reward,
        other => {
            warn!(command = %other, "unknown default.command, falling back to dash");
            Command::Dash
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    // Logs go to stderr; stdout belongs to the dashboard.
    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
