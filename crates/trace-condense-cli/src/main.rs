// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `trace-condense` developer CLI.
//!
//! Loads a saved trace set (the JSON written by `TraceEngine::serialize_all`)
//! and prints the shared trace tree, the condensed model, or where a user
//! currently is in that model.
//!
//! # Usage
//! ```text
//! trace-condense condense traces.json [--threshold 4] [--rounds 2] [--penalty 0.5]
//! trace-condense tree traces.json
//! trace-condense locate traces.json --user alice
//! trace-condense config show|init
//! ```
//!
//! Condensation settings come from `condense.json` in the config directory;
//! flags override individual fields. Logs go to stderr, filtered by
//! `RUST_LOG` (default `warn`).

// The CLI is expected to print to stdout.
#![allow(clippy::print_stdout)]

mod fs_store;
mod render;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use trace_condense::{
    CondenseConfig, ConfigService, TraceEngine, TraceSet, UserId, CONDENSE_CONFIG_KEY,
};

use crate::fs_store::FsConfigStore;
use crate::render::{GraphSummary, LocationView};

#[derive(Parser, Debug)]
#[command(name = "trace-condense", version, about = "Condense saved user traces into a behavior model")]
struct Cli {
    /// Config directory (defaults to the platform config directory).
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Condense a trace set and print the resulting model.
    Condense {
        /// Saved trace set (JSON).
        traces: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
        /// Also write the serialized model to this file.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print the shared trace tree of a trace set.
    Tree {
        /// Saved trace set (JSON).
        traces: PathBuf,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print where a user currently is in the condensed model.
    Locate {
        /// Saved trace set (JSON).
        traces: PathBuf,
        /// User to locate.
        #[arg(long)]
        user: String,
        #[command(flatten)]
        tuning: Tuning,
        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Inspect or initialize the stored condensation config.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective config.
    Show,
    /// Write the default config.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

/// Flags overriding stored condensation settings.
#[derive(clap::Args, Debug, Default)]
struct Tuning {
    /// Merge threshold; pairs must score strictly above it.
    #[arg(long)]
    threshold: Option<f64>,
    /// Successor propagation rounds.
    #[arg(long)]
    rounds: Option<usize>,
    /// Penalty per unmatched outgoing transition.
    #[arg(long)]
    penalty: Option<f64>,
    /// Upper bound on merges per pass.
    #[arg(long)]
    max_merges: Option<usize>,
}

impl Tuning {
    fn apply(&self, mut config: CondenseConfig) -> Result<CondenseConfig> {
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if let Some(penalty) = self.penalty {
            config.unmatched_penalty = penalty;
        }
        if self.max_merges.is_some() {
            config.max_merges = self.max_merges;
        }
        config.validate().context("invalid tuning flags")?;
        Ok(config)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigService::new(config_store(cli.config_dir.as_deref())?);

    match cli.command {
        Command::Condense {
            traces,
            tuning,
            out,
            format,
        } => {
            let engine = load_engine(&traces, tuning.apply(config.condense_config()?)?)?;
            let model = engine.output_model();
            if let Some(out) = out {
                let json = serde_json::to_string_pretty(&model.to_serialized())?;
                fs::write(&out, json).with_context(|| format!("failed to write {}", out.display()))?;
            }
            print_summary(&GraphSummary::of(model)?, format)?;
        }
        Command::Tree { traces, format } => {
            let engine = load_engine(&traces, config.condense_config()?)?;
            print_summary(&GraphSummary::of(engine.trace_tree().graph())?, format)?;
        }
        Command::Locate {
            traces,
            user,
            tuning,
            format,
        } => {
            let engine = load_engine(&traces, tuning.apply(config.condense_config()?)?)?;
            let user = UserId::from(user);
            if engine.user_trace(&user).is_none() {
                bail!("user {user} is not in {}", traces.display());
            }
            let location = engine
                .locate(&user)
                .with_context(|| format!("failed to locate {user}"))?;
            let view = LocationView {
                user: &user,
                location,
            };
            match format {
                Format::Text => println!("{}", view.to_text()),
                Format::Json => println!("{}", serde_json::to_string_pretty(&view)?),
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config.condense_config()?)?);
            }
            ConfigAction::Init { force } => {
                let path = config.store().path_for(CONDENSE_CONFIG_KEY);
                if path.exists() && !force {
                    bail!("config already exists; pass --force to overwrite");
                }
                config.save_condense(&CondenseConfig::default())?;
                println!("wrote {}", path.display());
            }
        },
    }
    Ok(())
}

fn config_store(dir: Option<&Path>) -> Result<FsConfigStore> {
    match dir {
        Some(dir) => Ok(FsConfigStore::at(dir)),
        None => FsConfigStore::new().context("failed to resolve config directory"),
    }
}

fn load_engine(path: &Path, config: CondenseConfig) -> Result<TraceEngine> {
    let json = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let set = TraceSet::from_json(&json).with_context(|| format!("failed to parse {}", path.display()))?;
    let mut engine = TraceEngine::builder().config(config).build();
    let report = engine.load_all(set);
    for (user, err) in &report.failures {
        warn!(user = %user, error = %err, "trace skipped");
    }
    Ok(engine)
}

fn print_summary(summary: &GraphSummary, format: Format) -> Result<()> {
    match format {
        Format::Text => println!("{}", summary.to_text()),
        Format::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    Ok(())
}
