//! `muster` operator binary.
//!
//! Encodes, decodes and inspects identity tokens, evaluates the disclosure
//! policy in batch, and drives the volunteer time and activity ledgers
//! against a local SQLite file. Structured output goes to stdout; logs go to
//! stderr.

mod actions;
mod capabilities;
mod config;

use std::{
  fs::File,
  io::{self, BufReader, Read as _},
  path::PathBuf,
};

use anyhow::Context as _;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use muster_core::{credential::Credential, disclosure, policy, request::OperationKind};
use muster_ledger::Coordinator;
use muster_store_sqlite::SqliteLedger;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{
  actions::{Clock, Scan},
  config::CliConfig,
};

// ─── Args ────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Muster volunteer ledger tool")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "muster.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Emit one capability set per `(observer, subject)` level pair.
  Capabilities {
    /// Emit the full level matrix instead of reading pairs.
    #[arg(long)]
    all:   bool,
    /// File of pairs; stdin when omitted.
    input: Option<PathBuf>,
  },
  /// Encode a credential JSON document (file or stdin) as a token.
  Encode { input: Option<PathBuf> },
  /// Decode a token (argument or stdin) to credential JSON.
  Decode { token: Option<String> },
  /// Show what an observer may see and do for a subject.
  Inspect {
    #[arg(long)]
    observer: String,
    #[arg(long)]
    subject:  String,
  },
  /// Volunteer time actions.
  #[command(subcommand)]
  Time(TimeCommand),
  /// Activity enrollment actions.
  #[command(subcommand)]
  Activity(ActivityCommand),
}

#[derive(clap::Args)]
struct Parties {
  /// Token of the acting party.
  #[arg(long)]
  actor:   String,
  /// Token of the party acted upon.
  #[arg(long)]
  subject: String,
}

#[derive(clap::Args)]
struct ClockArgs {
  /// Local timestamp, e.g. `2026-10-16T09:30:00`. Defaults to now.
  #[arg(long)]
  at:        Option<NaiveDateTime>,
  /// Offset of `--at` from UTC in hours. Defaults to the host's. The ledger
  /// receives it relative to `reference_utc_offset_hours`.
  #[arg(long, allow_hyphen_values = true)]
  tz_offset: Option<f64>,
}

#[derive(Subcommand)]
enum TimeCommand {
  CheckIn {
    #[command(flatten)]
    parties: Parties,
    #[command(flatten)]
    clock:   ClockArgs,
  },
  CheckOut {
    #[command(flatten)]
    parties: Parties,
    #[command(flatten)]
    clock:   ClockArgs,
    #[arg(long)]
    note:    Option<String>,
  },
  Summary {
    #[command(flatten)]
    parties: Parties,
    /// Recent entries to include.
    #[arg(short, long, default_value_t = 5)]
    limit:   usize,
  },
}

#[derive(Subcommand)]
enum ActivityCommand {
  Register {
    activity: String,
    #[command(flatten)]
    parties:  Parties,
    #[command(flatten)]
    clock:    ClockArgs,
  },
  CheckIn {
    activity: String,
    #[command(flatten)]
    parties:  Parties,
    #[command(flatten)]
    clock:    ClockArgs,
  },
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::Capabilities { all, input } => {
      let stdout = io::stdout().lock();
      let written = match (all, input) {
        (true, _) => capabilities::run_all(stdout)?,
        (false, Some(path)) => {
          let file = File::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
          capabilities::run(BufReader::new(file), stdout)?
        }
        (false, None) => capabilities::run(io::stdin().lock(), stdout)?,
      };
      tracing::debug!(written, "capability sets emitted");
    }
    Command::Encode { input } => {
      let raw = read_input(input)?;
      let credential: Credential =
        serde_json::from_str(&raw).context("failed to parse credential JSON")?;
      println!("{}", muster_token::encode(&credential)?);
    }
    Command::Decode { token } => {
      let token = match token {
        Some(t) => t,
        None => read_input(None)?,
      };
      let credential = muster_token::decode(token.trim())?;
      println!("{}", serde_json::to_string_pretty(&credential)?);
    }
    Command::Inspect { observer, subject } => {
      let observer = muster_token::decode(&observer)?;
      let subject = muster_token::decode(&subject)?;
      let caps = policy::compute(&observer.principal(), &subject.principal());
      let report = serde_json::json!({
        "observer":     observer.authority().ordinal(),
        "subject":      subject.authority().ordinal(),
        "capabilities": caps,
        "profile":      disclosure::disclose(&subject, &caps),
      });
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Time(cmd) => {
      let cfg = CliConfig::load(&cli.config)?;
      let reference = cfg.reference_utc_offset_hours;
      let coordinator = open_ledger(&cfg).await?;
      let out = match cmd {
        TimeCommand::CheckIn { parties, clock } => {
          let scan = Scan::new(&parties.actor, &parties.subject)?;
          let kind = OperationKind::TimeCheckIn;
          actions::perform(&coordinator, &scan, kind, clock.resolve(reference)?).await?
        }
        TimeCommand::CheckOut { parties, clock, note } => {
          let scan = Scan::new(&parties.actor, &parties.subject)?;
          let kind = OperationKind::TimeCheckOut { note };
          actions::perform(&coordinator, &scan, kind, clock.resolve(reference)?).await?
        }
        TimeCommand::Summary { parties, limit } => {
          let scan = Scan::new(&parties.actor, &parties.subject)?;
          actions::summary(&coordinator, &scan, limit).await?
        }
      };
      println!("{out}");
    }
    Command::Activity(cmd) => {
      let cfg = CliConfig::load(&cli.config)?;
      let reference = cfg.reference_utc_offset_hours;
      let coordinator = open_ledger(&cfg).await?;
      let (kind, parties, clock) = match cmd {
        ActivityCommand::Register { activity, parties, clock } => {
          (OperationKind::ActivityRegister { activity_id: activity }, parties, clock)
        }
        ActivityCommand::CheckIn { activity, parties, clock } => {
          (OperationKind::ActivityCheckIn { activity_id: activity }, parties, clock)
        }
      };
      let scan = Scan::new(&parties.actor, &parties.subject)?;
      let clock = clock.resolve(reference)?;
      println!("{}", actions::perform(&coordinator, &scan, kind, clock).await?);
    }
  }

  Ok(())
}

impl ClockArgs {
  fn resolve(&self, reference_hours: f64) -> anyhow::Result<Clock> {
    Clock::resolve(self.at, self.tz_offset, reference_hours)
  }
}

async fn open_ledger(cfg: &CliConfig) -> anyhow::Result<Coordinator<SqliteLedger>> {
  let ledger = SqliteLedger::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open ledger at {}", cfg.store_path.display()))?;
  tracing::info!(path = %cfg.store_path.display(), "ledger open");
  Ok(Coordinator::new(ledger, &cfg.ledger))
}

/// Read all of `path`, or stdin when `None`.
fn read_input(path: Option<PathBuf>) -> anyhow::Result<String> {
  let mut buf = String::new();
  match path {
    Some(path) => {
      File::open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .read_to_string(&mut buf)?;
    }
    None => {
      io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
    }
  }
  Ok(buf)
}
