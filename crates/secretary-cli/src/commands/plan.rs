//! Planning commands: proposals, chunk-level solve and structural checks.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Subcommand};
use secretary_core::{Config, Planner, PlannerOptions};

use super::snapshot;

#[derive(Args)]
pub struct PlanArgs {
    /// Snapshot file (JSON)
    #[arg(long)]
    snapshot: PathBuf,
    /// Plan start as RFC 3339 (default: now)
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,
    /// Horizon length in hours (default: planner.horizon_hours)
    #[arg(long)]
    horizon_hours: Option<u32>,
    /// Abort the pass after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum PlanAction {
    /// Scored proposals for every flexible task
    Proposals {
        #[command(flatten)]
        args: PlanArgs,
        /// Print the full report with score breakdowns and segments
        #[arg(long)]
        explain: bool,
    },
    /// Chunk-level plan (one chunk per pomodoro segment)
    Solve {
        #[command(flatten)]
        args: PlanArgs,
    },
    /// Validate references, cycles and fixed-task overlaps only
    Check {
        #[command(flatten)]
        args: PlanArgs,
    },
}

struct Prepared {
    planner: Planner,
    snapshot: secretary_core::Snapshot,
    as_of: DateTime<Utc>,
    horizon: Duration,
}

fn prepare(args: PlanArgs) -> Result<Prepared, Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut options = PlannerOptions::from_config(&config)?;
    if let Some(ms) = args.timeout_ms {
        options.timeout = Some(std::time::Duration::from_millis(ms));
    }
    let horizon = args
        .horizon_hours
        .map(|h| Duration::hours(i64::from(h)))
        .unwrap_or_else(|| config.horizon());

    Ok(Prepared {
        planner: Planner::new(options),
        snapshot: snapshot::load(&args.snapshot)?,
        as_of: args.as_of.unwrap_or_else(Utc::now),
        horizon,
    })
}

pub fn run(action: PlanAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PlanAction::Proposals { args, explain } => {
            let p = prepare(args)?;
            if explain {
                let timeout = p.planner.options().timeout;
                let report = p.planner.plan(&p.snapshot, p.as_of, p.horizon, timeout)?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let response = p.planner.generate_proposals(&p.snapshot, p.as_of, p.horizon)?;
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
        }
        PlanAction::Solve { args } => {
            let p = prepare(args)?;
            let solution = p.planner.solve(&p.snapshot, p.as_of, p.as_of + p.horizon)?;
            println!("{}", serde_json::to_string_pretty(&solution)?);
        }
        PlanAction::Check { args } => {
            let p = prepare(args)?;
            let summary = p.planner.check(&p.snapshot, p.as_of, p.horizon)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
