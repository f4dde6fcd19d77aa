//! Task management commands for CLI.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Subcommand, ValueEnum};
use secretary_core::{Dependency, Task, TimeWindow};
use uuid::Uuid;

use super::snapshot;

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    Fixed,
    Flexible,
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task
    Add {
        /// Snapshot file (JSON)
        #[arg(long)]
        snapshot: PathBuf,
        /// Task title
        title: String,
        /// Duration in minutes
        #[arg(long)]
        duration: u32,
        /// fixed or flexible (default: flexible)
        #[arg(long, value_enum, default_value = "flexible")]
        kind: Kind,
        /// Start of a fixed task (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Priority 1..=10
        #[arg(long, default_value = "5")]
        priority: i32,
        /// Deadline (RFC 3339)
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
        /// Family key
        #[arg(long)]
        family: Option<String>,
        /// Travel time before and after, in minutes
        #[arg(long, default_value = "0")]
        travel: u32,
        /// Opt in to pomodoro segmentation
        #[arg(long)]
        pomodoro: bool,
        /// Finish-to-start predecessor ids (repeatable)
        #[arg(long = "after")]
        after: Vec<String>,
        /// Allowed window as START/END in RFC 3339 (repeatable)
        #[arg(long = "window")]
        windows: Vec<String>,
        /// Explicit id (default: generated)
        #[arg(long)]
        id: Option<String>,
    },
    /// List tasks
    List {
        /// Snapshot file (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Remove a task
    Remove {
        /// Snapshot file (JSON)
        #[arg(long)]
        snapshot: PathBuf,
        /// Task ID
        id: String,
    },
}

fn parse_window(raw: &str) -> Result<TimeWindow, Box<dyn std::error::Error>> {
    let (start, end) = raw
        .split_once('/')
        .ok_or_else(|| format!("window '{raw}' must look like START/END"))?;
    Ok(TimeWindow::new(start.parse()?, end.parse()?)?)
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TaskAction::Add {
            snapshot: path,
            title,
            duration,
            kind,
            start,
            priority,
            deadline,
            family,
            travel,
            pomodoro,
            after,
            windows,
            id,
        } => {
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let mut task = match (kind, start) {
                (Kind::Fixed, Some(start)) => Task::fixed(id, title, start, duration),
                (Kind::Fixed, None) => {
                    let mut task = Task::flexible(id, title, duration);
                    task.kind = secretary_core::TaskType::Fixed;
                    task
                }
                (Kind::Flexible, Some(_)) => {
                    return Err(
                        "--start only applies to --kind fixed; flexible tasks are placed by the planner"
                            .into(),
                    );
                }
                (Kind::Flexible, None) => Task::flexible(id, title, duration),
            }
            .with_priority(priority)
            .with_travel(travel);
            task.deadline = deadline;
            task.family_key = family;
            task.pomodoro_opt_in = pomodoro;
            for predecessor in after {
                task = task.depending_on(Dependency::finish_to_start(predecessor, 0));
            }
            for raw in &windows {
                task = task.with_window(parse_window(raw)?);
            }

            let store = snapshot::open_store(&path)?;
            store.insert(task.clone())?;
            snapshot::save_store(&path, &store)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { snapshot: path } => {
            let store = snapshot::open_store(&path)?;
            println!("{}", serde_json::to_string_pretty(&store.list_all())?);
        }
        TaskAction::Remove { snapshot: path, id } => {
            let store = snapshot::open_store(&path)?;
            let removed = store.remove(&id)?;
            snapshot::save_store(&path, &store)?;
            println!("Task removed: {}", removed.id);
        }
    }
    Ok(())
}
