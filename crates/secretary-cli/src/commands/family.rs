use std::path::PathBuf;

use clap::Subcommand;
use secretary_core::Family;

use super::snapshot;

#[derive(Subcommand)]
pub enum FamilyAction {
    /// Create or replace a family
    Set {
        /// Snapshot file (JSON)
        #[arg(long)]
        snapshot: PathBuf,
        /// Family key
        key: String,
        /// Display name (default: the key)
        #[arg(long)]
        name: Option<String>,
        /// Relative priority multiplier
        #[arg(long, default_value = "1.0")]
        weight: f64,
        #[arg(long)]
        weekly_target: Option<u32>,
        #[arg(long)]
        min_daily: Option<u32>,
        #[arg(long)]
        max_daily: Option<u32>,
    },
    /// List families
    List {
        /// Snapshot file (JSON)
        #[arg(long)]
        snapshot: PathBuf,
    },
}

pub fn run(action: FamilyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        FamilyAction::Set {
            snapshot: path,
            key,
            name,
            weight,
            weekly_target,
            min_daily,
            max_daily,
        } => {
            let name = name.unwrap_or_else(|| key.clone());
            let mut family = Family::new(key, name)
                .with_weight(weight)
                .with_daily_limits(min_daily, max_daily);
            family.weekly_target_minutes = weekly_target;

            let store = snapshot::open_store(&path)?;
            store.upsert_family(family.clone())?;
            snapshot::save_store(&path, &store)?;
            println!("{}", serde_json::to_string_pretty(&family)?);
        }
        FamilyAction::List { snapshot: path } => {
            let store = snapshot::open_store(&path)?;
            println!("{}", serde_json::to_string_pretty(&store.list_families())?);
        }
    }
    Ok(())
}
