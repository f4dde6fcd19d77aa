//! Local JSON snapshot file standing in for event-store persistence.

use std::path::Path;

use secretary_core::{Config, EventStore, Snapshot};
use tracing::debug;

/// Read a snapshot file. A missing file is an empty snapshot using the
/// configured pomodoro settings.
pub fn load(path: &Path) -> Result<Snapshot, Box<dyn std::error::Error>> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            debug!(path = %path.display(), tasks = snapshot.tasks.len(), "loaded snapshot");
            Ok(snapshot)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = Config::load_or_default();
            Ok(Snapshot {
                pomodoro: config.pomodoro,
                ..Snapshot::default()
            })
        }
        Err(e) => Err(format!("cannot read {}: {e}", path.display()).into()),
    }
}

/// Load the file into a validating store.
pub fn open_store(path: &Path) -> Result<EventStore, Box<dyn std::error::Error>> {
    Ok(EventStore::from_snapshot(load(path)?)?)
}

/// Write the store's current state back to `path`.
pub fn save_store(path: &Path, store: &EventStore) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = store.snapshot();
    let json = serde_json::to_string_pretty(&*snapshot)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;
    Ok(())
}
