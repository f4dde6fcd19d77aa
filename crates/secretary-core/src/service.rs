//! Planning entry point bound to a live [`EventStore`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::model::{PlanSolution, ProposalResponse};
use crate::planner::{CheckSummary, PlanReport, Planner};
use crate::store::EventStore;

/// Runs planning passes over snapshots of a shared store.
///
/// Cheap to share between threads; every call takes its own snapshot, so
/// concurrent requests and concurrent store writes never interfere.
#[derive(Clone)]
pub struct PlanningService {
    store: Arc<EventStore>,
    planner: Planner,
}

impl PlanningService {
    pub fn new(store: Arc<EventStore>, planner: Planner) -> Self {
        Self { store, planner }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn generate_proposals(
        &self,
        as_of: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<ProposalResponse> {
        let snapshot = self.store.snapshot();
        self.planner.generate_proposals(&snapshot, as_of, horizon)
    }

    pub fn plan(
        &self,
        as_of: DateTime<Utc>,
        horizon: Duration,
        timeout: Option<std::time::Duration>,
    ) -> Result<PlanReport> {
        let snapshot = self.store.snapshot();
        self.planner.plan(&snapshot, as_of, horizon, timeout)
    }

    pub fn solve(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<PlanSolution> {
        let snapshot = self.store.snapshot();
        self.planner.solve(&snapshot, from, to)
    }

    pub fn check(&self, as_of: DateTime<Utc>, horizon: Duration) -> Result<CheckSummary> {
        let snapshot = self.store.snapshot();
        self.planner.check(&snapshot, as_of, horizon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use crate::planner::PlannerOptions;
    use chrono::TimeZone;

    #[test]
    fn plans_over_current_store_contents() {
        let store = Arc::new(EventStore::new());
        let service = PlanningService::new(store.clone(), Planner::new(PlannerOptions::default()));
        let as_of = Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap();

        assert!(service
            .generate_proposals(as_of, Duration::hours(8))
            .unwrap()
            .proposals
            .is_empty());

        store.upsert(Task::flexible("t", "T", 30)).unwrap();
        let response = service.generate_proposals(as_of, Duration::hours(8)).unwrap();
        assert_eq!(response.proposals.len(), 1);
        assert_eq!(response.proposals[0].suggested_start, as_of);
    }
}
