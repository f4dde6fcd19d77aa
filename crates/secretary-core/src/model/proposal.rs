//! Planner output in the `PlannerProposal` / `PlanSolution` wire shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scored, justified placement for one flexible task.
///
/// `suggested_start..suggested_end` includes the task's travel buffers on
/// both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub event_id: String,
    pub suggested_start: DateTime<Utc>,
    pub suggested_end: DateTime<Utc>,
    pub score: f64,
    pub reasoning: String,
}

/// A flexible task that could not be placed in this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnplaceableTask {
    pub event_id: String,
    pub reason: String,
}

/// Response body of `GET /api/plan/proposals`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub proposals: Vec<Proposal>,
    #[serde(default)]
    pub unplaceable: Vec<UnplaceableTask>,
}

/// One contiguous piece of a plan: a work segment, a break, or a whole
/// non-segmented task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledChunk {
    pub event_id: String,
    pub chunk_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub is_break: bool,
}

/// Response body of `POST /api/plan/solve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSolution {
    pub horizon_start: DateTime<Utc>,
    pub horizon_end: DateTime<Utc>,
    pub scheduled: Vec<ScheduledChunk>,
    pub objective_value: Option<f64>,
    pub solver: String,
}
