//! Scheduling entities: tasks, families, time windows and planner output.

mod family;
mod proposal;
mod task;
mod window;

pub use family::Family;
pub use proposal::{PlanSolution, Proposal, ProposalResponse, ScheduledChunk, UnplaceableTask};
pub use task::{
    ConstraintOptions, Dependency, DependencyType, Task, TaskType, MAX_LAG_MIN, MAX_PRIORITY,
    MIN_PRIORITY,
};
pub use window::{align_up, merge_windows, TimeWindow};
