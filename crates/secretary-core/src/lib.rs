//! # Secretary Core Library
//!
//! This library provides the scheduling core of the calendar secretary: it
//! turns a set of fixed events and flexible tasks into scored placement
//! proposals. It follows a CLI-first philosophy where every operation is
//! available through the standalone `secretary-cli` binary.
//!
//! ## Architecture
//!
//! - **Event Store**: thread-safe task/family records with copy-on-read
//!   snapshots and change notification
//! - **Family Aggregator**: minutes per family against daily and weekly targets
//! - **Availability Model**: free time as the complement of fixed tasks, travel
//!   buffers and quiet hours
//! - **Pomodoro Segmenter**: splits work into pomodoros and breaks
//! - **Planner**: dependency-aware greedy solver with pluggable scoring rules
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`EventStore`]: canonical task and family records
//! - [`Planner`]: planning passes over a [`Snapshot`]
//! - [`PlanningService`]: planner bound to a live store
//! - [`Config`]: configuration management

pub mod aggregator;
pub mod availability;
pub mod calendar;
pub mod error;
pub mod model;
pub mod planner;
pub mod pomodoro;
pub mod service;
pub mod storage;
pub mod store;

pub use aggregator::FamilyAggregator;
pub use availability::{AvailabilityModel, QuietHours};
pub use calendar::LocalCalendar;
pub use error::{ConfigError, CoreError, Result, ValidationError};
pub use model::{
    Dependency, DependencyType, Family, PlanSolution, Proposal, ProposalResponse, ScheduledChunk,
    Task, TaskType, TimeWindow, UnplaceableTask,
};
pub use planner::{
    CheckSummary, ObjectiveWeights, PlanReport, Placement, Planner, PlannerOptions, Scorer,
    ScoringRule, TaskOutcome,
};
pub use pomodoro::{PomodoroSettings, Segment, SegmentKind};
pub use service::PlanningService;
pub use storage::Config;
pub use store::{EventStore, Snapshot, StoreChange, StoreListener};
