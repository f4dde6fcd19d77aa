//! Constraint solver and proposal generator.
//!
//! A planning pass:
//! 1. validates the snapshot and orders tasks by their dependency graph
//!    (cycles abort the pass);
//! 2. builds a private availability model (overlapping fixed tasks abort the
//!    pass) and family aggregator;
//! 3. repeatedly picks the most urgent ready flexible task, scores every
//!    candidate free window with the configured rules and commits the best
//!    one, so later tasks see the updated availability.
//!
//! Each flexible task ends the pass either placed or explicitly unplaceable.

pub mod graph;
mod pass;
pub mod rules;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::availability::{AvailabilityModel, QuietHours};
use crate::calendar::{parse_timezone, LocalCalendar};
use crate::error::{ConfigError, Result, ValidationError};
use crate::model::{
    PlanSolution, Proposal, ProposalResponse, ScheduledChunk, TimeWindow, UnplaceableTask,
};
use crate::pomodoro::Segment;
use crate::storage::Config;
use crate::store::Snapshot;

pub use graph::DependencyGraph;
use pass::PlanningPass;
pub use rules::{ObjectiveTerm, ObjectiveWeights, ScoreBreakdown, Scorer, ScoringRule};

/// Name reported in [`PlanSolution::solver`].
pub const SOLVER_NAME: &str = "greedy";

/// Tunables of the planner.
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    /// Candidate starts are aligned up to this grid (minutes).
    pub slot_granularity_min: u32,
    /// Residual gaps shorter than this are penalized as fragmentation.
    pub min_useful_gap_min: u32,
    pub max_candidates_per_task: usize,
    pub quiet_hours: Vec<QuietHours>,
    pub calendar: LocalCalendar,
    pub weights: ObjectiveWeights,
    /// Budget used by [`Planner::generate_proposals`] and [`Planner::solve`].
    pub timeout: Option<std::time::Duration>,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            slot_granularity_min: 5,
            min_useful_gap_min: 15,
            max_candidates_per_task: 96,
            quiet_hours: Vec::new(),
            calendar: LocalCalendar::default(),
            weights: ObjectiveWeights::default(),
            timeout: None,
        }
    }
}

impl PlannerOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let planner = &config.planner;
        Ok(Self {
            slot_granularity_min: planner.slot_granularity_min,
            min_useful_gap_min: planner.min_useful_gap_min,
            max_candidates_per_task: planner.max_candidates_per_task,
            quiet_hours: config.quiet_hours.clone(),
            calendar: LocalCalendar::new(parse_timezone(&planner.timezone)?),
            weights: config.weights,
            timeout: planner.timeout_ms.map(std::time::Duration::from_millis),
        })
    }
}

/// A committed placement with everything that explains it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub proposal: Proposal,
    /// Occupied interval including travel and buffers.
    pub block: TimeWindow,
    /// Work span (segments and their breaks).
    pub usable: TimeWindow,
    pub segments: Vec<Segment>,
    pub chunks: Vec<ScheduledChunk>,
    pub breakdown: ScoreBreakdown,
    /// Ends after the task's deadline because no on-time window existed.
    pub deadline_risk: bool,
}

/// Terminal state of one flexible task in a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Placed(Placement),
    Unplaceable(UnplaceableTask),
}

impl TaskOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            TaskOutcome::Placed(p) => &p.proposal.event_id,
            TaskOutcome::Unplaceable(u) => &u.event_id,
        }
    }

    pub fn placement(&self) -> Option<&Placement> {
        match self {
            TaskOutcome::Placed(p) => Some(p),
            TaskOutcome::Unplaceable(_) => None,
        }
    }

    pub fn is_unplaceable(&self) -> bool {
        matches!(self, TaskOutcome::Unplaceable(_))
    }
}

/// Result of a full planning pass, outcomes in placement order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    pub as_of: DateTime<Utc>,
    pub horizon_end: DateTime<Utc>,
    /// Store revision of the planned snapshot.
    pub revision: u64,
    pub outcomes: Vec<TaskOutcome>,
}

impl PlanReport {
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.outcomes.iter().filter_map(TaskOutcome::placement)
    }

    pub fn unplaceable(&self) -> impl Iterator<Item = &UnplaceableTask> {
        self.outcomes.iter().filter_map(|o| match o {
            TaskOutcome::Unplaceable(u) => Some(u),
            TaskOutcome::Placed(_) => None,
        })
    }

    pub fn outcome(&self, event_id: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.event_id() == event_id)
    }

    /// Sum of placement scores.
    pub fn objective_value(&self) -> f64 {
        self.placements().map(|p| p.proposal.score).sum()
    }

    /// Proposals ordered by start then id; unplaceable tasks by id.
    pub fn into_response(self) -> ProposalResponse {
        let mut proposals = Vec::new();
        let mut unplaceable = Vec::new();
        for outcome in self.outcomes {
            match outcome {
                TaskOutcome::Placed(p) => proposals.push(p.proposal),
                TaskOutcome::Unplaceable(u) => unplaceable.push(u),
            }
        }
        proposals.sort_by(|a, b| {
            a.suggested_start
                .cmp(&b.suggested_start)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        unplaceable.sort_by(|a, b| a.event_id.cmp(&b.event_id));
        ProposalResponse {
            proposals,
            unplaceable,
        }
    }

    /// Chunk-level plan of every placed task.
    pub fn into_solution(self) -> PlanSolution {
        let objective_value = Some(self.objective_value());
        let mut scheduled: Vec<ScheduledChunk> = self
            .outcomes
            .into_iter()
            .filter_map(|o| match o {
                TaskOutcome::Placed(p) => Some(p.chunks),
                TaskOutcome::Unplaceable(_) => None,
            })
            .flatten()
            .collect();
        scheduled.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        PlanSolution {
            horizon_start: self.as_of,
            horizon_end: self.horizon_end,
            scheduled,
            objective_value,
            solver: SOLVER_NAME.to_string(),
        }
    }
}

/// Counts gathered by [`Planner::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub tasks: usize,
    pub flexible: usize,
    pub free_minutes: i64,
}

/// Stateless planner; every call plans from scratch over the given snapshot.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    options: PlannerOptions,
    scorer: Scorer,
}

impl Planner {
    pub fn new(options: PlannerOptions) -> Self {
        let scorer = Scorer::from_weights(&options.weights);
        Self { options, scorer }
    }

    /// Replace the rule list built from the options' weights.
    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    fn range(as_of: DateTime<Utc>, horizon: Duration) -> Result<TimeWindow> {
        let end = as_of
            .checked_add_signed(horizon)
            .ok_or_else(|| ValidationError::invalid("horizon", "out of range"))?;
        Ok(TimeWindow::new(as_of, end)?)
    }

    /// Run a full pass over `[as_of, as_of + horizon)`.
    ///
    /// # Errors
    /// Structural errors (`Validation`, `Reference`, `DependencyCycle`,
    /// `SchedulingConflict`) and `PlanningTimeout` abort the pass; no partial
    /// result is returned.
    pub fn plan(
        &self,
        snapshot: &Snapshot,
        as_of: DateTime<Utc>,
        horizon: Duration,
        timeout: Option<std::time::Duration>,
    ) -> Result<PlanReport> {
        let range = Self::range(as_of, horizon)?;
        let pass = PlanningPass::prepare(snapshot, &self.options, &self.scorer, range, timeout)?;
        let outcomes = pass.run()?;

        let report = PlanReport {
            as_of,
            horizon_end: range.end,
            revision: snapshot.revision,
            outcomes,
        };
        info!(
            revision = report.revision,
            placed = report.placements().count(),
            unplaceable = report.unplaceable().count(),
            "planning pass finished"
        );
        Ok(report)
    }

    /// Proposals for every flexible task, using the configured timeout.
    pub fn generate_proposals(
        &self,
        snapshot: &Snapshot,
        as_of: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<ProposalResponse> {
        self.plan(snapshot, as_of, horizon, self.options.timeout)
            .map(PlanReport::into_response)
    }

    /// Chunk-level plan between `from` and `to`.
    pub fn solve(
        &self,
        snapshot: &Snapshot,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PlanSolution> {
        self.plan(snapshot, from, to - from, self.options.timeout)
            .map(PlanReport::into_solution)
    }

    /// Structural validation only: records, references, cycles and fixed
    /// overlaps in the horizon.
    pub fn check(
        &self,
        snapshot: &Snapshot,
        as_of: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<CheckSummary> {
        let range = Self::range(as_of, horizon)?;
        for task in snapshot.tasks.values() {
            task.validate()?;
        }
        for family in snapshot.families.values() {
            family.validate()?;
        }
        DependencyGraph::build(snapshot)?.topological_order()?;
        let availability = AvailabilityModel::from_snapshot(
            snapshot,
            range,
            &self.options.quiet_hours,
            &self.options.calendar,
        )?;
        Ok(CheckSummary {
            tasks: snapshot.tasks.len(),
            flexible: snapshot.flexible_tasks().count(),
            free_minutes: availability.free_minutes(range),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::model::{Dependency, Family, Task};
    use crate::pomodoro::PomodoroSettings;
    use chrono::TimeZone;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, m, 0).unwrap()
    }

    fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(from, to).unwrap()
    }

    fn planner() -> Planner {
        Planner::new(PlannerOptions::default())
    }

    fn day() -> Duration {
        Duration::hours(10)
    }

    fn placed<'r>(report: &'r PlanReport, id: &str) -> &'r Placement {
        report
            .outcome(id)
            .and_then(TaskOutcome::placement)
            .unwrap_or_else(|| panic!("{id} not placed"))
    }

    #[test]
    fn places_around_fixed_tasks() {
        let snapshot = Snapshot::new(
            vec![
                Task::fixed("standup", "Standup", at(10, 8, 0), 60),
                Task::flexible("write", "Write", 60),
            ],
            vec![],
            PomodoroSettings::default(),
        );
        let report = planner().plan(&snapshot, at(10, 8, 0), day(), None).unwrap();
        let p = placed(&report, "write");
        assert_eq!(p.block.start, at(10, 9, 0));
        assert_eq!(p.usable.duration_minutes(), 60);
        assert!(!p.deadline_risk);
    }

    #[test]
    fn travel_is_part_of_the_proposal() {
        let snapshot = Snapshot::new(
            vec![Task::flexible("gym", "Gym", 60).with_travel(15)],
            vec![],
            PomodoroSettings::default(),
        );
        let report = planner().plan(&snapshot, at(10, 8, 0), day(), None).unwrap();
        let p = placed(&report, "gym");
        assert_eq!(p.proposal.suggested_start, at(10, 8, 0));
        assert_eq!(p.proposal.suggested_end, at(10, 9, 30));
        assert_eq!(p.usable, window(at(10, 8, 15), at(10, 9, 15)));
        assert!(p.proposal.reasoning.contains("travel"));
    }

    #[test]
    fn higher_priority_is_placed_first() {
        let snapshot = Snapshot::new(
            vec![
                Task::flexible("low", "Low", 60).with_priority(2),
                Task::flexible("high", "High", 60).with_priority(9),
            ],
            vec![],
            PomodoroSettings::default(),
        );
        let report = planner().plan(&snapshot, at(10, 8, 0), day(), None).unwrap();
        assert_eq!(report.outcomes[0].event_id(), "high");
        assert_eq!(placed(&report, "high").block.start, at(10, 8, 0));
        assert_eq!(placed(&report, "low").block.start, at(10, 9, 0));
    }

    #[test]
    fn dependency_lag_is_respected() {
        let snapshot = Snapshot::new(
            vec![
                Task::flexible("draft", "Draft", 60).with_priority(1),
                Task::flexible("review", "Review", 30)
                    .with_priority(10)
                    .depending_on(Dependency::finish_to_start("draft", 30)),
                Task::flexible("kickoff", "Kickoff", 30)
                    .depending_on(Dependency::start_to_start("draft", 10)),
            ],
            vec![],
            PomodoroSettings::default(),
        );
        let report = planner().plan(&snapshot, at(10, 8, 0), day(), None).unwrap();
        let draft = placed(&report, "draft");
        let review = placed(&report, "review");
        let kickoff = placed(&report, "kickoff");
        assert!(review.usable.start >= draft.usable.end + Duration::minutes(30));
        assert!(kickoff.usable.start >= draft.usable.start + Duration::minutes(10));
    }

    #[test]
    fn unplaceable_predecessor_blocks_dependents() {
        let snapshot = Snapshot::new(
            vec![
                Task::flexible("huge", "Huge", 2000),
                Task::flexible("after", "After", 10)
                    .depending_on(Dependency::finish_to_start("huge", 0)),
            ],
            vec![],
            PomodoroSettings::default(),
        );
        let report = planner().plan(&snapshot, at(10, 8, 0), day(), None).unwrap();
        assert!(report.outcome("huge").unwrap().is_unplaceable());
        match report.outcome("after").unwrap() {
            TaskOutcome::Unplaceable(u) => assert!(u.reason.contains("huge")),
            other => panic!("expected unplaceable, got {other:?}"),
        }
    }

    #[test]
    fn daily_cap_is_a_hard_constraint() {
        let family = Family::new("chores", "Chores").with_daily_limits(None, Some(60));
        let snapshot = Snapshot::new(
            vec![
                Task::flexible("a", "A", 45).with_family("chores"),
                Task::flexible("b", "B", 30).with_family("chores"),
            ],
            vec![family],
            PomodoroSettings::default(),
        );
        let report = planner().plan(&snapshot, at(10, 8, 0), day(), None).unwrap();
        assert!(report.outcome("a").and_then(TaskOutcome::placement).is_some());
        match report.outcome("b").unwrap() {
            TaskOutcome::Unplaceable(u) => assert!(u.reason.contains("daily limit")),
            other => panic!("expected unplaceable, got {other:?}"),
        }
    }

    #[test]
    fn pomodoro_tasks_produce_break_chunks() {
        let snapshot = Snapshot::new(
            vec![Task::flexible("deep", "Deep work", 95).with_pomodoro()],
            vec![],
            PomodoroSettings::classic(),
        );
        let solution = planner()
            .solve(&snapshot, at(10, 8, 0), at(10, 18, 0))
            .unwrap();
        assert_eq!(solution.solver, "greedy");
        assert_eq!(solution.scheduled.len(), 7);
        assert_eq!(solution.scheduled.iter().filter(|c| c.is_break).count(), 3);
        let work: i64 = solution
            .scheduled
            .iter()
            .filter(|c| !c.is_break)
            .map(|c| (c.end - c.start).num_minutes())
            .sum();
        assert_eq!(work, 95);
    }

    #[test]
    fn check_reports_cycle() {
        let snapshot = Snapshot::new(
            vec![
                Task::flexible("a", "A", 10).depending_on(Dependency::finish_to_start("b", 0)),
                Task::flexible("b", "B", 10).depending_on(Dependency::finish_to_start("a", 0)),
            ],
            vec![],
            PomodoroSettings::default(),
        );
        assert!(matches!(
            planner().check(&snapshot, at(10, 8, 0), day()),
            Err(CoreError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn empty_horizon_is_rejected() {
        let result = planner().plan(&Snapshot::default(), at(10, 8, 0), Duration::zero(), None);
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn options_from_config() {
        let mut config = Config::default();
        config.planner.timezone = "Europe/Helsinki".into();
        config.planner.timeout_ms = Some(250);
        let options = PlannerOptions::from_config(&config).unwrap();
        assert_eq!(options.calendar.timezone(), chrono_tz::Europe::Helsinki);
        assert_eq!(options.timeout, Some(std::time::Duration::from_millis(250)));

        config.planner.timezone = "Mars/Olympus".into();
        assert!(PlannerOptions::from_config(&config).is_err());
    }
}
