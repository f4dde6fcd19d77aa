//! One greedy planning pass over a snapshot.
//!
//! The pass owns its availability model and family aggregator; the snapshot it
//! reads is never mutated.

use std::cmp::Ordering;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::graph::DependencyGraph;
use super::rules::{CandidateContext, ScoreBreakdown, Scorer};
use super::{Placement, PlannerOptions, TaskOutcome};
use crate::aggregator::FamilyAggregator;
use crate::availability::AvailabilityModel;
use crate::error::{CoreError, Result, ValidationError};
use crate::model::{
    align_up, DependencyType, Family, Proposal, ScheduledChunk, Task, TimeWindow,
    UnplaceableTask,
};
use crate::pomodoro::{self, Segment};
use crate::store::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    /// Usable (travel-free) interval of a fixed or placed task.
    Resolved {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Failed,
}

/// Wall-clock budget of a pass.
#[derive(Debug, Clone, Copy)]
struct Budget {
    started: Instant,
    limit: Option<std::time::Duration>,
}

impl Budget {
    fn start(limit: Option<std::time::Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    fn check(&self) -> Result<()> {
        match self.limit {
            Some(limit) if self.started.elapsed() >= limit => {
                Err(CoreError::PlanningTimeout { budget: limit })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    block: TimeWindow,
    usable: TimeWindow,
    chunks: Vec<ScheduledChunk>,
    breakdown: ScoreBreakdown,
    late: bool,
}

/// Best candidates found for one task.
#[derive(Debug, Default)]
struct Search {
    on_time: Option<Candidate>,
    late: Option<Candidate>,
    considered: usize,
    over_daily_cap: usize,
}

impl Search {
    fn offer(&mut self, candidate: Candidate) {
        let slot = if candidate.late {
            &mut self.late
        } else {
            &mut self.on_time
        };
        // Candidates arrive in start order, so ties keep the earlier one.
        let better = slot
            .as_ref()
            .map_or(true, |best| candidate.breakdown.total > best.breakdown.total);
        if better {
            *slot = Some(candidate);
        }
    }

    fn into_best(self) -> Option<Candidate> {
        self.on_time.or(self.late)
    }
}

pub(crate) struct PlanningPass<'a> {
    snapshot: &'a Snapshot,
    options: &'a PlannerOptions,
    scorer: &'a Scorer,
    as_of: DateTime<Utc>,
    range: TimeWindow,
    graph: DependencyGraph,
    /// Tasks indexed like the graph's nodes.
    tasks: Vec<&'a Task>,
    states: Vec<NodeState>,
    availability: AvailabilityModel,
    aggregator: FamilyAggregator<'a>,
    budget: Budget,
}

impl<'a> PlanningPass<'a> {
    /// Validate the snapshot and build the pass-local working state.
    ///
    /// Any structural problem (invalid record, dangling reference, cycle,
    /// overlapping fixed tasks) fails here, before a single task is placed.
    pub(crate) fn prepare(
        snapshot: &'a Snapshot,
        options: &'a PlannerOptions,
        scorer: &'a Scorer,
        range: TimeWindow,
        timeout: Option<std::time::Duration>,
    ) -> Result<Self> {
        let budget = Budget::start(timeout);

        for task in snapshot.tasks.values() {
            task.validate()?;
        }
        for family in snapshot.families.values() {
            family.validate()?;
        }
        snapshot.pomodoro.validate()?;

        let graph = DependencyGraph::build(snapshot)?;
        graph.topological_order()?;

        let availability = AvailabilityModel::from_snapshot(
            snapshot,
            range,
            &options.quiet_hours,
            &options.calendar,
        )?;
        let aggregator = FamilyAggregator::from_snapshot(snapshot, options.calendar);

        let tasks: Vec<&Task> = snapshot.tasks.values().collect();
        let states = tasks
            .iter()
            .map(|task| match task.fixed_interval() {
                Some(interval) => NodeState::Resolved {
                    start: interval.start,
                    end: interval.end,
                },
                None if task.is_fixed() => NodeState::Failed,
                None => NodeState::Pending,
            })
            .collect();

        budget.check()?;
        Ok(Self {
            snapshot,
            options,
            scorer,
            as_of: range.start,
            range,
            graph,
            tasks,
            states,
            availability,
            aggregator,
            budget,
        })
    }

    /// Place every flexible task, most urgent ready task first.
    pub(crate) fn run(mut self) -> Result<Vec<TaskOutcome>> {
        let mut outcomes = Vec::new();
        loop {
            self.budget.check()?;
            let Some(node) = self.next_ready() else {
                break;
            };
            outcomes.push(self.place(node)?);
        }
        Ok(outcomes)
    }

    fn next_ready(&self) -> Option<usize> {
        (0..self.graph.len())
            .filter(|node| self.states[*node] == NodeState::Pending)
            .filter(|node| {
                self.graph
                    .predecessors(*node)
                    .iter()
                    .all(|edge| self.states[edge.from] != NodeState::Pending)
            })
            .min_by(|a, b| self.compare_urgency(*a, *b))
    }

    /// Priority desc, family deficit desc, deadline asc (none last), id asc.
    fn compare_urgency(&self, a: usize, b: usize) -> Ordering {
        let (ta, tb) = (self.tasks[a], self.tasks[b]);
        tb.priority
            .cmp(&ta.priority)
            .then_with(|| self.deficit_of(tb).cmp(&self.deficit_of(ta)))
            .then_with(|| match (ta.deadline, tb.deadline) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| ta.id.cmp(&tb.id))
    }

    fn deficit_of(&self, task: &Task) -> i64 {
        task.family_key
            .as_deref()
            .map_or(0, |key| self.aggregator.deficit(key, self.as_of))
    }

    fn place(&mut self, node: usize) -> Result<TaskOutcome> {
        let task = self.tasks[node];

        if let Some(blocker) = self.failed_predecessor(node) {
            let reason = format!("depends on '{blocker}', which could not be placed");
            return Ok(self.fail(node, reason));
        }

        let segments = pomodoro::segment_task(task, &self.snapshot.pomodoro);
        let span = pomodoro::span_minutes(&segments);
        let needed = task.padding_before() + span + task.padding_after();
        let earliest = self.earliest_start(node, span)?;
        let family = self.snapshot.family_of(task);

        let search = self.search(task, family, &segments, earliest);
        let considered = search.considered;
        let over_cap = search.over_daily_cap;
        Ok(match search.into_best() {
            Some(candidate) => self.commit(node, family, &segments, candidate, considered),
            None => {
                let reason = self.explain_failure(task, family, needed, earliest, over_cap);
                self.fail(node, reason)
            }
        })
    }

    fn failed_predecessor(&self, node: usize) -> Option<&str> {
        self.graph
            .predecessors(node)
            .iter()
            .find(|edge| self.states[edge.from] == NodeState::Failed)
            .map(|edge| self.graph.id(edge.from))
    }

    /// Lower bound on the usable start implied by resolved predecessors.
    ///
    /// # Errors
    /// `Validation` when a lag pushes the bound outside the representable
    /// time range.
    fn earliest_start(&self, node: usize, span_min: i64) -> Result<Option<DateTime<Utc>>> {
        let span = Duration::minutes(span_min);
        let mut earliest = None;
        for edge in self.graph.predecessors(node) {
            let NodeState::Resolved { start, end } = self.states[edge.from] else {
                continue;
            };
            let bound = Duration::try_minutes(edge.lag_min)
                .and_then(|lag| match edge.kind {
                    DependencyType::FinishToStart => end.checked_add_signed(lag),
                    DependencyType::StartToStart => start.checked_add_signed(lag),
                    DependencyType::FinishToFinish => end
                        .checked_add_signed(lag)
                        .and_then(|t| t.checked_sub_signed(span)),
                    DependencyType::StartToFinish => start
                        .checked_add_signed(lag)
                        .and_then(|t| t.checked_sub_signed(span)),
                })
                .ok_or_else(|| {
                    ValidationError::invalid(
                        "lag_min",
                        format!(
                            "lag of {} min after '{}' is out of range",
                            edge.lag_min,
                            self.graph.id(edge.from)
                        ),
                    )
                })?;
            earliest = earliest.max(Some(bound));
        }
        Ok(earliest)
    }

    fn search(
        &self,
        task: &Task,
        family: Option<&Family>,
        segments: &[Segment],
        earliest: Option<DateTime<Utc>>,
    ) -> Search {
        let pad_before = task.padding_before();
        let work_minutes = pomodoro::work_minutes(segments);
        let segmented = segments.len() > 1;
        let lower = earliest.map(|e| e - Duration::minutes(pad_before));

        let mut search = Search::default();
        for free in self
            .availability
            .free_windows_within(self.range, &task.time_windows)
        {
            if search.considered >= self.options.max_candidates_per_task {
                break;
            }
            let Some((block, usable, chunks)) =
                self.fit_in_window(task, family, segments, free, lower, &mut search)
            else {
                continue;
            };
            search.considered += 1;

            let residual_gaps = [
                (block.start - free.start).num_minutes(),
                (free.end - block.end).num_minutes(),
            ];
            let ctx = self.context(task, family, usable, work_minutes, residual_gaps, segmented);
            let late = ctx.is_late();
            search.offer(Candidate {
                block,
                usable,
                chunks,
                breakdown: self.scorer.score(&ctx),
                late,
            });
        }
        search
    }

    /// First grid-aligned block inside `free` that keeps the task's family
    /// under its daily cap. A start that breaks the cap is retried from the
    /// next local midnight, where the daily budget starts over.
    fn fit_in_window(
        &self,
        task: &Task,
        family: Option<&Family>,
        segments: &[Segment],
        free: TimeWindow,
        lower: Option<DateTime<Utc>>,
        search: &mut Search,
    ) -> Option<(TimeWindow, TimeWindow, Vec<ScheduledChunk>)> {
        let pad_before = task.padding_before();
        let span = pomodoro::span_minutes(segments);
        let needed = pad_before + span + task.padding_after();
        let calendar = &self.options.calendar;

        let mut from = lower.map_or(free.start, |l| l.max(free.start));
        loop {
            let start = align_up(from, self.options.slot_granularity_min);
            let block = TimeWindow::from_minutes(start, needed);
            if block.end > free.end {
                return None;
            }
            let usable = TimeWindow::from_minutes(start + Duration::minutes(pad_before), span);
            let chunks = chunks_for(&task.id, segments, usable.start);
            let over_cap = family.is_some_and(|f| {
                self.aggregator
                    .would_exceed_daily_cap(&f.key, &work_windows(&chunks))
            });
            if !over_cap {
                return Some((block, usable, chunks));
            }
            search.over_daily_cap += 1;

            let next_day = calendar.day_window(calendar.day_of(usable.start)).end;
            from = next_day - Duration::minutes(pad_before);
            if from <= start {
                return None;
            }
        }
    }

    fn context(
        &self,
        task: &Task,
        family: Option<&Family>,
        usable: TimeWindow,
        work_minutes: i64,
        residual_gaps: [i64; 2],
        segmented: bool,
    ) -> CandidateContext {
        let key = family.map(|f| f.key.as_str());
        let day = self.options.calendar.day_of(usable.start);
        CandidateContext {
            as_of: self.as_of,
            priority: task.priority,
            family_weight: family.map_or(1.0, |f| f.weight),
            deadline: task.deadline,
            usable,
            work_minutes,
            weekly_target: family.and_then(|f| f.weekly_target_minutes),
            deficit: key.map_or(0, |k| self.aggregator.deficit(k, usable.start)),
            overuse: key.map_or(0, |k| {
                self.aggregator
                    .weekly_overuse(k, usable.start, work_minutes)
            }),
            min_daily: family.and_then(|f| f.min_daily_minutes),
            daily_shortfall: key.map_or(0, |k| self.aggregator.daily_shortfall(k, day)),
            residual_gaps,
            min_useful_gap: i64::from(self.options.min_useful_gap_min),
            segmented,
        }
    }

    fn commit(
        &mut self,
        node: usize,
        family: Option<&Family>,
        segments: &[Segment],
        candidate: Candidate,
        considered: usize,
    ) -> TaskOutcome {
        let task = self.tasks[node];

        self.availability.occupy(candidate.block);
        if let Some(family) = family {
            for window in work_windows(&candidate.chunks) {
                self.aggregator.record(&family.key, window);
            }
        }
        self.states[node] = NodeState::Resolved {
            start: candidate.usable.start,
            end: candidate.usable.end,
        };

        let reasoning = reasoning(task, segments, &candidate, considered);
        if candidate.late {
            warn!(task = %task.id, end = %candidate.usable.end, "placed past deadline");
        } else {
            debug!(
                task = %task.id,
                start = %candidate.block.start,
                score = candidate.breakdown.total,
                considered,
                "placed task"
            );
        }

        TaskOutcome::Placed(Placement {
            proposal: Proposal {
                event_id: task.id.clone(),
                suggested_start: candidate.block.start,
                suggested_end: candidate.block.end,
                score: candidate.breakdown.total,
                reasoning,
            },
            block: candidate.block,
            usable: candidate.usable,
            segments: segments.to_vec(),
            chunks: candidate.chunks,
            breakdown: candidate.breakdown,
            deadline_risk: candidate.late,
        })
    }

    fn fail(&mut self, node: usize, reason: String) -> TaskOutcome {
        let task = self.tasks[node];
        self.states[node] = NodeState::Failed;
        warn!(task = %task.id, %reason, "task unplaceable");
        TaskOutcome::Unplaceable(UnplaceableTask {
            event_id: task.id.clone(),
            reason,
        })
    }

    fn explain_failure(
        &self,
        task: &Task,
        family: Option<&Family>,
        needed: i64,
        earliest: Option<DateTime<Utc>>,
        over_cap: usize,
    ) -> String {
        if let (Some(family), true) = (family, over_cap > 0) {
            return format!(
                "every free window would exceed the daily limit of family '{}'",
                family.key
            );
        }
        let largest = self
            .availability
            .free_windows_within(self.range, &task.time_windows)
            .map(|w| w.duration_minutes())
            .max()
            .unwrap_or(0);
        if largest < needed {
            return format!("needs {needed} min but the largest free window is {largest} min");
        }
        match earliest {
            Some(at) => format!(
                "no free window of {needed} min left after dependency constraints (earliest start {})",
                at.to_rfc3339()
            ),
            None => format!(
                "no free window of {needed} min on the {}-minute grid",
                self.options.slot_granularity_min
            ),
        }
    }
}

/// Lay `segments` out back to back from `start`.
fn chunks_for(task_id: &str, segments: &[Segment], start: DateTime<Utc>) -> Vec<ScheduledChunk> {
    let mut cursor = start;
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let end = cursor + Duration::minutes(i64::from(segment.length_min));
            let chunk = ScheduledChunk {
                event_id: task_id.to_string(),
                chunk_id: format!("{task_id}-{}", index + 1),
                start: cursor,
                end,
                is_break: segment.kind.is_break(),
            };
            cursor = end;
            chunk
        })
        .collect()
}

fn work_windows(chunks: &[ScheduledChunk]) -> Vec<TimeWindow> {
    chunks
        .iter()
        .filter(|c| !c.is_break)
        .map(|c| TimeWindow {
            start: c.start,
            end: c.end,
        })
        .collect()
}

fn reasoning(task: &Task, segments: &[Segment], candidate: &Candidate, considered: usize) -> String {
    let mut text = match (candidate.late, task.deadline) {
        (true, Some(deadline)) => format!(
            "deadline risk: ends {} min after the deadline {}; {}",
            (candidate.usable.end - deadline).num_minutes(),
            deadline.to_rfc3339(),
            candidate.breakdown.summary()
        ),
        _ => format!(
            "best of {considered} candidate window{}; {}",
            if considered == 1 { "" } else { "s" },
            candidate.breakdown.summary()
        ),
    };
    let pomodoros = segments.iter().filter(|s| !s.kind.is_break()).count();
    if pomodoros > 1 {
        text.push_str(&format!("; split into {pomodoros} pomodoros"));
    }
    if task.padding_before() + task.padding_after() > 0 {
        text.push_str(&format!(
            "; includes {}+{} min travel/buffer",
            task.padding_before(),
            task.padding_after()
        ));
    }
    text
}
