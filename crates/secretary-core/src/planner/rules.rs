//! Weighted objective scoring of candidate placements.
//!
//! The score of a placement is the sum of `weight × raw` over an ordered list
//! of rules. Each rule looks at one concern only, which keeps them testable in
//! isolation and lets the breakdown explain which concern decided a choice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{TimeWindow, MAX_PRIORITY};

/// A single scoring concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringRule {
    /// Task priority scaled by family weight.
    Priority,
    /// Deadline urgency and margin; large penalty when late.
    Deadline,
    /// How much of the family's weekly deficit the placement closes.
    FamilyDeficit,
    /// Minutes pushed beyond the family's weekly target.
    FamilyOveruse,
    /// Progress towards the family's daily minimum on that day.
    FamilyDailyTarget,
    /// Residual gaps too small to be useful.
    Fragmentation,
    /// Flat bonus for pomodoro-segmented placements.
    Pomodoro,
}

impl ScoringRule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Deadline => "deadline",
            Self::FamilyDeficit => "family_deficit",
            Self::FamilyOveruse => "family_overuse",
            Self::FamilyDailyTarget => "family_daily_target",
            Self::Fragmentation => "fragmentation",
            Self::Pomodoro => "pomodoro",
        }
    }

    /// Raw (unweighted) value of this rule for a candidate.
    pub fn evaluate(&self, ctx: &CandidateContext) -> f64 {
        match self {
            Self::Priority => priority_score(ctx),
            Self::Deadline => deadline_score(ctx),
            Self::FamilyDeficit => family_deficit_score(ctx),
            Self::FamilyOveruse => family_overuse_score(ctx),
            Self::FamilyDailyTarget => family_daily_target_score(ctx),
            Self::Fragmentation => fragmentation_score(ctx),
            Self::Pomodoro => {
                if ctx.segmented {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Everything a rule may look at for one candidate placement.
#[derive(Debug, Clone)]
pub struct CandidateContext {
    pub as_of: DateTime<Utc>,
    pub priority: i32,
    pub family_weight: f64,
    pub deadline: Option<DateTime<Utc>>,
    /// Work span of the placement, excluding travel.
    pub usable: TimeWindow,
    pub work_minutes: i64,
    pub weekly_target: Option<u32>,
    /// Family deficit before this placement, in the candidate's week.
    pub deficit: i64,
    /// Minutes this placement adds beyond the weekly target.
    pub overuse: i64,
    pub min_daily: Option<u32>,
    /// Daily-minimum shortfall before this placement, on the candidate's day.
    pub daily_shortfall: i64,
    /// Residual gaps the placement leaves inside its free window, in minutes.
    pub residual_gaps: [i64; 2],
    pub min_useful_gap: i64,
    pub segmented: bool,
}

impl CandidateContext {
    pub fn is_late(&self) -> bool {
        self.deadline.is_some_and(|d| self.usable.end > d)
    }

    pub fn minutes_late(&self) -> i64 {
        self.deadline
            .map(|d| (self.usable.end - d).num_minutes().max(0))
            .unwrap_or(0)
    }
}

pub fn priority_score(ctx: &CandidateContext) -> f64 {
    f64::from(ctx.priority) / f64::from(MAX_PRIORITY) * ctx.family_weight
}

/// On time: `urgency × (0.5 + 0.5 × margin)`; late: `-(1 + hours_late/24)`.
pub fn deadline_score(ctx: &CandidateContext) -> f64 {
    let Some(deadline) = ctx.deadline else {
        return 0.0;
    };
    if ctx.is_late() {
        let hours_late = ctx.minutes_late() as f64 / 60.0;
        return -(1.0 + hours_late / 24.0);
    }

    let total = (deadline - ctx.as_of).num_minutes() as f64;
    let hours_until = (total / 60.0).max(0.0);
    let urgency = 1.0 / (1.0 + hours_until / 24.0);
    let margin = if total > 0.0 {
        ((deadline - ctx.usable.end).num_minutes() as f64 / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    urgency * (0.5 + 0.5 * margin)
}

pub fn family_deficit_score(ctx: &CandidateContext) -> f64 {
    match ctx.weekly_target {
        Some(target) if target > 0 => {
            ctx.deficit.min(ctx.work_minutes).max(0) as f64 / f64::from(target)
        }
        _ => 0.0,
    }
}

pub fn family_overuse_score(ctx: &CandidateContext) -> f64 {
    match ctx.weekly_target {
        Some(target) if target > 0 => {
            -(ctx.overuse.min(ctx.work_minutes).max(0) as f64) / f64::from(target)
        }
        _ => 0.0,
    }
}

pub fn family_daily_target_score(ctx: &CandidateContext) -> f64 {
    match ctx.min_daily {
        Some(min) if min > 0 => {
            ctx.daily_shortfall.min(ctx.work_minutes).max(0) as f64 / f64::from(min)
        }
        _ => 0.0,
    }
}

pub fn fragmentation_score(ctx: &CandidateContext) -> f64 {
    let small = ctx
        .residual_gaps
        .iter()
        .filter(|gap| **gap > 0 && **gap < ctx.min_useful_gap)
        .count();
    -0.5 * small as f64
}

/// Weights for each rule, as stored in the `[weights]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    #[serde(default = "default_priority_weight")]
    pub priority: f64,
    #[serde(default = "default_deadline_weight")]
    pub deadline: f64,
    #[serde(default = "default_family_deficit_weight")]
    pub family_deficit: f64,
    #[serde(default = "default_family_overuse_weight")]
    pub family_overuse: f64,
    #[serde(default = "default_family_target_weight")]
    pub family_daily_target: f64,
    #[serde(default = "default_fragmentation_weight")]
    pub fragmentation: f64,
    #[serde(default = "default_pomodoro_weight")]
    pub pomodoro: f64,
}

fn default_priority_weight() -> f64 {
    1.0
}
fn default_deadline_weight() -> f64 {
    4.0
}
fn default_family_deficit_weight() -> f64 {
    3.0
}
fn default_family_overuse_weight() -> f64 {
    2.0
}
fn default_family_target_weight() -> f64 {
    1.0
}
fn default_fragmentation_weight() -> f64 {
    1.0
}
fn default_pomodoro_weight() -> f64 {
    0.5
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            priority: default_priority_weight(),
            deadline: default_deadline_weight(),
            family_deficit: default_family_deficit_weight(),
            family_overuse: default_family_overuse_weight(),
            family_daily_target: default_family_target_weight(),
            fragmentation: default_fragmentation_weight(),
            pomodoro: default_pomodoro_weight(),
        }
    }
}

impl ObjectiveWeights {
    pub fn weight_of(&self, rule: ScoringRule) -> f64 {
        match rule {
            ScoringRule::Priority => self.priority,
            ScoringRule::Deadline => self.deadline,
            ScoringRule::FamilyDeficit => self.family_deficit,
            ScoringRule::FamilyOveruse => self.family_overuse,
            ScoringRule::FamilyDailyTarget => self.family_daily_target,
            ScoringRule::Fragmentation => self.fragmentation,
            ScoringRule::Pomodoro => self.pomodoro,
        }
    }
}

/// One evaluated rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveTerm {
    pub rule: ScoringRule,
    pub weight: f64,
    pub raw: f64,
    pub contribution: f64,
}

/// Complete scoring breakdown for explainability.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub terms: Vec<ObjectiveTerm>,
    pub total: f64,
}

impl ScoreBreakdown {
    pub fn add_term(&mut self, term: ObjectiveTerm) {
        self.total += term.contribution;
        self.terms.push(term);
    }

    pub fn term(&self, rule: ScoringRule) -> Option<&ObjectiveTerm> {
        self.terms.iter().find(|t| t.rule == rule)
    }

    /// Non-zero terms, largest absolute contribution first.
    pub fn terms_by_influence(&self) -> Vec<&ObjectiveTerm> {
        let mut sorted: Vec<_> = self
            .terms
            .iter()
            .filter(|t| t.contribution != 0.0)
            .collect();
        sorted.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        sorted
    }

    /// Short human-readable summary of the dominant factors.
    pub fn summary(&self) -> String {
        let top: Vec<String> = self
            .terms_by_influence()
            .into_iter()
            .take(2)
            .map(|t| format!("{} ({:+.2})", t.rule.name(), t.contribution))
            .collect();
        match top.as_slice() {
            [] => "no factor stood out".to_string(),
            [only] => format!("dominated by {only}"),
            [first, second, ..] => format!("dominated by {first}, then {second}"),
        }
    }
}

/// Ordered list of weighted rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorer {
    rules: Vec<(ScoringRule, f64)>,
}

impl Scorer {
    pub fn new(rules: Vec<(ScoringRule, f64)>) -> Self {
        Self { rules }
    }

    /// All rules in their canonical order with the given weights.
    pub fn from_weights(weights: &ObjectiveWeights) -> Self {
        let rules = [
            ScoringRule::Priority,
            ScoringRule::Deadline,
            ScoringRule::FamilyDeficit,
            ScoringRule::FamilyOveruse,
            ScoringRule::FamilyDailyTarget,
            ScoringRule::Fragmentation,
            ScoringRule::Pomodoro,
        ]
        .into_iter()
        .map(|rule| (rule, weights.weight_of(rule)))
        .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[(ScoringRule, f64)] {
        &self.rules
    }

    pub fn score(&self, ctx: &CandidateContext) -> ScoreBreakdown {
        let mut breakdown = ScoreBreakdown::default();
        for (rule, weight) in &self.rules {
            let raw = rule.evaluate(ctx);
            breakdown.add_term(ObjectiveTerm {
                rule: *rule,
                weight: *weight,
                raw,
                contribution: weight * raw,
            });
        }
        breakdown
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::from_weights(&ObjectiveWeights::default())
    }
}
