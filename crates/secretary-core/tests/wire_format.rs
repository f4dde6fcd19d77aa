//! JSON shapes shared with the web client and the backend API.

use chrono::{TimeZone, Utc};
use secretary_core::{
    DependencyType, Family, PlanSolution, ProposalResponse, Snapshot, Task, TaskType,
};

#[test]
fn test_event_item_parses_with_defaults_and_unknown_fields() {
    let json = r#"{
        "id": "evt-1",
        "title": "Write thesis chapter",
        "type": "flexible",
        "duration_min": 120,
        "deadline": "2025-03-14T17:00:00Z",
        "family_key": "study",
        "flex": true,
        "location": "Library",
        "metadata": {"source": "caldav"},
        "depends_on": [
            {"task_id": "evt-0"},
            {"task_id": "evt-2", "type": "SS", "lag_min": -15},
            {"task_id": "evt-3", "type": "finish-to-finish"}
        ]
    }"#;

    let task: Task = serde_json::from_str(json).unwrap();
    assert_eq!(task.kind, TaskType::Flexible);
    assert_eq!(task.priority, 5);
    assert_eq!(task.travel_time_min, 0);
    assert!(!task.pomodoro_opt_in);
    assert_eq!(task.depends_on[0].kind, DependencyType::FinishToStart);
    assert_eq!(task.depends_on[0].lag_min, 0);
    assert_eq!(task.depends_on[1].kind, DependencyType::StartToStart);
    assert_eq!(task.depends_on[1].lag_min, -15);
    assert_eq!(task.depends_on[2].kind, DependencyType::FinishToFinish);
    assert!(task.validate().is_ok());
}

#[test]
fn test_fixed_task_from_time_window() {
    let json = r#"{
        "id": "lecture",
        "title": "Lecture",
        "type": "fixed",
        "duration_min": 90,
        "time_windows": [{"start": "2025-03-10T10:00:00Z", "end": "2025-03-10T12:00:00Z"}]
    }"#;
    let task: Task = serde_json::from_str(json).unwrap();
    let interval = task.fixed_interval().unwrap();
    assert_eq!(interval.start, Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap());
    assert_eq!(interval.duration_minutes(), 90);
}

#[test]
fn test_family_defaults() {
    let family: Family = serde_json::from_str(r#"{"key": "health", "name": "Health"}"#).unwrap();
    assert_eq!(family.weight, 1.0);
    assert_eq!(family.weekly_target_minutes, None);
}

#[test]
fn test_snapshot_file_shape() {
    let json = r#"{
        "tasks": {
            "a": {"id": "a", "title": "A", "type": "flexible", "duration_min": 30}
        },
        "families": {},
        "pomodoro": {"enabled": true}
    }"#;
    let snapshot: Snapshot = serde_json::from_str(json).unwrap();
    assert_eq!(snapshot.revision, 0);
    assert!(snapshot.pomodoro.enabled);
    assert_eq!(snapshot.pomodoro.pomodoro_len_min, 25);
    assert_eq!(snapshot.flexible_tasks().count(), 1);
}

#[test]
fn test_proposal_response_shape() {
    let response: ProposalResponse = serde_json::from_str(
        r#"{"proposals": [{
            "event_id": "a",
            "suggested_start": "2025-03-10T09:00:00Z",
            "suggested_end": "2025-03-10T10:00:00Z",
            "score": 1.5,
            "reasoning": "best of 1 candidate window"
        }]}"#,
    )
    .unwrap();
    assert_eq!(response.proposals.len(), 1);
    assert!(response.unplaceable.is_empty());

    let value = serde_json::to_value(&response).unwrap();
    let keys: Vec<&str> = value["proposals"][0]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    for key in ["event_id", "suggested_start", "suggested_end", "score", "reasoning"] {
        assert!(keys.contains(&key), "missing {key}");
    }
}

#[test]
fn test_plan_solution_shape() {
    let solution: PlanSolution = serde_json::from_str(
        r#"{
            "horizon_start": "2025-03-10T08:00:00Z",
            "horizon_end": "2025-03-11T08:00:00Z",
            "scheduled": [{
                "event_id": "a", "chunk_id": "a-1",
                "start": "2025-03-10T08:00:00Z", "end": "2025-03-10T08:25:00Z"
            }],
            "objective_value": null,
            "solver": "greedy"
        }"#,
    )
    .unwrap();
    assert!(!solution.scheduled[0].is_break);
    assert_eq!(solution.objective_value, None);
}
