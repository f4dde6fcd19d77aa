//! Property tests for pomodoro segmentation.

use proptest::prelude::*;
use secretary_core::pomodoro::{segment, segment_task, work_minutes, MIN_WORK_SEGMENT_MIN};
use secretary_core::{PomodoroSettings, SegmentKind, Task};

fn settings() -> impl Strategy<Value = PomodoroSettings> {
    (5u32..=60, 0u32..=15, 0u32..=40, 1u32..=6).prop_map(|(len, short, long, every)| {
        PomodoroSettings {
            enabled: true,
            pomodoro_len_min: len,
            short_break_min: short,
            long_break_min: long,
            long_break_every: every,
        }
    })
}

#[test]
fn test_ninety_five_minutes_classic_cycle() {
    let segments = segment(95, &PomodoroSettings::classic());
    assert_eq!(work_minutes(&segments), 95);
    assert!(segments.iter().all(|s| s.kind != SegmentKind::LongBreak));
    assert_eq!(
        segments.iter().filter(|s| s.kind == SegmentKind::Work).count(),
        4
    );
}

#[test]
fn test_opt_out_task_is_one_segment() {
    let task = Task::flexible("t", "T", 95);
    let segments = segment_task(&task, &PomodoroSettings::classic());
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].length_min, 95);
}

proptest! {
    #[test]
    fn work_sums_to_duration(duration in 1u32..=600, settings in settings()) {
        let segments = segment(duration, &settings);
        prop_assert_eq!(work_minutes(&segments), i64::from(duration));
    }

    #[test]
    fn no_segment_is_empty(duration in 1u32..=600, settings in settings()) {
        for s in segment(duration, &settings) {
            prop_assert!(s.length_min > 0);
        }
    }

    #[test]
    fn breaks_only_between_work(duration in 1u32..=600, settings in settings()) {
        let segments = segment(duration, &settings);
        prop_assert_eq!(segments.first().map(|s| s.kind), Some(SegmentKind::Work));
        prop_assert_eq!(segments.last().map(|s| s.kind), Some(SegmentKind::Work));
        for pair in segments.windows(2) {
            prop_assert!(!(pair[0].kind.is_break() && pair[1].kind.is_break()));
        }
    }

    #[test]
    fn work_segments_respect_length_bounds(duration in 1u32..=600, settings in settings()) {
        let work: Vec<u32> = segment(duration, &settings)
            .into_iter()
            .filter(|s| s.kind == SegmentKind::Work)
            .map(|s| s.length_min)
            .collect();
        if work.len() > 1 {
            for len in &work {
                prop_assert!(*len >= MIN_WORK_SEGMENT_MIN);
                prop_assert!(*len < settings.pomodoro_len_min + MIN_WORK_SEGMENT_MIN);
            }
        }
    }

    #[test]
    fn long_break_follows_every_nth_pomodoro(duration in 1u32..=600, settings in settings()) {
        let segments = segment(duration, &settings);
        let mut completed = 0;
        for s in &segments {
            match s.kind {
                SegmentKind::Work => completed += 1,
                SegmentKind::LongBreak => {
                    prop_assert_eq!(completed % settings.long_break_every, 0);
                }
                SegmentKind::ShortBreak => {
                    prop_assert_ne!(completed % settings.long_break_every, 0);
                }
            }
        }
    }
}
