//! Integration tests for deferred program trees.

mod support;

use schedule_engine::algorithms::Placement;
use schedule_engine::models::{Bindings, Parameter};
use schedule_engine::{AlignmentKind, ErrorKind, Filter, Schedule, ScheduleBlock};
use support::{d, delay, play, u};

// =========================================================
// Conversion
// =========================================================

#[test]
fn test_unassigned_durations_block_conversion_until_bound() {
    let first = Parameter::new("first");
    let second = Parameter::new("second");
    let block: ScheduleBlock = ScheduleBlock::with_name("pair")
        .with_alignment(AlignmentKind::Sequential)
        .append(schedule_engine::models::Instruction::play(&first, d(0)))
        .append(schedule_engine::models::Instruction::play(&second, d(0)));

    assert!(!block.is_schedulable());
    let err = block.to_schedule().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Scheduling);
    assert!(err.to_string().contains("first"));

    let bound = block.assign_parameters(&Bindings::new().bind(&first, 120).bind(&second, 80));
    assert!(bound.is_schedulable());
    let schedule = bound.to_schedule().unwrap();
    assert_eq!(schedule.duration(), 200);
    assert_eq!(bound.duration().unwrap(), 200);
}

#[test]
fn test_left_aligned_block_matches_eager_equivalent() {
    let block: ScheduleBlock = ScheduleBlock::new()
        .append(play(40, d(0)))
        .append(play(40, d(1)))
        .append(schedule_engine::models::Instruction::new(
            schedule_engine::models::InstructionKind::Play,
            200,
            [d(0), u(0)],
        ))
        .append(play(40, d(1)));

    let expected: Schedule = Schedule::from_children([
        (0, play(40, d(0))),
        (0, play(40, d(1))),
        (40, play(200, d(0))),
        (40, play(40, d(1))),
    ])
    .unwrap();

    let converted = block.to_schedule().unwrap();
    assert_eq!(converted.duration(), 240);
    assert_eq!(converted.ch_start_time(&[u(0)]), 40);
    assert_eq!(converted.ch_stop_time(&[d(1)]), 80);
    assert_eq!(converted.len(), expected.len());
}

#[test]
fn test_right_aligned_block_ends_together() {
    let block: ScheduleBlock = ScheduleBlock::new()
        .with_alignment(AlignmentKind::Right)
        .append(play(100, d(0)))
        .append(play(30, d(1)))
        .append(play(20, d(1)));
    let schedule = block.to_schedule().unwrap();
    assert_eq!(schedule.duration(), 100);
    assert_eq!(schedule.ch_start_time(&[d(1)]), 50);
    assert_eq!(schedule.ch_stop_time(&[d(1)]), 100);
}

#[test]
fn test_equispaced_and_func_alignment() {
    let equispaced: ScheduleBlock = ScheduleBlock::new()
        .with_alignment(AlignmentKind::equispaced(100))
        .append(play(10, d(0)))
        .append(play(10, d(0)))
        .append(play(10, d(0)));
    let offsets: Vec<i64> = equispaced
        .to_schedule()
        .unwrap()
        .children()
        .iter()
        .map(|(t, _)| *t)
        .collect();
    assert_eq!(offsets, vec![0, 45, 90]);

    let func: ScheduleBlock = ScheduleBlock::new()
        .with_alignment(AlignmentKind::func(
            200,
            Placement::new("quarters", |j| j as f64 / 4.0),
        ))
        .append(play(20, d(0)))
        .append(play(20, d(0)));
    let schedule = func.to_schedule().unwrap();
    let offsets: Vec<i64> = schedule.children().iter().map(|(t, _)| *t).collect();
    assert_eq!(offsets, vec![40, 90]);
}

#[test]
fn test_func_alignment_outside_context_fails() {
    let block: ScheduleBlock = ScheduleBlock::new()
        .with_alignment(AlignmentKind::func(100, Placement::new("late", |_| 1.2)))
        .append(play(10, d(0)));
    assert_eq!(block.to_schedule().unwrap_err().kind(), ErrorKind::Timing);
}

#[test]
fn test_nested_blocks_convert_recursively() {
    let inner: ScheduleBlock = ScheduleBlock::with_name("inner")
        .with_alignment(AlignmentKind::Sequential)
        .append(play(10, d(0)))
        .append(delay(10, d(0)));
    let outer: ScheduleBlock = ScheduleBlock::with_name("outer")
        .with_alignment(AlignmentKind::Sequential)
        .append(inner.clone())
        .append(inner);

    let schedule = outer.to_schedule().unwrap();
    assert_eq!(schedule.duration(), 40);
    assert_eq!(schedule.len(), 4);
    assert_eq!(outer.flatten().unwrap().len(), 4);
    assert_eq!(outer.ch_duration(&[d(0)]).unwrap(), 40);
}

// =========================================================
// Unsupported operations and parameters
// =========================================================

#[test]
fn test_filter_and_exclude_fail_on_blocks() {
    let block: ScheduleBlock = ScheduleBlock::new().append(play(10, d(0)));
    let err = block.filter(&Filter::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(err.to_string().contains("to_schedule"));
    assert_eq!(
        block.exclude(&Filter::new()).unwrap_err().kind(),
        ErrorKind::Unsupported
    );
}

#[test]
fn test_alignment_parameter_is_tracked_and_resolved() {
    let width = Parameter::new("width");
    let block: ScheduleBlock = ScheduleBlock::new()
        .with_alignment(AlignmentKind::equispaced(&width))
        .append(play(10, d(0)));
    assert_eq!(block.get_parameters("width"), vec![width.clone()]);

    let err = block.resolve(&Bindings::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unbound);

    let schedule = block.resolve(&Bindings::new().bind(&width, 30)).unwrap();
    assert_eq!(schedule.children()[0].0, 10);
}

// =========================================================
// Equality
// =========================================================

#[test]
fn test_left_blocks_equal_under_independent_reordering() {
    let a: ScheduleBlock = ScheduleBlock::new()
        .append(play(10, d(0)))
        .append(play(20, d(1)))
        .append(play(30, d(0)));
    let b: ScheduleBlock = ScheduleBlock::new()
        .append(play(20, d(1)))
        .append(play(10, d(0)))
        .append(play(30, d(0)));
    let c: ScheduleBlock = ScheduleBlock::new()
        .append(play(30, d(0)))
        .append(play(20, d(1)))
        .append(play(10, d(0)));

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.to_schedule().unwrap(), b.to_schedule().unwrap());
}

#[test]
fn test_block_replace_then_restore() {
    let old = play(10, d(0));
    let new = play(10, d(0)).with_operand("amp", 0.3);
    let inner: ScheduleBlock = ScheduleBlock::new().append(old.clone());
    let block: ScheduleBlock = ScheduleBlock::new().append(old.clone()).append(inner);

    let replaced = block.replace(old.clone(), new.clone());
    assert_ne!(replaced, block);
    assert_eq!(replaced.replace(new, old), block);
}

#[test]
fn test_block_json_round_trip() {
    let inner: ScheduleBlock = ScheduleBlock::with_name("inner")
        .with_alignment(AlignmentKind::Right)
        .append(play(10, d(1)));
    let block: ScheduleBlock = ScheduleBlock::with_name("outer")
        .with_alignment(AlignmentKind::Sequential)
        .append(play(10, d(0)))
        .append(inner);

    let loaded: ScheduleBlock = ScheduleBlock::from_json(&block.to_json().unwrap()).unwrap();
    assert_eq!(loaded, block);
    assert_eq!(loaded.name(), "outer");
    assert_eq!(loaded.to_schedule().unwrap(), block.to_schedule().unwrap());
}
