use crate::{
    simple_progress, sort_by_progress, ContractStatus, LifecycleEntity, LifecyclePhase, Progress,
};

fn entity(creation_time: i64, nominal_length: u64) -> LifecycleEntity {
    LifecycleEntity {
        creation_time,
        nominal_length,
        actual_end_time: None,
        is_deleted: false,
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ─────────────────────────────────────────────────────────
// simple_progress
// ─────────────────────────────────────────────────────────

#[test]
fn deleted_entity_is_archived_regardless_of_time() {
    let deleted = LifecycleEntity {
        is_deleted: true,
        ..entity(0, 100)
    };
    for now in [-50, 0, 50, 150, 10_000] {
        assert_eq!(simple_progress(&deleted, now), Progress::Archived);
        assert_eq!(simple_progress(&deleted, now).as_sentinel(), -2.0);
    }
}

#[test]
fn halfway_through_term() {
    assert_eq!(simple_progress(&entity(0, 100), 50), Progress::Running(0.5));
    assert_eq!(simple_progress(&entity(0, 100), 50).as_sentinel(), 0.5);
}

#[test]
fn past_term_is_finished() {
    assert_eq!(simple_progress(&entity(0, 100), 150), Progress::Finished);
    assert_eq!(simple_progress(&entity(0, 100), 150).as_sentinel(), -1.0);
}

#[test]
fn exactly_at_term_end_is_still_running() {
    assert_eq!(simple_progress(&entity(0, 100), 100), Progress::Running(1.0));
}

#[test]
fn future_dated_contract_is_not_clamped() {
    assert_eq!(
        simple_progress(&entity(1_000, 100), 950),
        Progress::Running(-0.5)
    );
}

#[test]
fn zero_length_contract_is_finished() {
    assert_eq!(simple_progress(&entity(10, 0), 10), Progress::Finished);
}

#[test]
fn sort_places_sentinels_first() {
    let deleted = LifecycleEntity {
        is_deleted: true,
        ..entity(0, 100)
    };
    let finished = entity(0, 10);
    let halfway = entity(50, 100);
    let fresh = entity(100, 100);

    let mut list = [fresh, halfway, finished, deleted];
    sort_by_progress(&mut list, 100);

    assert_eq!(list, [deleted, finished, fresh, halfway]);
}

// ─────────────────────────────────────────────────────────
// ContractStatus
// ─────────────────────────────────────────────────────────

#[test]
fn running_contract() {
    let status = ContractStatus::compute(0, 1_000_000, 100, 50);
    assert!(status.is_running);
    assert!(!status.is_closed_early);
    assert_close(status.progress, 0.5);
    assert_close(status.sort_value, 0.5);
    assert!(!status.is_success);
}

#[test]
fn closed_early_contract() {
    let status = ContractStatus::compute(0, 40, 100, 200);
    assert!(!status.is_running);
    assert!(status.is_closed_early);
    assert_close(status.progress, 0.4);
    assert_close(status.sort_value, -0.6);
    assert!(!status.is_success);
}

#[test]
fn completed_contract_is_success() {
    let status = ContractStatus::compute(0, 100, 100, 200);
    assert!(!status.is_running);
    assert!(!status.is_closed_early);
    assert_eq!(status.progress, 1.0);
    assert_eq!(status.sort_value, 1.0);
    assert!(status.is_success);
}

// End time scheduled before the nominal end but still ahead of `now`: both
// flags hold and the closed-early projection wins for progress and sort value.
#[test]
fn running_and_closed_early_overlap() {
    let status = ContractStatus::compute(0, 80, 100, 50);
    assert!(status.is_running);
    assert!(status.is_closed_early);
    assert_close(status.progress, 0.8);
    assert_close(status.sort_value, -0.2);
    assert!(!status.is_success);
}

#[test]
fn sort_value_bands() {
    let closed_early = ContractStatus::compute(0, 90, 100, 200);
    let running = ContractStatus::compute(0, 1_000, 100, 10);
    let done = ContractStatus::compute(0, 100, 100, 200);

    assert!(closed_early.sort_value < 0.0);
    assert!((0.0..1.0).contains(&running.sort_value));
    assert!(closed_early.sort_value < running.sort_value);
    assert!(running.sort_value < done.sort_value);
}

#[test]
fn entity_status_defaults_to_nominal_end() {
    let open = entity(0, 100);
    let status = open.status(50);
    assert!(status.is_running);
    assert!(!status.is_closed_early);
    assert_close(status.progress, 0.5);

    assert!(open.status(150).is_success);
}

#[test]
fn entity_status_uses_actual_end() {
    let closed = LifecycleEntity {
        actual_end_time: Some(25),
        ..entity(0, 100)
    };
    let status = closed.status(60);
    assert!(status.is_closed_early);
    assert_close(status.progress, 0.25);
}

#[test]
fn extreme_timestamps_do_not_overflow() {
    assert_eq!(simple_progress(&entity(i64::MIN, 100), 1), Progress::Finished);
    match simple_progress(&entity(i64::MAX, 100), i64::MIN) {
        Progress::Running(p) => assert!(p.is_finite() && p < 0.0),
        other => panic!("expected running, got {other:?}"),
    }

    let status = ContractStatus::compute(i64::MIN, i64::MAX, 100, 0);
    assert!(status.is_running);
    assert!(!status.is_closed_early);
    assert!(status.progress.is_finite() && status.progress > 1.0);

    let longest = entity(i64::MIN, u64::MAX);
    assert_eq!(longest.expected_end_time(), i64::MAX);
    assert!(longest.status(i64::MAX).is_success);
    assert_eq!(longest.phase(i64::MAX), LifecyclePhase::Finished);
}

// ─────────────────────────────────────────────────────────
// LifecyclePhase
// ─────────────────────────────────────────────────────────

#[test]
fn phases() {
    let open = entity(100, 100);
    assert_eq!(open.phase(50), LifecyclePhase::Future);
    assert_eq!(open.phase(150), LifecyclePhase::Running);
    assert_eq!(open.phase(200), LifecyclePhase::Finished);
    assert_eq!(open.phase(500), LifecyclePhase::Finished);

    let closed = LifecycleEntity {
        actual_end_time: Some(120),
        ..open
    };
    assert_eq!(closed.phase(110), LifecyclePhase::Running);
    assert_eq!(closed.phase(130), LifecyclePhase::ClosedEarly);

    let archived = LifecycleEntity {
        is_deleted: true,
        ..open
    };
    assert_eq!(archived.phase(150), LifecyclePhase::Archived);
}

#[test]
fn entity_deserializes_with_defaults() {
    let parsed: LifecycleEntity =
        serde_json::from_str(r#"{"creation_time": 10, "nominal_length": 3600}"#).unwrap();
    assert_eq!(parsed, entity(10, 3600));
}
