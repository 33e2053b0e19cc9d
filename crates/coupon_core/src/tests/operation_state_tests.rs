use super::*;

#[test]
fn begin_is_idempotent_and_end_clears() {
    let tracker = OperationStateTracker::new();
    tracker.begin("SAVE20");
    tracker.begin("SAVE20");
    assert!(tracker.is_busy("SAVE20"));
    assert!(tracker.is_any_busy());

    tracker.end("SAVE20");
    assert!(!tracker.is_busy("SAVE20"));
    assert!(!tracker.is_any_busy());
    assert_eq!(tracker.snapshot().get("SAVE20"), Some(&false));
}

#[test]
fn ending_unknown_key_is_harmless() {
    let tracker = OperationStateTracker::new();
    tracker.end("never-started");
    assert!(tracker.snapshot().is_empty());
}

#[test]
fn any_busy_spans_all_keys() {
    let tracker = OperationStateTracker::new();
    tracker.begin(&remove_key("FLAT20"));
    assert!(tracker.is_any_busy());
    assert!(!tracker.is_busy("FLAT20"));
    assert!(tracker.is_busy("remove:FLAT20"));
}

#[test]
fn guard_ends_key_on_drop() {
    let tracker = OperationStateTracker::new();
    {
        let guard = tracker.guard("FLAT300");
        assert_eq!(guard.key(), "FLAT300");
        assert!(tracker.is_busy("FLAT300"));
    }
    assert!(!tracker.is_any_busy());
}

#[test]
fn guard_ends_key_when_operation_panics() {
    let tracker = OperationStateTracker::new();
    let inner = tracker.clone();
    let result = std::panic::catch_unwind(move || {
        let _guard = inner.guard("BUY1199");
        panic!("operation blew up");
    });
    assert!(result.is_err());
    assert!(!tracker.is_any_busy());
}

#[test]
fn exclusive_begin_refuses_while_anything_is_busy() {
    let tracker = OperationStateTracker::new();
    let first = tracker.try_begin_exclusive("FLAT400").expect("first begins");
    assert!(tracker.try_begin_exclusive("FLAT20").is_none());
    assert!(tracker.try_begin_exclusive("FLAT400").is_none());
    assert!(!tracker.is_busy("FLAT20"));

    drop(first);
    assert!(tracker.try_begin_exclusive("FLAT20").is_some());
}
