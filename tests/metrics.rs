#![cfg(feature = "metrics")]
//! Tests for `pushframe` metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.
use metrics::{SharedString, Unit};
use metrics_util::{
    CompositeKey,
    debugging::{DebugValue, DebuggingRecorder, Snapshotter},
};
use pushframe::metrics::{self as push_metrics, Direction, DropReason};
use rstest::rstest;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter_with_label(snapshotter: &Snapshotter, name: &str, label: (&str, &str)) -> Option<u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| {
            let matches = key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1);
            match value {
                DebugValue::Counter(c) if matches => Some(c),
                _ => None,
            }
        })
}

type Snapshot = [(CompositeKey, Option<Unit>, Option<SharedString>, DebugValue)];

fn assert_counter_eq(metrics: &Snapshot, name: &str, expected: u64) {
    assert!(
        metrics.iter().any(|(key, _, _, value)| {
            key.key().name() == name && matches!(value, DebugValue::Counter(c) if *c == expected)
        }),
        "expected {name} == {expected}, got {metrics:#?}"
    );
}

#[rstest]
#[case(Direction::Inbound, "inbound")]
#[case(Direction::Outbound, "outbound")]
fn frame_metric_is_labelled_by_direction(#[case] direction: Direction, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || push_metrics::inc_frames(direction));

    assert_eq!(
        counter_with_label(&snapshotter, push_metrics::FRAMES_PROCESSED, ("direction", label)),
        Some(1)
    );
}

#[rstest]
#[case(DropReason::Duplicate, "duplicate")]
#[case(DropReason::Undecryptable, "undecryptable")]
fn dropped_message_metric_is_labelled_by_reason(#[case] reason: DropReason, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || push_metrics::inc_dropped(reason));

    assert_eq!(
        counter_with_label(&snapshotter, push_metrics::MESSAGES_DROPPED, ("reason", label)),
        Some(1)
    );
}

#[test]
fn error_metric_carries_kind() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || push_metrics::inc_errors("connect"));

    assert_eq!(
        counter_with_label(&snapshotter, push_metrics::ERRORS_TOTAL, ("kind", "connect")),
        Some(1)
    );
}

#[rstest]
#[case(1)]
#[case(3)]
fn notification_and_reconnect_counts(#[case] expected: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        (0..expected).for_each(|_| {
            push_metrics::inc_notifications();
            push_metrics::inc_reconnects();
        });
    });

    // Each snapshot drains the recorded counters, so take exactly one.
    let metrics = snapshotter.snapshot().into_vec();
    assert_counter_eq(&metrics, push_metrics::NOTIFICATIONS_DELIVERED, expected);
    assert_counter_eq(&metrics, push_metrics::RECONNECTS_TOTAL, expected);
}

#[test]
fn connection_gauge_tracks_open_transports() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        push_metrics::inc_connections();
        push_metrics::inc_connections();
        push_metrics::dec_connections();
    });

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == push_metrics::CONNECTIONS_ACTIVE
            && matches!(v, DebugValue::Gauge(g) if (g.into_inner() - 1.0).abs() < f64::EPSILON)
    });
    assert!(found, "connection gauge should read 1, got {metrics:#?}");
}
