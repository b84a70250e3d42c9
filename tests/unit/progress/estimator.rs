use super::*;
use std::time::UNIX_EPOCH;

fn t(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[test]
fn fewer_than_two_artifacts_is_calculating() {
    assert_eq!(estimate_eta(t(100), 5, &[]), Eta::Calculating);
    assert_eq!(estimate_eta(t(100), 5, &[t(90)]), Eta::Calculating);
}

#[test]
fn nothing_remaining_is_complete() {
    assert_eq!(estimate_eta(t(100), 0, &[]), Eta::Complete);
    assert_eq!(estimate_eta(t(100), 0, &[t(1), t(2), t(3)]), Eta::Complete);
}

#[test]
fn identical_timestamps_never_produce_a_zero_eta() {
    assert_eq!(estimate_eta(t(100), 3, &[t(50), t(50), t(50)]), Eta::Calculating);
}

#[test]
fn trailing_mean_gap_projects_forward() {
    // Unsorted input; gaps are 10s and 20s => mean 15s.
    let eta = estimate_eta(t(1_000), 4, &[t(70), t(100), t(90)]);
    match eta {
        Eta::At {
            remaining,
            completes_at,
        } => {
            assert_eq!(remaining, Duration::from_secs(60));
            assert_eq!(completes_at, t(1_060));
        }
        other => panic!("expected a projected eta, got {other:?}"),
    }
}

#[test]
fn trailing_window_ignores_lifetime_average() {
    // Slow warm-up followed by fast steady state: only the recent gaps should matter.
    let eta = estimate_eta(t(500), 10, &[t(400), t(402), t(404)]);
    let Eta::At { remaining, .. } = eta else {
        panic!("expected a projected eta");
    };
    assert_eq!(remaining, Duration::from_secs(20));
}

#[test]
fn describe_scales_units() {
    let at = |secs: u64| Eta::At {
        remaining: Duration::from_secs(secs),
        completes_at: t(secs),
    };
    assert_eq!(at(42).describe(), "42 seconds");
    assert_eq!(at(210).describe(), "3.5 minutes");
    assert_eq!(at(7_560).describe(), "2.1 hours");
    assert_eq!(Eta::Calculating.describe(), "Calculating...");
    assert_eq!(Eta::Complete.describe(), "Complete");
}

#[test]
fn sample_counts_are_session_relative() {
    let tree = TreeStats {
        artifacts: 30,
        total_bytes: 300,
    };
    let s = ProgressSample::from_tree(40, 10, tree, Eta::Calculating);
    assert_eq!(s.rendered, 20);
    assert_eq!(s.remaining, 20);
    assert!((s.percent - 50.0).abs() < f64::EPSILON);
    assert_eq!(s.tree_artifacts, 30);

    // Files removed below the baseline never underflow.
    let shrunk = ProgressSample::from_tree(
        40,
        10,
        TreeStats {
            artifacts: 4,
            total_bytes: 0,
        },
        Eta::Calculating,
    );
    assert_eq!(shrunk.rendered, 0);
    assert_eq!(shrunk.remaining, 40);

    // Overshoot clamps.
    let over = ProgressSample::from_tree(
        5,
        0,
        TreeStats {
            artifacts: 9,
            total_bytes: 0,
        },
        Eta::Complete,
    );
    assert_eq!(over.remaining, 0);
    assert!((over.percent - 100.0).abs() < f64::EPSILON);
    assert!(over.is_complete());
}

#[test]
fn tracker_reports_calculating_with_a_single_new_artifact() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("old.png"), b"x").unwrap();
    // Filesystem timestamps come from a coarse clock; keep well clear of it.
    std::thread::sleep(Duration::from_millis(100));
    let tracker = ProgressTracker {
        scanner: Scanner::new("png"),
        output_dir: dir.path().to_path_buf(),
        expected: 4,
        baseline: 1,
        started_at: SystemTime::now(),
        eta_window: 10,
    };
    std::thread::sleep(Duration::from_millis(100));
    std::fs::write(dir.path().join("new.png"), b"x").unwrap();

    let s = tracker.sample();
    assert_eq!(s.rendered, 1);
    assert_eq!(s.remaining, 3);
    assert_eq!(s.eta, Eta::Calculating);
}

#[test]
fn tracker_reports_complete_when_expected_is_reached() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..3 {
        std::fs::write(dir.path().join(format!("{i}.png")), b"x").unwrap();
    }
    let tracker = ProgressTracker {
        scanner: Scanner::new("png"),
        output_dir: dir.path().to_path_buf(),
        expected: 3,
        baseline: 0,
        started_at: UNIX_EPOCH,
        eta_window: 10,
    };
    let s = tracker.sample();
    assert_eq!(s.eta, Eta::Complete);
    assert_eq!(s.tree_bytes, 3);
}
