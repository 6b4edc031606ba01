//! Contact-plan parsing and query properties.

use std::io::Write;

use dtnsim::{ContactPlan, ParseError, CONTACT_OPEN};

const PLAN: &str = "\
# ground station passes
contact 0 10 0 1 1000 0.0 0.5
contact 5 15 1 2
contact 20 -1 0 2 250
contact 30 40 0 1
";

fn plan() -> ContactPlan {
    ContactPlan::from_str(PLAN).unwrap()
}

#[test]
fn contacts_are_sorted_by_start() {
    let p = plan();
    let starts: Vec<f64> = p.contacts().iter().map(|c| c.start).collect();
    assert!(starts.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn open_ended_contact_never_closes() {
    let p = plan();
    let c = p.active_contact(0, 2, 20.0).unwrap();
    assert!(c.is_open());
    assert_eq!(c.end, CONTACT_OPEN);
    assert!(p.active_contact(0, 2, 1.0e9).is_some());
}

#[test]
fn next_boundary_is_strictly_increasing() {
    let p = plan();
    let mut t = 0.0;
    let mut seen = Vec::new();
    while let Some(next) = p.next_boundary(t) {
        assert!(next > t, "boundary {next} not after {t}");
        seen.push(next);
        t = next;
    }
    // every finite start and end appears exactly once
    assert_eq!(seen, vec![5.0, 10.0, 15.0, 20.0, 30.0, 40.0]);
}

#[test]
fn active_pairs_change_only_at_boundaries() {
    let p = plan();
    let mut boundaries = vec![0.0];
    let mut t = 0.0;
    while let Some(next) = p.next_boundary(t) {
        boundaries.push(next);
        t = next;
    }

    // sample strictly inside each interval: the active set must match the
    // one at a second sample point in the same interval
    for w in boundaries.windows(2) {
        let a = w[0] + (w[1] - w[0]) * 0.25;
        let b = w[0] + (w[1] - w[0]) * 0.75;
        assert_eq!(p.active_pairs_at(a), p.active_pairs_at(b));
    }
}

#[test]
fn window_end_is_exclusive() {
    let p = plan();
    assert!(p.active_contact(0, 1, 9.999).is_some());
    assert!(p.active_contact(0, 1, 10.0).is_none());
    // the next window for the same pair opens at its start instant
    assert!(p.active_contact(0, 1, 30.0).is_some());
}

#[test]
fn pair_lookup_ignores_node_order() {
    let p = plan();
    assert_eq!(
        p.active_contact(1, 0, 5.0).map(|c| c.start),
        p.active_contact(0, 1, 5.0).map(|c| c.start)
    );
}

#[test]
fn defaults_fill_missing_columns() {
    let p = ContactPlan::from_str("contact 0 10 0 1\n").unwrap();
    let c = &p.contacts()[0];
    assert_eq!(c.bandwidth, 0);
    assert_eq!(c.loss, 0.0);
    assert_eq!(c.delay, 0.0);
    assert_eq!(c.jitter, 0.0);
}

#[test]
fn overlapping_windows_for_a_pair_are_rejected() {
    let src = "contact 0 10 0 1\ncontact 5 15 0 1\n";
    match ContactPlan::from_str(src) {
        Err(ParseError::Overlap { a, b, .. }) => assert_eq!((a, b), (0, 1)),
        other => panic!("expected overlap error, got {other:?}"),
    }
}

#[test]
fn malformed_line_reports_line_number() {
    let src = "contact 0 10 0 1\ncontact ten 20 0 1\n";
    match ContactPlan::from_str(src) {
        Err(ParseError::Malformed { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected malformed error, got {other:?}"),
    }
}

#[test]
fn loading_same_file_twice_is_idempotent() {
    let path = std::env::temp_dir().join("dtnsim_plan_test.txt");
    {
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(PLAN.as_bytes()).unwrap();
    }
    let a = ContactPlan::from_file(&path).unwrap();
    let b = ContactPlan::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(a.contacts().len(), b.contacts().len());
    let mut t = 0.0;
    loop {
        match (a.next_boundary(t), b.next_boundary(t)) {
            (Some(x), Some(y)) => {
                assert_eq!(x, y);
                t = x;
            }
            (None, None) => break,
            other => panic!("boundary streams diverge: {other:?}"),
        }
    }
}

#[test]
fn transfer_time_accounts_for_bandwidth_and_delay() {
    let p = ContactPlan::from_str("contact 0 100 0 1 1000 0.0 2.0\n").unwrap();
    let c = &p.contacts()[0];
    // 500 bytes over 1000 B/s plus 2 s of delay
    assert_eq!(c.transfer_time(500), 2.5);

    // zero bandwidth means instantaneous transfer, delay only
    let p = ContactPlan::from_str("contact 0 100 0 1 0 0.0 2.0\n").unwrap();
    assert_eq!(p.contacts()[0].transfer_time(500), 2.0);
}
