//! Exercises the bucketed-IQR outlier filter through the public recording
//! and reporting surface.
//!
//! The cleaner itself (`clean.rs`) is a private module with its own unit
//! tests that check the exact bucketing/fence arithmetic against
//! hand-built sample sets. From
//! outside the crate there is no way to inject a synthetic cycle count
//! directly — `Start`/`Stop` always measure a real elapsed duration — so
//! this test instead produces a genuine outlier (one artificially slow
//! iteration among many fast ones) and checks that the rendered report's
//! BYPASS column reflects it.

use latte::prelude::*;

#[test]
fn one_slow_iteration_among_many_fast_ones_is_reported_as_bypass() {
    const SITE: &str = "cleaner::one_slow_iteration_among_many_fast_ones";
    let id = id!(SITE);

    // Enough fast iterations to form several full 1000-sample buckets
    // before the cleaner's bucketed-IQR filter runs.
    for _ in 0..3_000 {
        Fast::start(id);
        Fast::stop(id);
    }

    // One deliberately slow region: a thread sleep dwarfs every fast
    // Start/Stop pair above by six orders of magnitude, so its bucket
    // maximum blows through the upper fence computed from the others.
    Fast::start(id);
    std::thread::sleep(std::time::Duration::from_millis(5));
    Fast::stop(id);

    for _ in 0..3_000 {
        Fast::start(id);
        Fast::stop(id);
    }

    let mut out = Vec::new();
    DumpToStream(&mut out, Unit::Cycles, DataMode::Raw).unwrap();
    let text = String::from_utf8(out).unwrap();

    let row = text
        .lines()
        .find(|line| line.contains(SITE))
        .expect("the site should appear in the report");
    let bypass: usize = row
        .split_whitespace()
        .last()
        .expect("row should have a trailing bypass column")
        .parse()
        .expect("bypass column should be numeric");
    assert!(
        bypass >= 1,
        "expected the slow iteration to be filtered as an outlier, got row: {row}"
    );
}

#[test]
fn a_uniform_site_with_no_outliers_has_zero_bypass() {
    const SITE: &str = "cleaner::uniform_site_has_zero_bypass";
    let id = id!(SITE);
    for _ in 0..50 {
        Fast::start(id);
        Fast::stop(id);
    }

    let mut out = Vec::new();
    DumpToStream(&mut out, Unit::Cycles, DataMode::Raw).unwrap();
    let text = String::from_utf8(out).unwrap();

    let row = text
        .lines()
        .find(|line| line.contains(SITE))
        .expect("the site should appear in the report");
    let bypass: usize = row
        .split_whitespace()
        .last()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(bypass, 0);
}
