//! End-to-end tests against the public recording API: `Start`/`Stop` on all
//! three timestamp sources, `Pulse`, and `Snapshot`.

use latte::prelude::*;

const DEEP_A: &str = "recording::deep_nesting::a";
const DEEP_B: &str = "recording::deep_nesting::b";

fn recurse(depth: usize) {
    Fast::start(id!(DEEP_A));
    if depth > 0 {
        Fast::start(id!(DEEP_B));
        recurse(depth - 1);
        Fast::stop(id!(DEEP_B));
    }
    Fast::stop(id!(DEEP_A));
}

#[test]
fn deep_nesting_attributes_ten_a_samples_and_nine_b_samples() {
    recurse(9);
    assert_eq!(Snapshot(id!(DEEP_A)).len(), 10);
    assert_eq!(Snapshot(id!(DEEP_B)).len(), 9);
}

#[test]
fn ring_overflow_caps_at_capacity_and_wraps_the_head() {
    const SITE: &str = "recording::ring_overflow";
    let id = id!(SITE);
    // RING_CAPACITY defaults to 2^16; 100_000 iterations overflows it.
    for _ in 0..100_000u32 {
        Fast::start(id);
        Fast::stop(id);
    }
    let samples = Snapshot(id);
    assert_eq!(samples.len(), latte::config::RING_CAPACITY);
}

#[test]
fn pulse_loop_of_1001_calls_records_1000_nonzero_deltas() {
    const SITE: &str = "recording::pulse_loop";
    let id = id!(SITE);
    let before = Snapshot(id).len();
    for _ in 0..1001 {
        std::thread::sleep(std::time::Duration::from_micros(10));
        Pulse(id);
    }
    let after = Snapshot(id);
    assert_eq!(after.len(), before + 1000);
    assert!(after.iter().all(|&v| v >= 1));
}

#[test]
fn stop_on_empty_stack_is_a_no_op() {
    const SITE: &str = "recording::stop_before_start";
    let id = id!(SITE);
    let before = Snapshot(id).len();
    Fast::stop(id);
    assert_eq!(Snapshot(id).len(), before);
}

#[test]
fn mixed_start_stop_modes_still_record_one_sample_each() {
    const SITE: &str = "recording::mixed_modes";
    let id = id!(SITE);
    let before = Snapshot(id).len();

    Fast::start(id);
    Hard::stop(id);
    Mid::start(id);
    Hard::stop(id);

    assert_eq!(Snapshot(id).len(), before + 2);
}

#[test]
fn disjoint_threads_do_not_interfere_with_each_others_samples() {
    const THREAD_A_SITE: &str = "recording::disjoint_threads::a";
    const THREAD_B_SITE: &str = "recording::disjoint_threads::b";

    let handle_a = std::thread::spawn(|| {
        let id = id!(THREAD_A_SITE);
        for _ in 0..500 {
            Fast::start(id);
            Fast::stop(id);
        }
    });
    let handle_b = std::thread::spawn(|| {
        let id = id!(THREAD_B_SITE);
        for _ in 0..300 {
            Fast::start(id);
            Fast::stop(id);
        }
    });
    handle_a.join().unwrap();
    handle_b.join().unwrap();

    assert_eq!(Snapshot(id!(THREAD_A_SITE)).len(), 500);
    assert_eq!(Snapshot(id!(THREAD_B_SITE)).len(), 300);
}

#[test]
fn calibrate_is_idempotent() {
    Calibrate();
    Calibrate();
    Calibrate();
}
