use super::*;

fn accept(w: &mut ReplayWindow, index: u64) -> ReplayOutcome {
    let outcome = w.check(index);
    if outcome == ReplayOutcome::Fresh {
        w.accept(index);
    }
    outcome
}

#[test]
fn test_window_accepts_and_rejects() {
    let mut w = ReplayWindow::new();

    for index in [100u64, 101, 103, 102] {
        assert_eq!(accept(&mut w, index), ReplayOutcome::Fresh, "index {index}");
    }

    assert_eq!(w.check(101), ReplayOutcome::Duplicate);
    assert_eq!(w.check(30), ReplayOutcome::TooOld);
    assert_eq!(w.latest(), 103);
}

#[test]
fn test_first_packet_seeds_window() {
    // First index is accepted no matter where it lands.
    let mut w = ReplayWindow::new();
    assert_eq!(accept(&mut w, 5000), ReplayOutcome::Fresh);
    assert_eq!(w.check(5000), ReplayOutcome::Duplicate);

    let mut w = ReplayWindow::new();
    assert_eq!(accept(&mut w, 0), ReplayOutcome::Fresh);
    assert_eq!(w.check(0), ReplayOutcome::Duplicate);
}

#[test]
fn test_exact_window_edge() {
    let mut w = ReplayWindow::new();
    accept(&mut w, 1000);

    // 63 back is the oldest in-window slot; 64 back is out.
    assert_eq!(w.check(1000 - 63), ReplayOutcome::Fresh);
    assert_eq!(w.check(1000 - 64), ReplayOutcome::TooOld);
}

#[test]
fn test_large_jump_clears_mask() {
    let mut w = ReplayWindow::new();
    accept(&mut w, 10);
    accept(&mut w, 500);

    // Everything below the new window is too old now.
    assert_eq!(w.check(10), ReplayOutcome::TooOld);
    assert_eq!(w.check(499), ReplayOutcome::Fresh);
}

#[test]
fn test_out_of_order_within_window() {
    let mut w = ReplayWindow::new();
    accept(&mut w, 70);
    for index in (40..70).rev() {
        assert_eq!(accept(&mut w, index), ReplayOutcome::Fresh, "index {index}");
        assert_eq!(w.check(index), ReplayOutcome::Duplicate);
    }
}
