use super::*;

#[test]
fn ring_overwrites_oldest_when_full() {
    let mut r = RingBuffer::new(3);
    assert_eq!(r.push(1), None);
    assert_eq!(r.push(2), None);
    assert_eq!(r.push(3), None);
    assert_eq!(r.push(4), Some(1));
    assert_eq!(r.len(), 3);
    assert_eq!(r.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    assert_eq!(r.first(), Some(&2));
    assert_eq!(r.last(), Some(&4));
}

#[test]
fn ring_clear_resets_order() {
    let mut r = RingBuffer::new(2);
    r.push("a");
    r.push("b");
    r.push("c");
    r.clear();
    assert!(r.is_empty());
    r.push("d");
    assert_eq!(r.iter().copied().collect::<Vec<_>>(), vec!["d"]);
}

#[test]
fn zero_capacity_is_clamped_to_one() {
    let mut r = RingBuffer::new(0);
    assert_eq!(r.capacity(), 1);
    r.push(7);
    assert_eq!(r.push(8), Some(7));
}

#[test]
fn rate_window_reports_events_per_second() {
    let mut w = RateWindow::new(10);
    assert_eq!(w.per_second(), 0.0);
    for i in 0..5 {
        w.record(f64::from(i) * 100.0);
    }
    assert!((w.per_second() - 10.0).abs() < 1e-9);
}

#[test]
fn rate_window_only_uses_retained_span() {
    let mut w = RateWindow::new(3);
    w.record(0.0);
    w.record(1000.0);
    w.record(1050.0);
    w.record(1100.0);
    // Retains 1000, 1050, 1100: two intervals over 100 ms.
    assert!((w.per_second() - 20.0).abs() < 1e-9);
}
