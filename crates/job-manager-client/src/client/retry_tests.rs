use std::time::Duration;

use super::*;

#[test]
fn first_attempt_has_no_delay() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.calculate_delay(0), Duration::from_secs(0));
}

#[test]
fn delay_grows_exponentially_without_jitter() {
    let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(10))
        .without_jitter();
    assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
    assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
    assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
}

#[test]
fn delay_is_capped_at_max_delay() {
    let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_secs(1))
        .without_jitter();
    assert_eq!(policy.calculate_delay(10), Duration::from_secs(1));
}

#[test]
fn jittered_delay_stays_within_twenty_five_percent() {
    let policy = RetryPolicy::new(5, Duration::from_millis(1000), Duration::from_secs(30));
    for _ in 0..50 {
        let delay = policy.calculate_delay(1);
        assert!(delay >= Duration::from_millis(750));
        assert!(delay <= Duration::from_millis(1250));
    }
}

#[test]
fn should_retry_respects_max_retries() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1));
    assert!(policy.should_retry(0));
    assert!(policy.should_retry(2));
    assert!(!policy.should_retry(3));
}

#[test]
fn transient_status_classification() {
    assert!(is_transient_status(429));
    assert!(is_transient_status(500));
    assert!(is_transient_status(503));
    assert!(!is_transient_status(400));
    assert!(!is_transient_status(404));
    assert!(!is_transient_status(200));
}
