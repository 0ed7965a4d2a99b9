//! Attempt-driven backoff. `30 minutes * 2 * attempts`, matching the
//! reference implementation's shipped schedule over the alternative
//! `1 hour * attempts` schedule also found in its history (see DESIGN.md).

use chrono::Duration;

#[must_use]
pub fn backoff_for_attempt(attempts: i32) -> Duration {
    if attempts <= 0 {
        return Duration::zero();
    }
    Duration::minutes(30) * 2 * attempts
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_attempts_means_no_delay() {
        assert_eq!(backoff_for_attempt(0), Duration::zero());
    }

    #[test]
    fn backoff_grows_linearly_in_attempts() {
        assert_eq!(backoff_for_attempt(1), Duration::minutes(60));
        assert_eq!(backoff_for_attempt(2), Duration::minutes(120));
        assert_eq!(backoff_for_attempt(5), Duration::minutes(300));
    }

    proptest! {
        #[test]
        fn backoff_is_monotonically_nondecreasing(a in 0i32..1000, b in 0i32..1000) {
            if a <= b {
                prop_assert!(backoff_for_attempt(a) <= backoff_for_attempt(b));
            }
        }
    }
}
