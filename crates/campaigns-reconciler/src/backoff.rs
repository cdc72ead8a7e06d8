use chrono::{DateTime, Duration, Utc};
use rand::Rng;

const BASE_SECONDS: i64 = 2;
const MAX_SECONDS: i64 = 60 * 60;

/// `process_after` for a changeset that has failed `num_failures` times:
/// full-jitter exponential backoff, capped at an hour so a changeset that's
/// been failing for days doesn't wait longer than that between attempts.
pub fn next_retry_at(now: DateTime<Utc>, num_failures: i32) -> DateTime<Utc> {
    let ceiling = BASE_SECONDS.saturating_pow(num_failures.max(0) as u32).min(MAX_SECONDS);
    let jittered = rand::thread_rng().gen_range(0..=ceiling.max(1));
    now + Duration::seconds(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_the_ceiling() {
        let now = Utc::now();
        for failures in 0..40 {
            let at = next_retry_at(now, failures);
            assert!(at <= now + Duration::seconds(MAX_SECONDS));
            assert!(at >= now);
        }
    }

    #[test]
    fn zero_failures_can_retry_almost_immediately() {
        let now = Utc::now();
        let at = next_retry_at(now, 0);
        assert!(at <= now + Duration::seconds(BASE_SECONDS));
    }

    #[test]
    fn negative_failure_counts_are_clamped() {
        let now = Utc::now();
        let at = next_retry_at(now, -1);
        assert!(at <= now + Duration::seconds(BASE_SECONDS));
    }
}
