use chrono::{DateTime, Duration, Utc};

use secure_location_common::LocationSample;

/// True if `sample` is absent or at least `max_age` old at `now`.
pub fn is_stale(sample: Option<&LocationSample>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match sample {
        None => true,
        Some(sample) => sample.age(now) >= max_age,
    }
}

/// Fixed-age freshness check
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
    max_age: Duration,
}

impl StalenessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn is_stale(&self, sample: Option<&LocationSample>) -> bool {
        self.is_stale_at(sample, Utc::now())
    }

    pub fn is_stale_at(&self, sample: Option<&LocationSample>, now: DateTime<Utc>) -> bool {
        is_stale(sample, now, self.max_age)
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_aged(now: DateTime<Utc>, age: Duration) -> LocationSample {
        LocationSample::new("network", 43.629444, 1.363889, now - age)
    }

    #[test]
    fn test_absent_sample_is_stale() {
        assert!(is_stale(None, Utc::now(), Duration::minutes(10)));
        assert!(is_stale(None, Utc::now(), Duration::weeks(52)));
    }

    #[test]
    fn test_age_threshold() {
        let now = Utc::now();
        let max_age = Duration::minutes(10);

        assert!(!is_stale(Some(&sample_aged(now, Duration::minutes(1))), now, max_age));
        assert!(!is_stale(
            Some(&sample_aged(now, max_age - Duration::milliseconds(1))),
            now,
            max_age
        ));
        // Exactly max age counts as stale
        assert!(is_stale(Some(&sample_aged(now, max_age)), now, max_age));
        assert!(is_stale(Some(&sample_aged(now, Duration::minutes(11))), now, max_age));
    }

    #[test]
    fn test_future_sample_is_fresh() {
        let now = Utc::now();
        let sample = sample_aged(now, Duration::minutes(-5));
        assert!(!is_stale(Some(&sample), now, Duration::minutes(10)));
    }

    #[test]
    fn test_policy_uses_configured_age() {
        let now = Utc::now();
        let policy = StalenessPolicy::new(Duration::minutes(2));
        assert_eq!(policy.max_age(), Duration::minutes(2));
        assert!(policy.is_stale_at(Some(&sample_aged(now, Duration::minutes(3))), now));
        assert!(!StalenessPolicy::default().is_stale_at(Some(&sample_aged(now, Duration::minutes(3))), now));
    }
}
