use std::time::Duration;

/// Bounded exponential backoff for callers that want automatic reconnects.
/// The connection manager itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt after `failed_attempts` consecutive
    /// failures, or `None` once the budget is spent.
    pub fn delay_for(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 {
            return Some(Duration::ZERO);
        }
        if failed_attempts > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(failed_attempts - 1).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped_then_gives_up() {
        let policy = ReconnectPolicy {
            base: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            max_attempts: 5,
        };
        assert_eq!(policy.delay_for(0), Some(Duration::ZERO));
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_secs(3)));
        assert_eq!(policy.delay_for(5), Some(Duration::from_secs(3)));
        assert_eq!(policy.delay_for(6), None);
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let policy = ReconnectPolicy { max_attempts: u32::MAX, ..ReconnectPolicy::default() };
        assert_eq!(policy.delay_for(40), Some(policy.max_delay));
    }
}
