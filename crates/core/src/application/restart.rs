// Restart policy decisions
use crate::domain::RestartPolicy;
use std::time::Duration;

/// Restart decision result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Run the startup cascade again after `delay`
    Restart { attempt: u32, delay: Duration },
    /// Attempt budget used up; supervisor must go to Failed
    Exhausted { attempts: u32 },
    /// Auto-restart switched off
    Disabled,
}

impl RestartPolicy {
    /// Decide what to do after `attempts_made` restart attempts.
    ///
    /// Backoff is linear in the attempt number and capped:
    /// delay = min(backoff_secs * attempt, max_backoff_secs)
    ///
    /// # Example
    /// ```text
    /// match policy.decide(status.restart_attempts) {
    ///     RestartDecision::Restart { attempt, delay } => sleep(delay).await,
    ///     RestartDecision::Exhausted { .. } | RestartDecision::Disabled => fail(),
    /// }
    /// ```
    pub fn decide(&self, attempts_made: u32) -> RestartDecision {
        if !self.enabled {
            return RestartDecision::Disabled;
        }
        if attempts_made >= self.max_attempts {
            return RestartDecision::Exhausted {
                attempts: attempts_made,
            };
        }
        let attempt = attempts_made + 1;
        RestartDecision::Restart {
            attempt,
            delay: self.backoff_for(attempt),
        }
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let secs = self
            .backoff_secs
            .saturating_mul(u64::from(attempt))
            .min(self.max_backoff_secs);
        Duration::from_secs(secs)
    }

    /// Whether a Ready period of `healthy_for` earns a fresh attempt budget
    pub fn should_reset(&self, healthy_for: Duration) -> bool {
        healthy_for >= Duration::from_secs(self.reset_after_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RestartPolicy {
        RestartPolicy {
            enabled: true,
            max_attempts: 3,
            backoff_secs: 5,
            max_backoff_secs: 12,
            reset_after_secs: 300,
        }
    }

    #[test]
    fn test_linear_backoff_capped() {
        let p = policy();
        assert_eq!(
            p.decide(0),
            RestartDecision::Restart {
                attempt: 1,
                delay: Duration::from_secs(5)
            }
        );
        assert_eq!(
            p.decide(1),
            RestartDecision::Restart {
                attempt: 2,
                delay: Duration::from_secs(10)
            }
        );
        // 15s capped at 12s
        assert_eq!(
            p.decide(2),
            RestartDecision::Restart {
                attempt: 3,
                delay: Duration::from_secs(12)
            }
        );
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        assert_eq!(policy().decide(3), RestartDecision::Exhausted { attempts: 3 });
        assert_eq!(policy().decide(7), RestartDecision::Exhausted { attempts: 7 });
    }

    #[test]
    fn test_disabled_policy() {
        let p = RestartPolicy {
            enabled: false,
            ..policy()
        };
        assert_eq!(p.decide(0), RestartDecision::Disabled);
    }

    #[test]
    fn test_reset_threshold() {
        let p = policy();
        assert!(!p.should_reset(Duration::from_secs(299)));
        assert!(p.should_reset(Duration::from_secs(300)));
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let p = RestartPolicy {
            backoff_secs: u64::MAX,
            max_backoff_secs: 60,
            ..policy()
        };
        assert_eq!(p.backoff_for(u32::MAX), Duration::from_secs(60));
    }
}
