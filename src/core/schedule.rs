use crate::core::models::PollOutcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_POLL_CEILING: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RearmPolicy {
    /// Keep one cycle per ceiling, measured from the start of each cycle.
    #[default]
    FixedInterval,
    /// Re-arm right away after any response; wait only after transport failures.
    ImmediateRearm,
}

/// Decides how long the loop sleeps before the next cycle.
#[derive(Debug, Clone, Copy)]
pub struct RearmSchedule {
    policy: RearmPolicy,
    ceiling: Duration,
}

impl RearmSchedule {
    pub fn new(policy: RearmPolicy, ceiling: Duration) -> Self {
        Self { policy, ceiling }
    }

    pub fn policy(&self) -> RearmPolicy {
        self.policy
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn next_delay(&self, outcome: &PollOutcome, elapsed: Duration) -> Duration {
        if outcome.is_transport_failure() {
            return self.ceiling;
        }

        match self.policy {
            RearmPolicy::FixedInterval => self.ceiling.saturating_sub(elapsed).min(self.ceiling),
            RearmPolicy::ImmediateRearm => Duration::ZERO,
        }
    }
}

impl Default for RearmSchedule {
    fn default() -> Self {
        Self::new(RearmPolicy::default(), DEFAULT_POLL_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> PollOutcome {
        PollOutcome::TransportFailure {
            message: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_fixed_interval_subtracts_elapsed() {
        let schedule = RearmSchedule::default();

        assert_eq!(
            schedule.next_delay(&PollOutcome::NotModified, Duration::from_millis(250)),
            Duration::from_millis(750)
        );
        assert_eq!(
            schedule.next_delay(&PollOutcome::Updated { bytes: 3 }, Duration::ZERO),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_fixed_interval_clamps_to_zero() {
        let schedule = RearmSchedule::default();

        assert_eq!(
            schedule.next_delay(&PollOutcome::NotModified, Duration::from_millis(1000)),
            Duration::ZERO
        );
        assert_eq!(
            schedule.next_delay(&PollOutcome::NotModified, Duration::from_secs(31)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_soft_error_follows_policy() {
        let schedule = RearmSchedule::default();
        let outcome = PollOutcome::SoftError {
            status: 500,
            reason: None,
        };

        assert_eq!(
            schedule.next_delay(&outcome, Duration::from_millis(100)),
            Duration::from_millis(900)
        );
    }

    #[test]
    fn test_unapplied_update_follows_policy() {
        let schedule = RearmSchedule::default();
        let outcome = PollOutcome::NotApplied {
            bytes: 9,
            reason: "write failed".to_string(),
        };

        assert_eq!(
            schedule.next_delay(&outcome, Duration::from_millis(300)),
            Duration::from_millis(700)
        );
    }

    #[test]
    fn test_transport_failure_waits_full_ceiling() {
        for policy in [RearmPolicy::FixedInterval, RearmPolicy::ImmediateRearm] {
            let schedule = RearmSchedule::new(policy, Duration::from_millis(1000));
            assert_eq!(
                schedule.next_delay(&failure(), Duration::from_millis(400)),
                Duration::from_millis(1000)
            );
        }
    }

    #[test]
    fn test_immediate_rearm() {
        let schedule = RearmSchedule::new(RearmPolicy::ImmediateRearm, DEFAULT_POLL_CEILING);

        assert_eq!(
            schedule.next_delay(&PollOutcome::Updated { bytes: 1 }, Duration::ZERO),
            Duration::ZERO
        );
        assert_eq!(
            schedule.next_delay(&PollOutcome::NotModified, Duration::from_millis(10)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_policy_names() {
        let policy: RearmPolicy = toml::Value::String("immediate-rearm".into())
            .try_into()
            .unwrap();
        assert_eq!(policy, RearmPolicy::ImmediateRearm);
        assert_eq!(RearmPolicy::default(), RearmPolicy::FixedInterval);
    }
}
