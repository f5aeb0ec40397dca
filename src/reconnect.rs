use rand::Rng;
use std::time::Duration;

pub const DEFAULT_RELOAD_DELAY: Duration = Duration::from_secs(5);

/// How the page recovers after the feed connection goes away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Reload after a fixed delay, forever.
    Reload { delay: Duration },
    /// Reload after `initial * 2^failures`, capped at `max`. Stops after
    /// `max_retries` consecutive failures when set.
    Backoff {
        initial: Duration,
        max: Duration,
        max_retries: Option<u32>,
        jitter: bool,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Reload {
            delay: DEFAULT_RELOAD_DELAY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Reload once `Duration` has elapsed.
    Scheduled(Duration),
    /// A reload is already armed for an earlier close.
    AlreadyPending,
    /// Retry budget exhausted; the feed stays down.
    GaveUp,
}

/// Turns close notifications into at most one pending reload.
#[derive(Debug)]
pub struct ReconnectSchedule {
    policy: ReconnectPolicy,
    failures: u32,
    pending: bool,
}

impl ReconnectSchedule {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            pending: false,
        }
    }

    /// The connection opened; consecutive failures start over.
    pub fn on_open(&mut self) {
        self.failures = 0;
    }

    pub fn on_close(&mut self) -> CloseOutcome {
        if self.pending {
            return CloseOutcome::AlreadyPending;
        }
        let delay = match &self.policy {
            ReconnectPolicy::Reload { delay } => *delay,
            ReconnectPolicy::Backoff {
                initial,
                max,
                max_retries,
                jitter,
            } => {
                if let Some(limit) = max_retries {
                    if self.failures >= *limit {
                        return CloseOutcome::GaveUp;
                    }
                }
                let delay = backoff_delay(*initial, *max, self.failures);
                self.failures = self.failures.saturating_add(1);
                if *jitter { with_jitter(delay) } else { delay }
            }
        };
        self.pending = true;
        CloseOutcome::Scheduled(delay)
    }

    /// Delay of the first reload under this policy, before any backoff.
    pub fn base_delay(&self) -> Duration {
        match &self.policy {
            ReconnectPolicy::Reload { delay } => *delay,
            ReconnectPolicy::Backoff { initial, .. } => *initial,
        }
    }

    /// The armed reload ran.
    pub fn on_reload(&mut self) {
        self.pending = false;
    }
}

fn backoff_delay(initial: Duration, max: Duration, failures: u32) -> Duration {
    let multiplier = 2_u32.saturating_pow(failures.min(16));
    initial.saturating_mul(multiplier).min(max)
}

/// Keeps half of `delay` and randomizes the rest.
fn with_jitter(delay: Duration) -> Duration {
    let half = delay / 2;
    let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
    half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(max_retries: Option<u32>, jitter: bool) -> ReconnectSchedule {
        ReconnectSchedule::new(ReconnectPolicy::Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            max_retries,
            jitter,
        })
    }

    #[test]
    fn default_reloads_after_five_seconds() {
        let mut schedule = ReconnectSchedule::new(ReconnectPolicy::default());
        assert_eq!(
            schedule.on_close(),
            CloseOutcome::Scheduled(Duration::from_secs(5))
        );
    }

    #[test]
    fn repeated_close_arms_one_timer() {
        let mut schedule = ReconnectSchedule::new(ReconnectPolicy::default());
        assert!(matches!(schedule.on_close(), CloseOutcome::Scheduled(_)));
        assert_eq!(schedule.on_close(), CloseOutcome::AlreadyPending);
        assert_eq!(schedule.on_close(), CloseOutcome::AlreadyPending);

        schedule.on_reload();
        assert!(matches!(schedule.on_close(), CloseOutcome::Scheduled(_)));
    }

    #[test]
    fn base_delay_follows_policy() {
        let schedule = ReconnectSchedule::new(ReconnectPolicy::default());
        assert_eq!(schedule.base_delay(), DEFAULT_RELOAD_DELAY);
        assert_eq!(backoff(None, false).base_delay(), Duration::from_secs(1));
    }

    #[test]
    fn fixed_reload_never_gives_up() {
        let mut schedule = ReconnectSchedule::new(ReconnectPolicy::default());
        for _ in 0..1000 {
            assert_eq!(
                schedule.on_close(),
                CloseOutcome::Scheduled(DEFAULT_RELOAD_DELAY)
            );
            schedule.on_reload();
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut schedule = backoff(None, false);
        let mut delays = Vec::new();
        for _ in 0..6 {
            match schedule.on_close() {
                CloseOutcome::Scheduled(delay) => delays.push(delay.as_secs()),
                other => panic!("unexpected {other:?}"),
            }
            schedule.on_reload();
        }
        assert_eq!(delays, [1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn backoff_resets_after_successful_open() {
        let mut schedule = backoff(None, false);
        schedule.on_close();
        schedule.on_reload();
        schedule.on_close();
        schedule.on_reload();
        schedule.on_open();
        assert_eq!(
            schedule.on_close(),
            CloseOutcome::Scheduled(Duration::from_secs(1))
        );
    }

    #[test]
    fn backoff_stops_after_retry_limit() {
        let mut schedule = backoff(Some(2), false);
        assert!(matches!(schedule.on_close(), CloseOutcome::Scheduled(_)));
        schedule.on_reload();
        assert!(matches!(schedule.on_close(), CloseOutcome::Scheduled(_)));
        schedule.on_reload();
        assert_eq!(schedule.on_close(), CloseOutcome::GaveUp);
        assert_eq!(schedule.on_close(), CloseOutcome::GaveUp);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..50 {
            let mut schedule = backoff(None, true);
            let CloseOutcome::Scheduled(delay) = schedule.on_close() else {
                panic!("expected a scheduled reload");
            };
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_secs(1));
        }
    }
}
