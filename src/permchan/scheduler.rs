//! Dirty-flag driven flush timing with multiplicative backoff.
//!
//! Each tick either does nothing (clean), flushes and returns to the base
//! period (success) or stays dirty and stretches the interval by the
//! backoff factor up to the cap (failure).

use super::marker::DirtyFlag;
use crate::error::PersistError;
use std::time::Duration;
use tracing::{debug, error};

/// Result of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing changed since the last flush.
    Idle,
    /// Snapshot written; interval back at the base period.
    Flushed,
    /// Write failed; still dirty, next attempt after `retry_in`.
    Failed { retry_in: Duration },
}

/// Flush timing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub base: Duration,
    /// 0 and 1 keep retrying at the current interval.
    pub backoff: u8,
    pub max: Duration,
}

#[derive(Debug)]
pub struct FlushScheduler {
    policy: FlushPolicy,
    interval: Duration,
    dirty: DirtyFlag,
}

impl FlushScheduler {
    pub fn new(policy: FlushPolicy, dirty: DirtyFlag) -> Self {
        Self {
            interval: policy.base,
            policy,
            dirty,
        }
    }

    /// Delay until the next tick.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_set()
    }

    /// Swap the policy and restart from its base period. The dirty flag is
    /// left alone.
    pub fn reconfigure(&mut self, policy: FlushPolicy) {
        self.policy = policy;
        self.interval = policy.base;
    }

    /// Run one tick, calling `flush` only when dirty.
    pub fn tick<F>(&mut self, flush: F) -> TickOutcome
    where
        F: FnOnce() -> Result<(), PersistError>,
    {
        if !self.dirty.is_set() {
            return TickOutcome::Idle;
        }

        match flush() {
            Ok(()) => {
                self.dirty.clear();
                self.interval = self.policy.base;
                TickOutcome::Flushed
            }
            Err(e) => {
                error!(error = %e, "Failed to write permanent channel database");
                if self.policy.backoff > 1 {
                    self.interval = self
                        .interval
                        .saturating_mul(u32::from(self.policy.backoff))
                        .min(self.policy.max);
                }
                debug!(retry_in = self.interval.as_secs(), "Trying again later");
                TickOutcome::Failed {
                    retry_in: self.interval,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    fn failure() -> Result<(), PersistError> {
        Err(PersistError::Open {
            path: PathBuf::from("/readonly/perm.conf.new.1"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        })
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn scheduler(backoff: u8) -> (FlushScheduler, DirtyFlag) {
        let dirty = DirtyFlag::default();
        let policy = FlushPolicy {
            base: secs(5),
            backoff,
            max: secs(60),
        };
        (FlushScheduler::new(policy, dirty.clone()), dirty)
    }

    #[test]
    fn clean_tick_never_flushes() {
        let (mut sched, _) = scheduler(0);
        let outcome = sched.tick(|| panic!("flushed while clean"));
        assert_eq!(outcome, TickOutcome::Idle);
    }

    #[test]
    fn many_mutations_one_flush() {
        let (mut sched, dirty) = scheduler(0);
        for _ in 0..10 {
            dirty.mark();
        }
        let mut flushes = 0;
        assert_eq!(
            sched.tick(|| {
                flushes += 1;
                Ok(())
            }),
            TickOutcome::Flushed
        );
        assert_eq!(
            sched.tick(|| {
                flushes += 1;
                Ok(())
            }),
            TickOutcome::Idle
        );
        assert_eq!(flushes, 1);
        assert!(!sched.is_dirty());
    }

    #[test]
    fn backoff_grows_to_cap_then_resets() {
        let (mut sched, dirty) = scheduler(3);
        dirty.mark();

        let mut seen = vec![sched.interval()];
        for _ in 0..3 {
            let outcome = sched.tick(failure);
            assert_eq!(
                outcome,
                TickOutcome::Failed {
                    retry_in: sched.interval()
                }
            );
            seen.push(sched.interval());
        }
        assert_eq!(seen, [secs(5), secs(15), secs(45), secs(60)]);
        assert!(sched.is_dirty());

        assert_eq!(sched.tick(|| Ok(())), TickOutcome::Flushed);
        assert_eq!(sched.interval(), secs(5));
    }

    #[test]
    fn factor_of_one_keeps_fixed_cadence() {
        for factor in [0, 1] {
            let (mut sched, dirty) = scheduler(factor);
            dirty.mark();
            sched.tick(failure);
            sched.tick(failure);
            assert_eq!(sched.interval(), secs(5));
            assert!(sched.is_dirty());
        }
    }

    #[test]
    fn reconfigure_resets_interval_not_dirty() {
        let (mut sched, dirty) = scheduler(2);
        dirty.mark();
        sched.tick(failure);
        assert_eq!(sched.interval(), secs(10));

        sched.reconfigure(FlushPolicy {
            base: secs(1),
            backoff: 2,
            max: secs(8),
        });
        assert_eq!(sched.interval(), secs(1));
        assert!(sched.is_dirty());
    }
}
