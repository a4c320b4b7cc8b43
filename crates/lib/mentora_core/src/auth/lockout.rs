//! Failed-attempt tracking and temporary account lockout.
//!
//! State lives in two identity columns (counter + last failure). Whether an
//! account is locked is computed at check time; nothing runs in the background.
//! A lockout ends `lockout_duration` after the last recorded failure, and
//! failures are not recorded while locked, so a burst can never extend a
//! lockout indefinitely.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use super::AuthError;
use crate::clock::Clock;
use crate::store::AuthStore;

/// Lockout thresholds.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lockout_duration: Duration,
}

/// Per-identity failed-attempt guard, keyed by email.
#[derive(Clone)]
pub struct AccountGuard {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    policy: LockoutPolicy,
}

impl AccountGuard {
    pub fn new(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>, policy: LockoutPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// True while `max_failed_attempts` failures sit inside the lockout window.
    ///
    /// Once the window has passed, stale counters are reset here.
    pub async fn is_locked(&self, email: &str) -> Result<bool, AuthError> {
        let Some(state) = self.store.failed_attempts(email).await? else {
            return Ok(false);
        };
        let Some(last) = state.last_failed_at else {
            return Ok(false);
        };

        let now = self.clock.now();
        if now - last >= self.policy.lockout_duration {
            if state.count > 0 {
                self.store.reset_failed_attempts(email).await?;
                info!(email, "lockout window elapsed, failure counter reset");
            }
            return Ok(false);
        }
        Ok(state.count >= self.policy.max_failed_attempts)
    }

    /// Count one failed attempt. Does not itself lock; `is_locked` decides.
    pub async fn record_failure(&self, email: &str) -> Result<(), AuthError> {
        let now = self.clock.now();
        self.store
            .record_failed_attempt(email, now, now - self.policy.lockout_duration)
            .await?;

        if let Some(state) = self.store.failed_attempts(email).await?
            && state.count >= self.policy.max_failed_attempts
        {
            warn!(
                email,
                failed_attempts = state.count,
                "failure threshold reached, account locked"
            );
        }
        Ok(())
    }

    /// Clear the failure counter after a successful authentication.
    pub async fn reset(&self, email: &str) -> Result<(), AuthError> {
        self.store.reset_failed_attempts(email).await?;
        Ok(())
    }
}
