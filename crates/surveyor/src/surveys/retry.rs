use tracing::warn;

use super::domain::EventCode;
use super::repository::StoreError;
use super::service::SurveyServiceError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Bounded re-read-and-recompute loop around compare-and-swap writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `attempt` until it stops failing with a revision conflict.
    ///
    /// Each call must re-read whatever state it computes from. Exhaustion
    /// surfaces as `ConcurrentConflict`.
    pub fn run<T, F>(
        &self,
        event_code: &EventCode,
        mut attempt: F,
    ) -> Result<T, SurveyServiceError>
    where
        F: FnMut(u32) -> Result<T, SurveyServiceError>,
    {
        for n in 1..=self.max_attempts {
            match attempt(n) {
                Err(SurveyServiceError::Store(StoreError::RevisionConflict {
                    expected,
                    found,
                })) => {
                    warn!(
                        %event_code,
                        attempt = n,
                        expected,
                        found,
                        "survey revision moved underneath write, retrying"
                    );
                }
                other => return other,
            }
        }

        warn!(
            %event_code,
            attempts = self.max_attempts,
            "giving up after repeated revision conflicts"
        );
        Err(SurveyServiceError::ConcurrentConflict {
            event_code: event_code.clone(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
