use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use super::domain::{AnswerId, EventCode, ParticipantId, ScoreAggregate, Submission};
use super::ledger::ScoreDelta;
use super::lifecycle::{self, SurveyOperation};
use super::repository::{SubmissionStore, SurveyStore};
use super::retry::RetryPolicy;
use super::service::SurveyServiceError;

/// Result of a submit call: the stored submission and its aggregate effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub submission: Submission,
    pub delta: ScoreDelta,
    pub aggregate: ScoreAggregate,
}

impl SubmissionReceipt {
    pub fn revised(&self) -> bool {
        !self.delta.new_submission
    }
}

/// One mutex per event code with a submit in flight.
///
/// A slot lives only while some caller holds it; the last holder removes it.
#[derive(Default)]
struct EventLocks {
    slots: Mutex<HashMap<EventCode, Arc<Mutex<()>>>>,
}

impl EventLocks {
    fn acquire(&self, code: &EventCode) -> Arc<Mutex<()>> {
        let mut guard = self.slots.lock().expect("event lock table poisoned");
        guard.entry(code.clone()).or_default().clone()
    }

    fn release(&self, code: &EventCode, slot: Arc<Mutex<()>>) {
        let mut guard = self.slots.lock().expect("event lock table poisoned");
        let idle = guard
            .get(code)
            .is_some_and(|held| Arc::ptr_eq(held, &slot) && Arc::strong_count(&slot) == 2);
        if idle {
            guard.remove(code);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().expect("event lock table poisoned").len()
    }
}

/// Upsert-or-revise front door for submissions.
///
/// Reading the prior submission, persisting the new answer set and writing the
/// aggregate happen under the event code's lock. The aggregate write is also
/// revision checked so writers outside this process cannot lose updates. When
/// the aggregate write fails the prior submission is put back.
///
/// `submit` blocks on that lock; async callers should run it off the runtime's
/// worker threads.
pub struct SubmissionRegistry<S, B> {
    surveys: Arc<S>,
    submissions: Arc<B>,
    locks: EventLocks,
    retry: RetryPolicy,
}

impl<S, B> SubmissionRegistry<S, B>
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    pub fn new(surveys: Arc<S>, submissions: Arc<B>, retry: RetryPolicy) -> Self {
        Self {
            surveys,
            submissions,
            locks: EventLocks::default(),
            retry,
        }
    }

    pub fn submit(
        &self,
        participant: &ParticipantId,
        event_code: &EventCode,
        answers: Vec<AnswerId>,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, SurveyServiceError> {
        let slot = self.locks.acquire(event_code);
        let outcome = {
            let _serialized = slot.lock().expect("event lock poisoned");
            self.retry.run(event_code, |_attempt| {
                self.submit_once(participant, event_code, &answers, now)
            })
        };
        self.locks.release(event_code, slot);
        outcome
    }

    fn submit_once(
        &self,
        participant: &ParticipantId,
        event_code: &EventCode,
        answers: &[AnswerId],
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, SurveyServiceError> {
        let survey = self
            .surveys
            .find_by_event_code(event_code)?
            .ok_or_else(|| SurveyServiceError::SurveyNotFound(event_code.to_string()))?;
        lifecycle::require(&survey.window, now, SurveyOperation::Submit)?;

        let existing = self
            .submissions
            .find_by_participant_and_event(participant, event_code)?;
        let delta = ScoreDelta::between(
            &survey.questions,
            existing.as_ref().map(|prior| prior.answers.as_slice()),
            answers,
        );

        let submission = self.submissions.upsert(Submission {
            participant_id: participant.clone(),
            event_code: event_code.clone(),
            answers: answers.to_vec(),
        })?;

        let updated = match self
            .surveys
            .atomic_update_aggregate(event_code, survey.revision, delta)
        {
            Ok(updated) => updated,
            Err(err) => {
                self.restore(participant, event_code, existing);
                return Err(err.into());
            }
        };

        if delta.new_submission {
            info!(
                %event_code,
                %participant,
                score = delta.score,
                submissions = updated.aggregate.submission_count,
                "submission recorded"
            );
        } else {
            debug!(%event_code, %participant, delta = delta.score, "submission revised");
        }

        Ok(SubmissionReceipt {
            submission,
            delta,
            aggregate: updated.aggregate,
        })
    }

    /// Puts back the submission that was current before a failed aggregate write.
    fn restore(
        &self,
        participant: &ParticipantId,
        event_code: &EventCode,
        previous: Option<Submission>,
    ) {
        let restored = match previous {
            Some(prior) => self.submissions.upsert(prior).map(|_| ()),
            None => self.submissions.remove(participant, event_code).map(|_| ()),
        };
        if let Err(err) = restored {
            error!(
                %event_code,
                %participant,
                %err,
                "submission rollback failed after aggregate write error"
            );
        }
    }

    /// Number of event codes with a submit currently holding a lock slot.
    #[cfg(test)]
    pub(crate) fn active_locks(&self) -> usize {
        self.locks.len()
    }
}
