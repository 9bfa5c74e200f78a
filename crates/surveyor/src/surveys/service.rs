use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{AnswerId, Caller, EventCode, ParticipantId, Survey, SurveyDraft, SurveyId};
use super::lifecycle::{self, LifecycleViolation, SurveyOperation};
use super::registry::{SubmissionReceipt, SubmissionRegistry};
use super::repository::{StoreError, SubmissionStore, SurveyStore};
use super::retry::RetryPolicy;
use super::validation::{self, ValidationError};
use crate::config::EngineConfig;

/// Participant request to submit or revise an answer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Optional; must match the caller unless the caller is privileged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<ParticipantId>,
    pub event_code: String,
    #[serde(default)]
    pub answers: Vec<AnswerId>,
}

/// Facade composing the stores, lifecycle gate and submission registry.
pub struct SurveyService<S, B> {
    surveys: Arc<S>,
    registry: SubmissionRegistry<S, B>,
    retry: RetryPolicy,
    event_code_attempts: u32,
}

impl<S, B> SurveyService<S, B>
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    pub fn new(surveys: Arc<S>, submissions: Arc<B>, config: EngineConfig) -> Self {
        let retry = RetryPolicy::new(config.submit_retry_limit);
        let registry = SubmissionRegistry::new(surveys.clone(), submissions, retry);

        Self {
            surveys,
            registry,
            retry,
            event_code_attempts: config.event_code_attempts.max(1),
        }
    }

    /// Create a survey under a freshly drawn event code.
    pub fn create(
        &self,
        caller: &Caller,
        draft: SurveyDraft,
    ) -> Result<Survey, SurveyServiceError> {
        require_privileged(caller)?;
        validation::validate_draft(&draft)?;

        let window = draft.window();
        let questions = draft.into_questions();

        for _ in 0..self.event_code_attempts {
            let survey = Survey::new(EventCode::generate(), questions.clone(), window);
            match self.surveys.create(survey) {
                Ok(stored) => {
                    info!(
                        survey_id = %stored.id,
                        event_code = %stored.event_code,
                        "survey created"
                    );
                    return Ok(stored);
                }
                Err(StoreError::Conflict) => {
                    warn!("event code collision, drawing another");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(SurveyServiceError::EventCodeExhausted {
            attempts: self.event_code_attempts,
        })
    }

    /// Replace the question bank and window of a survey that has not started.
    pub fn edit(
        &self,
        caller: &Caller,
        survey_id: &SurveyId,
        draft: SurveyDraft,
        now: DateTime<Utc>,
    ) -> Result<Survey, SurveyServiceError> {
        require_privileged(caller)?;
        validation::validate_draft(&draft)?;

        let window = draft.window();
        let questions = draft.into_questions();
        let current = self.fetch(survey_id)?;

        let updated = self.retry.run(&current.event_code, |attempt| {
            let survey = if attempt == 1 {
                current.clone()
            } else {
                self.fetch(survey_id)?
            };
            lifecycle::require(&survey.window, now, SurveyOperation::Edit)?;
            let updated = self.surveys.replace_questions_and_window(
                survey_id,
                survey.revision,
                questions.clone(),
                window,
            )?;
            Ok(updated)
        })?;

        info!(%survey_id, event_code = %updated.event_code, "survey edited");
        Ok(updated)
    }

    /// Remove a survey that has not started, returning its last state.
    pub fn delete(
        &self,
        caller: &Caller,
        survey_id: &SurveyId,
        now: DateTime<Utc>,
    ) -> Result<Survey, SurveyServiceError> {
        require_privileged(caller)?;

        let survey = self.fetch(survey_id)?;
        lifecycle::require(&survey.window, now, SurveyOperation::Delete)?;

        let removed = self
            .surveys
            .delete(survey_id)?
            .ok_or_else(|| SurveyServiceError::SurveyNotFound(survey_id.to_string()))?;

        info!(%survey_id, event_code = %removed.event_code, "survey deleted");
        Ok(removed)
    }

    pub fn list(&self, caller: &Caller) -> Result<Vec<Survey>, SurveyServiceError> {
        require_privileged(caller)?;
        Ok(self.surveys.list()?)
    }

    /// Administrative read; allowed in any lifecycle state.
    pub fn get_admin(
        &self,
        caller: &Caller,
        survey_id: &SurveyId,
    ) -> Result<Survey, SurveyServiceError> {
        require_privileged(caller)?;
        self.fetch(survey_id)
    }

    /// Participant read; only while the survey is running.
    pub fn get_participant(
        &self,
        event_code: &str,
        now: DateTime<Utc>,
    ) -> Result<Survey, SurveyServiceError> {
        let code = validation::validate_event_code(event_code)?;
        let survey = self
            .surveys
            .find_by_event_code(&code)?
            .ok_or_else(|| SurveyServiceError::SurveyNotFound(code.to_string()))?;
        lifecycle::require(&survey.window, now, SurveyOperation::ParticipantRead)?;
        Ok(survey)
    }

    /// Submit or revise the caller's answers for a running survey.
    pub fn submit(
        &self,
        caller: &Caller,
        request: SubmitRequest,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, SurveyServiceError> {
        let participant = match request.participant_id {
            Some(id) if id != caller.participant_id && !caller.is_privileged => {
                return Err(SurveyServiceError::Forbidden);
            }
            Some(id) => id,
            None => caller.participant_id.clone(),
        };

        let code =
            validation::validate_submission(&participant, &request.event_code, &request.answers)?;

        self.registry
            .submit(&participant, &code, request.answers, now)
    }

    fn fetch(&self, survey_id: &SurveyId) -> Result<Survey, SurveyServiceError> {
        self.surveys
            .find_by_id(survey_id)?
            .ok_or_else(|| SurveyServiceError::SurveyNotFound(survey_id.to_string()))
    }
}

fn require_privileged(caller: &Caller) -> Result<(), SurveyServiceError> {
    if caller.is_privileged {
        Ok(())
    } else {
        Err(SurveyServiceError::Forbidden)
    }
}

/// Error raised by the survey service.
#[derive(Debug, thiserror::Error)]
pub enum SurveyServiceError {
    #[error("survey {0} not found")]
    SurveyNotFound(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleViolation),
    #[error("survey {event_code} is busy; gave up after {attempts} attempts")]
    ConcurrentConflict { event_code: EventCode, attempts: u32 },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("caller is not permitted to perform this operation")]
    Forbidden,
    #[error("no unused event code found after {attempts} attempts")]
    EventCodeExhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}
