use super::domain::{
    EventCode, ParticipantId, Question, Submission, Survey, SurveyId, SurveyWindow,
};
use super::ledger::ScoreDelta;

/// Persistence contract for survey aggregates.
///
/// Every write that touches an existing survey is checked against the
/// caller's `expected_revision` and bumps the stored revision on success.
pub trait SurveyStore: Send + Sync {
    fn find_by_event_code(&self, code: &EventCode) -> Result<Option<Survey>, StoreError>;
    fn find_by_id(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError>;
    fn list(&self) -> Result<Vec<Survey>, StoreError>;
    /// Fails with `Conflict` when the id or event code is already taken.
    fn create(&self, survey: Survey) -> Result<Survey, StoreError>;
    fn atomic_update_aggregate(
        &self,
        code: &EventCode,
        expected_revision: u64,
        delta: ScoreDelta,
    ) -> Result<Survey, StoreError>;
    fn replace_questions_and_window(
        &self,
        id: &SurveyId,
        expected_revision: u64,
        questions: Vec<Question>,
        window: SurveyWindow,
    ) -> Result<Survey, StoreError>;
    fn delete(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError>;
}

/// Persistence contract for participant submissions keyed by (participant, event code).
pub trait SubmissionStore: Send + Sync {
    fn find_by_participant_and_event(
        &self,
        participant: &ParticipantId,
        code: &EventCode,
    ) -> Result<Option<Submission>, StoreError>;
    fn upsert(&self, submission: Submission) -> Result<Submission, StoreError>;
    /// Deletes the pair's submission, returning it if one existed.
    fn remove(
        &self,
        participant: &ParticipantId,
        code: &EventCode,
    ) -> Result<Option<Submission>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("revision mismatch (expected {expected}, found {found})")]
    RevisionConflict { expected: u64, found: u64 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
