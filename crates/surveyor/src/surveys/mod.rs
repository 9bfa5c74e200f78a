//! Timed surveys: lifecycle gating, positional scoring and live aggregates.

pub mod domain;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod registry;
pub mod repository;
pub mod retry;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    Answer, AnswerDraft, AnswerId, Caller, EventCode, ParticipantId, ParticipantSurveyView,
    Question, QuestionDraft, ScoreAggregate, Submission, Survey, SurveyDraft, SurveyId,
    SurveyView, SurveyWindow,
};
pub use ledger::{resolve, ResolvedAnswer, ScoreDelta};
pub use lifecycle::{classify, LifecycleState, LifecycleViolation, SurveyOperation};
pub use memory::{InMemorySubmissionStore, InMemorySurveyStore};
pub use registry::{SubmissionReceipt, SubmissionRegistry};
pub use repository::{StoreError, SubmissionStore, SurveyStore};
pub use retry::RetryPolicy;
pub use router::survey_router;
pub use service::{SubmitRequest, SurveyService, SurveyServiceError};
pub use validation::ValidationError;
