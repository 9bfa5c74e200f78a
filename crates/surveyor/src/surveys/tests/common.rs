use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::surveys::domain::{
    AnswerDraft, AnswerId, Caller, EventCode, ParticipantId, Question, QuestionDraft, Submission,
    Survey, SurveyDraft, SurveyId, SurveyWindow,
};
use crate::surveys::ledger::ScoreDelta;
use crate::surveys::memory::{InMemorySubmissionStore, InMemorySurveyStore};
use crate::surveys::repository::{StoreError, SubmissionStore, SurveyStore};
use crate::surveys::service::{SubmitRequest, SurveyService};

pub(super) type MemoryService = SurveyService<InMemorySurveyStore, InMemorySubmissionStore>;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn hours(offset: i64) -> DateTime<Utc> {
    now() + Duration::hours(offset)
}

pub(super) fn admin() -> Caller {
    Caller::administrator("admin-1")
}

pub(super) fn participant(n: usize) -> Caller {
    Caller::participant(format!("participant-{n}"))
}

pub(super) fn answer(id: &str, score: u8) -> AnswerDraft {
    AnswerDraft {
        id: Some(AnswerId(id.to_string())),
        description: format!("answer {id}"),
        score,
    }
}

pub(super) fn ids(raw: &[&str]) -> Vec<AnswerId> {
    raw.iter().map(|id| AnswerId(id.to_string())).collect()
}

/// One question with answers `a1` (score 1) and `a2` (score 2).
pub(super) fn single_question_draft(start: DateTime<Utc>, end: DateTime<Utc>) -> SurveyDraft {
    SurveyDraft {
        questions: vec![QuestionDraft {
            question: "How was the talk?".to_string(),
            answers: vec![answer("a1", 1), answer("a2", 2)],
        }],
        start_time: start,
        end_time: end,
    }
}

/// Three questions whose answers reuse ids across positions on purpose.
pub(super) fn three_question_draft(start: DateTime<Utc>, end: DateTime<Utc>) -> SurveyDraft {
    SurveyDraft {
        questions: vec![
            QuestionDraft {
                question: "Venue".to_string(),
                answers: vec![answer("low", 1), answer("high", 5)],
            },
            QuestionDraft {
                question: "Speakers".to_string(),
                answers: vec![answer("low", 2), answer("high", 8)],
            },
            QuestionDraft {
                question: "Food".to_string(),
                answers: vec![answer("meh", 3), answer("great", 10)],
            },
        ],
        start_time: start,
        end_time: end,
    }
}

pub(super) fn questions_of(draft: &SurveyDraft) -> Vec<Question> {
    draft.clone().into_questions()
}

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemorySurveyStore>,
    Arc<InMemorySubmissionStore>,
) {
    let surveys = Arc::new(InMemorySurveyStore::default());
    let submissions = Arc::new(InMemorySubmissionStore::default());
    let service =
        SurveyService::new(surveys.clone(), submissions.clone(), EngineConfig::default());
    (service, surveys, submissions)
}

/// Creates a survey whose window contains `now()`.
pub(super) fn running_survey(service: &MemoryService) -> Survey {
    service
        .create(&admin(), single_question_draft(hours(-1), hours(1)))
        .expect("survey created")
}

pub(super) fn submit_request(code: &EventCode, answers: &[&str]) -> SubmitRequest {
    SubmitRequest {
        participant_id: None,
        event_code: code.0.clone(),
        answers: ids(answers),
    }
}

pub(super) fn window(start: i64, end: i64) -> SurveyWindow {
    SurveyWindow::new(hours(start), hours(end))
}

/// Survey store that reports a revision conflict for the first `conflicts` aggregate writes
/// and a duplicate key for the first `create_conflicts` inserts.
pub(super) struct ContendedSurveyStore {
    inner: InMemorySurveyStore,
    remaining: AtomicU32,
    create_conflicts: AtomicU32,
    pub(super) attempts: AtomicU32,
}

impl ContendedSurveyStore {
    pub(super) fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemorySurveyStore::default(),
            remaining: AtomicU32::new(conflicts),
            create_conflicts: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    pub(super) fn with_create_conflicts(self, create_conflicts: u32) -> Self {
        self.create_conflicts.store(create_conflicts, Ordering::SeqCst);
        self
    }

    pub(super) fn inject_conflicts(&self, conflicts: u32) {
        self.remaining.store(conflicts, Ordering::SeqCst);
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl SurveyStore for ContendedSurveyStore {
    fn find_by_event_code(&self, code: &EventCode) -> Result<Option<Survey>, StoreError> {
        self.inner.find_by_event_code(code)
    }

    fn find_by_id(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
        self.inner.find_by_id(id)
    }

    fn list(&self) -> Result<Vec<Survey>, StoreError> {
        self.inner.list()
    }

    fn create(&self, survey: Survey) -> Result<Survey, StoreError> {
        if take_one(&self.create_conflicts) {
            return Err(StoreError::Conflict);
        }
        self.inner.create(survey)
    }

    fn atomic_update_aggregate(
        &self,
        code: &EventCode,
        expected_revision: u64,
        delta: ScoreDelta,
    ) -> Result<Survey, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.remaining) {
            return Err(StoreError::RevisionConflict {
                expected: expected_revision,
                found: expected_revision + 1,
            });
        }
        self.inner
            .atomic_update_aggregate(code, expected_revision, delta)
    }

    fn replace_questions_and_window(
        &self,
        id: &SurveyId,
        expected_revision: u64,
        questions: Vec<Question>,
        window: SurveyWindow,
    ) -> Result<Survey, StoreError> {
        self.inner
            .replace_questions_and_window(id, expected_revision, questions, window)
    }

    fn delete(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
        self.inner.delete(id)
    }
}

/// Survey store whose backend is offline.
pub(super) struct UnavailableSurveyStore;

impl SurveyStore for UnavailableSurveyStore {
    fn find_by_event_code(&self, _code: &EventCode) -> Result<Option<Survey>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn find_by_id(&self, _id: &SurveyId) -> Result<Option<Survey>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<Survey>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn create(&self, _survey: Survey) -> Result<Survey, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn atomic_update_aggregate(
        &self,
        _code: &EventCode,
        _expected_revision: u64,
        _delta: ScoreDelta,
    ) -> Result<Survey, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn replace_questions_and_window(
        &self,
        _id: &SurveyId,
        _expected_revision: u64,
        _questions: Vec<Question>,
        _window: SurveyWindow,
    ) -> Result<Survey, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &SurveyId) -> Result<Option<Survey>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Submission store that serves reads but rejects every upsert.
#[derive(Default)]
pub(super) struct ReadOnlySubmissionStore {
    inner: InMemorySubmissionStore,
}

impl SubmissionStore for ReadOnlySubmissionStore {
    fn find_by_participant_and_event(
        &self,
        participant: &ParticipantId,
        code: &EventCode,
    ) -> Result<Option<Submission>, StoreError> {
        self.inner.find_by_participant_and_event(participant, code)
    }

    fn upsert(&self, _submission: Submission) -> Result<Submission, StoreError> {
        Err(StoreError::Unavailable("submission table read-only".to_string()))
    }

    fn remove(
        &self,
        participant: &ParticipantId,
        code: &EventCode,
    ) -> Result<Option<Submission>, StoreError> {
        self.inner.remove(participant, code)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
