use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::domain::{
    EventCode, ParticipantId, Question, Submission, Survey, SurveyId, SurveyWindow,
};
use super::ledger::ScoreDelta;
use super::repository::{StoreError, SubmissionStore, SurveyStore};

#[derive(Default)]
struct SurveyTable {
    by_id: HashMap<SurveyId, Survey>,
    by_code: HashMap<EventCode, SurveyId>,
}

impl SurveyTable {
    fn by_code_mut(&mut self, code: &EventCode) -> Option<&mut Survey> {
        let id = self.by_code.get(code)?;
        self.by_id.get_mut(id)
    }
}

fn check_revision(survey: &Survey, expected: u64) -> Result<(), StoreError> {
    if survey.revision == expected {
        Ok(())
    } else {
        Err(StoreError::RevisionConflict {
            expected,
            found: survey.revision,
        })
    }
}

/// Process-local survey store. Each call holds the table lock for its full duration.
#[derive(Default, Clone)]
pub struct InMemorySurveyStore {
    table: Arc<Mutex<SurveyTable>>,
}

impl SurveyStore for InMemorySurveyStore {
    fn find_by_event_code(&self, code: &EventCode) -> Result<Option<Survey>, StoreError> {
        let guard = self.table.lock().expect("survey store mutex poisoned");
        Ok(guard
            .by_code
            .get(code)
            .and_then(|id| guard.by_id.get(id))
            .cloned())
    }

    fn find_by_id(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
        let guard = self.table.lock().expect("survey store mutex poisoned");
        Ok(guard.by_id.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Survey>, StoreError> {
        let guard = self.table.lock().expect("survey store mutex poisoned");
        let mut surveys: Vec<Survey> = guard.by_id.values().cloned().collect();
        surveys.sort_by(|a, b| a.event_code.cmp(&b.event_code));
        Ok(surveys)
    }

    fn create(&self, survey: Survey) -> Result<Survey, StoreError> {
        let mut guard = self.table.lock().expect("survey store mutex poisoned");
        if guard.by_id.contains_key(&survey.id) || guard.by_code.contains_key(&survey.event_code)
        {
            return Err(StoreError::Conflict);
        }
        guard
            .by_code
            .insert(survey.event_code.clone(), survey.id.clone());
        guard.by_id.insert(survey.id.clone(), survey.clone());
        Ok(survey)
    }

    fn atomic_update_aggregate(
        &self,
        code: &EventCode,
        expected_revision: u64,
        delta: ScoreDelta,
    ) -> Result<Survey, StoreError> {
        let mut guard = self.table.lock().expect("survey store mutex poisoned");
        let survey = guard.by_code_mut(code).ok_or(StoreError::NotFound)?;
        check_revision(survey, expected_revision)?;
        survey.aggregate = survey.aggregate.apply(delta);
        survey.revision += 1;
        Ok(survey.clone())
    }

    fn replace_questions_and_window(
        &self,
        id: &SurveyId,
        expected_revision: u64,
        questions: Vec<Question>,
        window: SurveyWindow,
    ) -> Result<Survey, StoreError> {
        let mut guard = self.table.lock().expect("survey store mutex poisoned");
        let survey = guard.by_id.get_mut(id).ok_or(StoreError::NotFound)?;
        check_revision(survey, expected_revision)?;
        survey.questions = questions;
        survey.window = window;
        survey.revision += 1;
        Ok(survey.clone())
    }

    fn delete(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
        let mut guard = self.table.lock().expect("survey store mutex poisoned");
        let removed = guard.by_id.remove(id);
        if let Some(survey) = &removed {
            guard.by_code.remove(&survey.event_code);
        }
        Ok(removed)
    }
}

/// Process-local submission store keyed by (participant, event code).
#[derive(Default, Clone)]
pub struct InMemorySubmissionStore {
    records: Arc<Mutex<HashMap<(ParticipantId, EventCode), Submission>>>,
}

impl InMemorySubmissionStore {
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .expect("submission store mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn find_by_participant_and_event(
        &self,
        participant: &ParticipantId,
        code: &EventCode,
    ) -> Result<Option<Submission>, StoreError> {
        let guard = self
            .records
            .lock()
            .expect("submission store mutex poisoned");
        Ok(guard.get(&(participant.clone(), code.clone())).cloned())
    }

    fn upsert(&self, submission: Submission) -> Result<Submission, StoreError> {
        let mut guard = self
            .records
            .lock()
            .expect("submission store mutex poisoned");
        guard.insert(
            (
                submission.participant_id.clone(),
                submission.event_code.clone(),
            ),
            submission.clone(),
        );
        Ok(submission)
    }

    fn remove(
        &self,
        participant: &ParticipantId,
        code: &EventCode,
    ) -> Result<Option<Submission>, StoreError> {
        let mut guard = self
            .records
            .lock()
            .expect("submission store mutex poisoned");
        Ok(guard.remove(&(participant.clone(), code.clone())))
    }
}
