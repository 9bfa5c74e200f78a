use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Internal identifier administrators use to address a survey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurveyId(pub String);

impl SurveyId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public six character code participants use to reach a survey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventCode(pub String);

pub const EVENT_CODE_LEN: usize = 6;

impl EventCode {
    /// Draws a random six digit code (100000..=999999).
    pub fn generate() -> Self {
        let value: u32 = rand::thread_rng().gen_range(100_000..=999_999);
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an answer, scoped to the question that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnswerId(pub String);

impl AnswerId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Verified participant identifier supplied by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub description: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub answers: Vec<Answer>,
}

impl Question {
    /// Looks up an answer owned by this question only.
    pub fn answer(&self, id: &AnswerId) -> Option<&Answer> {
        self.answers.iter().find(|answer| &answer.id == id)
    }
}

/// Activity window; both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl SurveyWindow {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }
}

/// Running totals cached on the survey.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreAggregate {
    pub total_score: i64,
    pub submission_count: u64,
    pub avg_score: f64,
}

impl Default for ScoreAggregate {
    fn default() -> Self {
        Self {
            total_score: 0,
            submission_count: 0,
            avg_score: 0.0,
        }
    }
}

/// Aggregate root persisted by the survey store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub event_code: EventCode,
    pub questions: Vec<Question>,
    pub window: SurveyWindow,
    pub aggregate: ScoreAggregate,
    /// Bumped on every write; used as the compare-and-swap token.
    pub revision: u64,
}

impl Survey {
    pub fn new(event_code: EventCode, questions: Vec<Question>, window: SurveyWindow) -> Self {
        Self {
            id: SurveyId::generate(),
            event_code,
            questions,
            window,
            aggregate: ScoreAggregate::default(),
            revision: 0,
        }
    }

    pub fn admin_view(&self) -> SurveyView {
        SurveyView {
            id: self.id.clone(),
            event_code: self.event_code.clone(),
            questions: self.questions.clone(),
            window: self.window,
            total_score: self.aggregate.total_score,
            submissions: self.aggregate.submission_count,
            avg_score: self.aggregate.avg_score,
        }
    }

    pub fn participant_view(&self) -> ParticipantSurveyView {
        ParticipantSurveyView {
            event_code: self.event_code.clone(),
            questions: self.questions.clone(),
            window: self.window,
        }
    }
}

/// One participant's current answer set for one survey.
///
/// `answers[i]` addresses `questions[i]` of the referenced survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub participant_id: ParticipantId,
    pub event_code: EventCode,
    pub answers: Vec<AnswerId>,
}

/// Administrative payload used to create or replace a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyDraft {
    pub questions: Vec<QuestionDraft>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub question: String,
    pub answers: Vec<AnswerDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AnswerId>,
    pub description: String,
    pub score: u8,
}

impl SurveyDraft {
    pub fn window(&self) -> SurveyWindow {
        SurveyWindow::new(self.start_time, self.end_time)
    }

    /// Materialises the draft, keeping supplied answer ids and minting the rest.
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
            .into_iter()
            .map(|draft| Question {
                question: draft.question,
                answers: draft
                    .answers
                    .into_iter()
                    .map(|answer| Answer {
                        id: answer.id.unwrap_or_else(AnswerId::generate),
                        description: answer.description,
                        score: answer.score,
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Full survey state exposed to privileged callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyView {
    pub id: SurveyId,
    pub event_code: EventCode,
    pub questions: Vec<Question>,
    pub window: SurveyWindow,
    pub total_score: i64,
    pub submissions: u64,
    pub avg_score: f64,
}

/// What a participant sees while the survey is running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantSurveyView {
    pub event_code: EventCode,
    pub questions: Vec<Question>,
    pub window: SurveyWindow,
}

/// Identity handed to the core by the authentication layer. Trusted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub participant_id: ParticipantId,
    pub is_privileged: bool,
}

impl Caller {
    pub fn participant(id: impl Into<String>) -> Self {
        Self {
            participant_id: ParticipantId(id.into()),
            is_privileged: false,
        }
    }

    pub fn administrator(id: impl Into<String>) -> Self {
        Self {
            participant_id: ParticipantId(id.into()),
            is_privileged: true,
        }
    }
}
