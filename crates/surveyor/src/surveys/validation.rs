use std::collections::HashSet;

use super::domain::{AnswerId, EventCode, ParticipantId, SurveyDraft, EVENT_CODE_LEN};

pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 20;
pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MAX_ANSWER_SCORE: u8 = 10;

/// Shape violations rejected before the core runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("questions must contain at least {min} item")]
    TooFewQuestions { min: usize },
    #[error("questions must contain at most {max} items (found {found})")]
    TooManyQuestions { max: usize, found: usize },
    #[error("question {question} answer {answer} description exceeds {max} characters")]
    DescriptionTooLong {
        question: usize,
        answer: usize,
        max: usize,
    },
    #[error("question {question} answer {answer} score {score} exceeds {max}")]
    ScoreOutOfRange {
        question: usize,
        answer: usize,
        score: u8,
        max: u8,
    },
    #[error("question {question} repeats answer id {id}")]
    DuplicateAnswerId { question: usize, id: String },
    #[error("event code must be exactly {expected} characters (found {found})")]
    EventCodeLength { expected: usize, found: usize },
    #[error("participant id is required")]
    MissingParticipant,
    #[error("answer {position} must be a non-empty id")]
    EmptyAnswerId { position: usize },
}

pub fn validate_draft(draft: &SurveyDraft) -> Result<(), ValidationError> {
    let count = draft.questions.len();
    if count < MIN_QUESTIONS {
        return Err(ValidationError::TooFewQuestions { min: MIN_QUESTIONS });
    }
    if count > MAX_QUESTIONS {
        return Err(ValidationError::TooManyQuestions {
            max: MAX_QUESTIONS,
            found: count,
        });
    }

    for (q, question) in draft.questions.iter().enumerate() {
        let mut seen = HashSet::new();
        for (a, answer) in question.answers.iter().enumerate() {
            if answer.description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(ValidationError::DescriptionTooLong {
                    question: q,
                    answer: a,
                    max: MAX_DESCRIPTION_LEN,
                });
            }
            if answer.score > MAX_ANSWER_SCORE {
                return Err(ValidationError::ScoreOutOfRange {
                    question: q,
                    answer: a,
                    score: answer.score,
                    max: MAX_ANSWER_SCORE,
                });
            }
            if let Some(id) = &answer.id {
                if !seen.insert(id.0.as_str()) {
                    return Err(ValidationError::DuplicateAnswerId {
                        question: q,
                        id: id.0.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

pub fn validate_event_code(raw: &str) -> Result<EventCode, ValidationError> {
    let found = raw.chars().count();
    if found != EVENT_CODE_LEN {
        return Err(ValidationError::EventCodeLength {
            expected: EVENT_CODE_LEN,
            found,
        });
    }
    Ok(EventCode(raw.to_string()))
}

pub fn validate_submission(
    participant: &ParticipantId,
    event_code: &str,
    answers: &[AnswerId],
) -> Result<EventCode, ValidationError> {
    if participant.0.trim().is_empty() {
        return Err(ValidationError::MissingParticipant);
    }
    let code = validate_event_code(event_code)?;
    if let Some(position) = answers.iter().position(|id| id.0.trim().is_empty()) {
        return Err(ValidationError::EmptyAnswerId { position });
    }
    Ok(code)
}
