//! Score ledger: positional answer resolution and aggregate deltas.
//!
//! Resolution is strictly positional. `answer_ids[i]` is looked up inside
//! `questions[i]` and nowhere else; a miss scores zero for that slot.

use serde::Serialize;

use super::domain::{Answer, AnswerId, Question, ScoreAggregate};

/// Outcome of resolving one answer slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAnswer<'a> {
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<&'a Answer>,
}

impl ResolvedAnswer<'_> {
    pub fn score(&self) -> i64 {
        self.answer.map(|answer| i64::from(answer.score)).unwrap_or(0)
    }
}

/// Resolves `answer_ids` against `questions`, yielding exactly one entry per question.
///
/// Missing ids (short input or unknown at that position) resolve to `None`.
/// Ids past the last question are ignored.
pub fn resolve<'a>(questions: &'a [Question], answer_ids: &[AnswerId]) -> Vec<ResolvedAnswer<'a>> {
    questions
        .iter()
        .enumerate()
        .map(|(position, question)| ResolvedAnswer {
            position,
            answer: answer_ids.get(position).and_then(|id| question.answer(id)),
        })
        .collect()
}

pub fn total(resolved: &[ResolvedAnswer<'_>]) -> i64 {
    resolved.iter().map(ResolvedAnswer::score).sum()
}

/// Net change a submission applies to its survey's aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreDelta {
    pub score: i64,
    pub new_submission: bool,
}

impl ScoreDelta {
    /// Difference between the incoming and retracted answer sets.
    ///
    /// `previous` is `None` for a first submission.
    pub fn between(
        questions: &[Question],
        previous: Option<&[AnswerId]>,
        incoming: &[AnswerId],
    ) -> Self {
        let new_total = total(&resolve(questions, incoming));
        match previous {
            Some(previous) => Self {
                score: new_total - total(&resolve(questions, previous)),
                new_submission: false,
            },
            None => Self {
                score: new_total,
                new_submission: true,
            },
        }
    }

    pub fn is_noop(&self) -> bool {
        self.score == 0 && !self.new_submission
    }
}

impl ScoreAggregate {
    /// Returns the aggregate after applying `delta`. Average is zero with no submissions.
    pub fn apply(&self, delta: ScoreDelta) -> ScoreAggregate {
        let total_score = self.total_score + delta.score;
        let submission_count = if delta.new_submission {
            self.submission_count + 1
        } else {
            self.submission_count
        };

        ScoreAggregate {
            total_score,
            submission_count,
            avg_score: average(total_score, submission_count),
        }
    }
}

pub fn average(total_score: i64, submission_count: u64) -> f64 {
    if submission_count == 0 {
        0.0
    } else {
        total_score as f64 / submission_count as f64
    }
}
