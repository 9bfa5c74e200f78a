use crate::infra::parse_timestamp;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::sync::Arc;
use surveyor::config::EngineConfig;
use surveyor::error::AppError;
use surveyor::surveys::{
    AnswerDraft, AnswerId, Caller, InMemorySubmissionStore, InMemorySurveyStore, QuestionDraft,
    SubmitRequest, SurveyDraft, SurveyService,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of scripted participants to submit answers.
    #[arg(long, default_value_t = 5)]
    pub(crate) participants: usize,
    /// Survey start (RFC 3339). Defaults to now; the session runs one minute later.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Skip the revision step that shows a resubmission adjusting the totals.
    #[arg(long)]
    pub(crate) skip_revision: bool,
}

type DemoService = SurveyService<InMemorySurveyStore, InMemorySubmissionStore>;

const ANSWER_SHEETS: [[&str; 3]; 4] = [
    ["espresso", "weekly", "yes"],
    ["filter", "daily", "maybe"],
    ["tea", "never", "no"],
    ["espresso", "daily", "yes"],
];

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        participants,
        start,
        skip_revision,
    } = args;

    let start = start.unwrap_or_else(Utc::now);
    let session_time = start + Duration::minutes(1);
    let admin = Caller::administrator("demo-admin");

    println!("Timed survey demo");
    let service = Arc::new(SurveyService::new(
        Arc::new(InMemorySurveyStore::default()),
        Arc::new(InMemorySubmissionStore::default()),
        EngineConfig::default(),
    ));

    let survey = match service.create(&admin, demo_draft(start)) {
        Ok(survey) => survey,
        Err(err) => {
            println!("  Survey rejected: {err}");
            return Ok(());
        }
    };
    println!(
        "- Created survey {} with event code {} ({} questions)",
        survey.id,
        survey.event_code,
        survey.questions.len()
    );
    println!(
        "  Window: {} -> {}",
        survey.window.start_time.to_rfc3339(),
        survey.window.end_time.to_rfc3339()
    );

    match service.get_participant(survey.event_code.as_str(), session_time) {
        Ok(open) => match serde_json::to_string_pretty(&open.participant_view()) {
            Ok(json) => println!("  Participant payload:\n{json}"),
            Err(err) => println!("  Participant payload unavailable: {err}"),
        },
        Err(err) => println!("  Participant view unavailable: {err}"),
    }

    println!("\nSubmissions");
    for index in 0..participants {
        let sheet = ANSWER_SHEETS[index % ANSWER_SHEETS.len()];
        let participant = Caller::participant(format!("participant-{:02}", index + 1));
        submit(&service, &participant, &survey.event_code.0, &sheet, session_time);
    }

    if !skip_revision && participants > 0 {
        println!("\nRevision");
        let participant = Caller::participant("participant-01");
        submit(
            &service,
            &participant,
            &survey.event_code.0,
            &["tea", "never", "no"],
            session_time,
        );
    }

    match service.get_admin(&admin, &survey.id) {
        Ok(stored) => {
            let view = stored.admin_view();
            println!("\nLive aggregate");
            println!(
                "- total {} | {} submissions | average {:.2}",
                view.total_score, view.submissions, view.avg_score
            );
        }
        Err(err) => println!("  Aggregate unavailable: {err}"),
    }

    let late = session_time + Duration::hours(2);
    if let Err(err) = service.submit(
        &Caller::participant("latecomer"),
        request(&survey.event_code.0, &["espresso"]),
        late,
    ) {
        println!("- Late submission refused: {err}");
    }

    Ok(())
}

fn submit(
    service: &DemoService,
    participant: &Caller,
    event_code: &str,
    answers: &[&str],
    now: DateTime<Utc>,
) {
    match service.submit(participant, request(event_code, answers), now) {
        Ok(receipt) => {
            let kind = if receipt.revised() { "revised" } else { "new" };
            println!(
                "- {} ({kind}): delta {:+} -> total {} over {} submissions",
                participant.participant_id,
                receipt.delta.score,
                receipt.aggregate.total_score,
                receipt.aggregate.submission_count
            );
        }
        Err(err) => println!("- {} rejected: {err}", participant.participant_id),
    }
}

fn request(event_code: &str, answers: &[&str]) -> SubmitRequest {
    SubmitRequest {
        participant_id: None,
        event_code: event_code.to_string(),
        answers: answers.iter().map(|id| AnswerId(id.to_string())).collect(),
    }
}

fn option(id: &str, description: &str, score: u8) -> AnswerDraft {
    AnswerDraft {
        id: Some(AnswerId(id.to_string())),
        description: description.to_string(),
        score,
    }
}

fn demo_draft(start: DateTime<Utc>) -> SurveyDraft {
    SurveyDraft {
        questions: vec![
            QuestionDraft {
                question: "Which brew did you pick at the stand?".to_string(),
                answers: vec![
                    option("espresso", "Espresso", 10),
                    option("filter", "Filter coffee", 6),
                    option("tea", "Tea", 2),
                ],
            },
            QuestionDraft {
                question: "How often do you visit?".to_string(),
                answers: vec![
                    option("daily", "Every day", 8),
                    option("weekly", "Once a week", 5),
                    option("never", "First visit", 0),
                ],
            },
            QuestionDraft {
                question: "Would you recommend us?".to_string(),
                answers: vec![
                    option("yes", "Yes", 10),
                    option("maybe", "Maybe", 4),
                    option("no", "No", 0),
                ],
            },
        ],
        start_time: start,
        end_time: start + Duration::hours(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_draft_scores_scripted_sheets() {
        let start = Utc::now();
        let service: DemoService = SurveyService::new(
            Arc::new(InMemorySurveyStore::default()),
            Arc::new(InMemorySubmissionStore::default()),
            EngineConfig::default(),
        );
        let admin = Caller::administrator("demo-admin");
        let survey = service
            .create(&admin, demo_draft(start))
            .expect("demo draft is valid");

        for (index, sheet) in ANSWER_SHEETS.iter().enumerate() {
            service
                .submit(
                    &Caller::participant(format!("p{index}")),
                    request(&survey.event_code.0, sheet),
                    start + Duration::minutes(1),
                )
                .expect("submission accepted");
        }

        let view = service
            .get_admin(&admin, &survey.id)
            .expect("admin read")
            .admin_view();
        // 25 + 18 + 2 + 28
        assert_eq!(view.total_score, 73);
        assert_eq!(view.submissions, 4);
    }

    #[test]
    fn demo_runs_without_revision() {
        let args = DemoArgs {
            participants: 2,
            start: None,
            skip_revision: true,
        };
        assert!(run_demo(args).is_ok());
    }
}
