//! Group lessons: one "was it held" question, then the five-question
//! sub-wizard once per student, in roster order.
//!
//! `current_index` only moves after the student's last answer has been
//! written, so a restart resumes on the exact question that is still open.

use chrono::{DateTime, Utc};
use shared_types::{Input, InterviewState, ReportPatch, Scratch, SessionState};

use super::{
    current_target, moved_to, questionnaire, FlowError, Next, PendingWrite, Transition,
};

pub(super) fn advance(
    session: &SessionState,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<Transition, FlowError> {
    if session.targets.is_empty() {
        return Err(FlowError::Unrecoverable(
            "group session has no students".to_string(),
        ));
    }

    match session.state {
        InterviewState::AwaitGroupHeld => answer_held(session, input, now),
        _ => answer_student(session, input, now),
    }
}

fn answer_held(
    session: &SessionState,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<Transition, FlowError> {
    if questionnaire::expect_choice(input)? {
        let mut next = moved_to(session, InterviewState::AwaitAttended, now);
        next.current_index = 0;
        next.scratch = Scratch::default();
        return Ok(Transition {
            writes: Vec::new(),
            next: Next::Continue(next),
        });
    }

    // Not held: every student is closed as absent, no sub-wizard runs.
    let writes = session
        .targets
        .iter()
        .map(|target| PendingWrite {
            target: target.clone(),
            patch: ReportPatch::lesson_not_held(),
        })
        .collect();

    Ok(Transition {
        writes,
        next: Next::Done {
            finalized: session.targets.clone(),
        },
    })
}

fn answer_student(
    session: &SessionState,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<Transition, FlowError> {
    let target = current_target(session)?;
    let answered = questionnaire::answer(session.state, &session.scratch, input)?;

    // The lesson was held, so an earlier "not held" report must not survive.
    let mut patch = answered.patch;
    if session.state == InterviewState::AwaitAttended {
        patch.lesson_cancelled = Some(false);
    }

    let next = match answered.next {
        Some(state) => {
            let mut next = moved_to(session, state, now);
            next.scratch = answered.scratch;
            Next::Continue(next)
        }
        None if session.is_last_target() => Next::Done {
            finalized: session.targets.clone(),
        },
        None => {
            let mut next = moved_to(session, InterviewState::AwaitAttended, now);
            next.current_index = session.current_index + 1;
            next.scratch = Scratch::default();
            Next::StudentAdvanced {
                prior: target.student_id,
                state: next,
            }
        }
    };

    Ok(Transition {
        writes: vec![PendingWrite { target, patch }],
        next,
    })
}
