use chrono::{DateTime, Utc};
use shared_types::{Input, InterviewState, SessionState};

use super::{
    current_target, moved_to, questionnaire, unexpected_state, FlowError, Next, PendingWrite,
    Transition,
};

/// One lesson, one student: the five questions and then done.
pub(super) fn advance(
    session: &SessionState,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<Transition, FlowError> {
    if session.state == InterviewState::AwaitGroupHeld {
        return Err(unexpected_state(session));
    }

    let target = current_target(session)?;
    let answered = questionnaire::answer(session.state, &session.scratch, input)?;

    let next = match answered.next {
        Some(state) => {
            let mut next = moved_to(session, state, now);
            next.scratch = answered.scratch;
            Next::Continue(next)
        }
        None => Next::Done {
            finalized: vec![target.clone()],
        },
    };

    Ok(Transition {
        writes: vec![PendingWrite {
            target,
            patch: answered.patch,
        }],
        next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::test_support::session;
    use shared_types::{FlowKind, ReportPatch};

    #[test]
    fn test_attended_answer_is_written_and_moves_to_paid() {
        let start = session(FlowKind::Individual, &[1], InterviewState::AwaitAttended);
        let t = advance(&start, &Input::Choice(false), Utc::now()).unwrap();

        assert_eq!(t.writes.len(), 1);
        assert_eq!(t.writes[0].patch, ReportPatch::attended(false));
        let Next::Continue(next) = t.next else {
            panic!("expected Continue");
        };
        assert_eq!(next.state, InterviewState::AwaitPaid);
        assert_eq!(next.scratch.attended, Some(false));
        assert_eq!(next.current_index, 0);
    }

    #[test]
    fn test_parent_note_finishes_flow() {
        let start = session(FlowKind::Individual, &[1], InterviewState::AwaitParentNote);
        let t = advance(&start, &Input::Text("-".to_string()), Utc::now()).unwrap();

        assert_eq!(t.writes[0].patch, ReportPatch::parent_note(""));
        match t.next {
            Next::Done { finalized } => {
                assert_eq!(finalized.len(), 1);
                assert_eq!(finalized[0].student_id.0, 1);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_input_writes_nothing() {
        let start = session(FlowKind::Individual, &[1], InterviewState::AwaitHomework);
        let err = advance(&start, &Input::Text("dunno".to_string()), Utc::now()).unwrap_err();
        assert!(matches!(err, FlowError::Invalid(_)));
    }

    #[test]
    fn test_group_state_in_individual_flow_is_unrecoverable() {
        let start = session(FlowKind::Individual, &[1], InterviewState::AwaitGroupHeld);
        let err = advance(&start, &Input::Choice(true), Utc::now()).unwrap_err();
        assert!(matches!(err, FlowError::Unrecoverable(_)));
    }
}
