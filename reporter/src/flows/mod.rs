//! Report interview flows.
//!
//! Handlers are pure: they read the persisted [`SessionState`] and one
//! [`Input`], and describe what should happen next as a [`Transition`].
//! The engine performs the writes, then persists or clears the session.

mod group;
mod individual;
mod questionnaire;

use chrono::{DateTime, Utc};
use shared_types::{
    FlowKind, Input, InterviewState, ReportPatch, ReportTarget, SessionState, StudentId,
};

/// A report field write the engine must commit before moving on.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub target: ReportTarget,
    pub patch: ReportPatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Next {
    /// Same student (or the group question), next question.
    Continue(SessionState),
    /// The student's sub-wizard is finished and the group moves on.
    StudentAdvanced {
        prior: StudentId,
        state: SessionState,
    },
    /// The flow is finished; these records go out.
    Done { finalized: Vec<ReportTarget> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub writes: Vec<PendingWrite>,
    pub next: Next,
}

/// Answer did not fit the question; the question is asked again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAnswer {
    #[error("expected a yes/no choice")]
    ExpectedChoice,

    #[error("expected a text message")]
    ExpectedText,

    #[error("note is empty")]
    EmptyNote,

    #[error("note is longer than {0} characters")]
    NoteTooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Invalid(#[from] InvalidAnswer),

    /// The session itself is inconsistent and cannot continue.
    #[error("{0}")]
    Unrecoverable(String),
}

/// Apply one inbound answer to the session's current question.
pub fn advance(
    session: &SessionState,
    input: &Input,
    now: DateTime<Utc>,
) -> Result<Transition, FlowError> {
    match session.flow {
        FlowKind::Individual => individual::advance(session, input, now),
        FlowKind::Group => group::advance(session, input, now),
    }
}

fn current_target(session: &SessionState) -> Result<ReportTarget, FlowError> {
    session.current_target().cloned().ok_or_else(|| {
        FlowError::Unrecoverable(format!(
            "no student at index {} of {}",
            session.current_index,
            session.targets.len()
        ))
    })
}

fn unexpected_state(session: &SessionState) -> FlowError {
    FlowError::Unrecoverable(format!(
        "state {} is not part of the {:?} flow",
        session.state, session.flow
    ))
}

/// Copy of `session` waiting on `state`.
fn moved_to(session: &SessionState, state: InterviewState, now: DateTime<Utc>) -> SessionState {
    let mut next = session.clone();
    next.state = state;
    next.updated_at = now;
    next
}
