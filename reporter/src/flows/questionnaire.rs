//! The five-question sub-wizard shared by both flows.

use shared_types::{
    Input, InterviewState, ReportPatch, Scratch, MAX_NOTE_CHARS, NO_NOTE_PLACEHOLDER,
};

use super::{FlowError, InvalidAnswer};

/// Result of answering one question for the current student.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Answer {
    pub patch: ReportPatch,
    pub scratch: Scratch,
    /// `None` once the parent note, the last question, is answered.
    pub next: Option<InterviewState>,
}

pub(super) fn answer(
    state: InterviewState,
    scratch: &Scratch,
    input: &Input,
) -> Result<Answer, FlowError> {
    let keep = scratch.clone();
    let answered = match state {
        InterviewState::AwaitAttended => {
            let attended = expect_choice(input)?;
            Answer {
                patch: ReportPatch::attended(attended),
                scratch: Scratch {
                    attended: Some(attended),
                },
                next: Some(InterviewState::AwaitPaid),
            }
        }
        // Non-attendance does not skip anything; only note wording changes.
        InterviewState::AwaitPaid => Answer {
            patch: ReportPatch::paid(expect_choice(input)?),
            scratch: keep,
            next: Some(InterviewState::AwaitHomework),
        },
        InterviewState::AwaitHomework => Answer {
            patch: ReportPatch::homework_done(expect_choice(input)?),
            scratch: keep,
            next: Some(InterviewState::AwaitStudentNote),
        },
        InterviewState::AwaitStudentNote => Answer {
            patch: ReportPatch::student_note(expect_note(input)?),
            scratch: keep,
            next: Some(InterviewState::AwaitParentNote),
        },
        InterviewState::AwaitParentNote => Answer {
            patch: ReportPatch::parent_note(expect_note(input)?),
            scratch: keep,
            next: None,
        },
        InterviewState::AwaitGroupHeld => {
            return Err(FlowError::Unrecoverable(
                "group question reached inside a student interview".to_string(),
            ))
        }
    };
    Ok(answered)
}

pub(super) fn expect_choice(input: &Input) -> Result<bool, InvalidAnswer> {
    match input {
        Input::Choice(value) => Ok(*value),
        Input::Text(_) => Err(InvalidAnswer::ExpectedChoice),
    }
}

/// Trimmed note text; the placeholder becomes an empty note.
fn expect_note(input: &Input) -> Result<String, InvalidAnswer> {
    let Input::Text(raw) = input else {
        return Err(InvalidAnswer::ExpectedText);
    };
    let text = raw.trim();
    if text == NO_NOTE_PLACEHOLDER {
        return Ok(String::new());
    }
    if text.is_empty() {
        return Err(InvalidAnswer::EmptyNote);
    }
    if text.chars().count() > MAX_NOTE_CHARS {
        return Err(InvalidAnswer::NoteTooLong(MAX_NOTE_CHARS));
    }
    Ok(text.to_string())
}
