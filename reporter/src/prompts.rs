//! Question wording for each interview state.

use shared_types::{InterviewState, Prompt, SessionState, NO_NOTE_PLACEHOLDER};

const REPROMPT_PREFIX: &str = "Sorry, I could not use that answer. ";

/// Render the question `session` is waiting on.
pub fn render(session: &SessionState, reprompt: bool) -> Prompt {
    let student = session.current_target().cloned();
    let name = student
        .as_ref()
        .map(|s| s.full_name.as_str())
        .unwrap_or("the student");
    // Attendance changes the wording of the note questions only.
    let missed = session.scratch.attended == Some(false);

    let question = match session.state {
        InterviewState::AwaitGroupHeld => match session.lesson_date {
            Some(date) => format!(
                "Did the group lesson on {} take place?",
                date.format("%d.%m.%Y")
            ),
            None => "Did the group lesson take place?".to_string(),
        },
        InterviewState::AwaitAttended => format!("Did {name} attend the lesson?"),
        InterviewState::AwaitPaid => format!("Has {name} paid for the lesson?"),
        InterviewState::AwaitHomework => format!("Did {name} do the homework?"),
        InterviewState::AwaitStudentNote if missed => format!(
            "Why did {name} miss the lesson? This note is for the student. \
             Send \"{NO_NOTE_PLACEHOLDER}\" to skip."
        ),
        InterviewState::AwaitStudentNote => format!(
            "How did {name} do in the lesson? This note is for the student. \
             Send \"{NO_NOTE_PLACEHOLDER}\" to skip."
        ),
        InterviewState::AwaitParentNote if missed => format!(
            "Anything to tell {name}'s parents about the missed lesson? \
             Send \"{NO_NOTE_PLACEHOLDER}\" to skip."
        ),
        InterviewState::AwaitParentNote => format!(
            "Anything to tell {name}'s parents about the lesson? \
             Send \"{NO_NOTE_PLACEHOLDER}\" to skip."
        ),
    };

    let text = if reprompt {
        format!("{REPROMPT_PREFIX}{question}")
    } else {
        question
    };

    Prompt {
        state: session.state,
        student: match session.state {
            InterviewState::AwaitGroupHeld => None,
            _ => student,
        },
        text,
        expects: session.state.expects(),
        reprompt,
    }
}
