//! Shared types between the interview engine and the chat transport
//!
//! These types are used by both:
//! - the `reporter` engine and its SQLite collaborators
//! - the transport layer that renders prompts and forwards answers
//!
//! Serializable with serde for JSON over HTTP and for the durable session blob

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LessonId(pub i64);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct StudentId(pub i64);

impl std::fmt::Display for LessonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Report Records
// ============================================================================

/// Persisted outcome for one (lesson, student) pair.
///
/// Answer fields are filled strictly in the order attended → paid →
/// homework_done → student_note → parent_note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRecord {
    pub lesson_id: LessonId,
    pub student_id: StudentId,
    pub attended: Option<bool>,
    pub paid: Option<bool>,
    pub homework_done: Option<bool>,
    pub student_note: Option<String>,
    pub parent_note: Option<String>,
    /// Set when the whole group lesson did not take place.
    pub lesson_cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportRecord {
    pub fn empty(lesson_id: LessonId, student_id: StudentId, now: DateTime<Utc>) -> Self {
        Self {
            lesson_id,
            student_id,
            attended: None,
            paid: None,
            homework_done: None,
            student_note: None,
            parent_note: None,
            lesson_cancelled: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// All five answers are present.
    pub fn is_complete(&self) -> bool {
        self.attended.is_some()
            && self.paid.is_some()
            && self.homework_done.is_some()
            && self.student_note.is_some()
            && self.parent_note.is_some()
    }

    /// Complete, or closed early because the group lesson was not held.
    /// Either way the record is ready to be sent out.
    pub fn is_final(&self) -> bool {
        self.is_complete() || self.lesson_cancelled
    }
}

/// Partial field set written by a single `upsert`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attended: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homework_done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_cancelled: Option<bool>,
}

impl ReportPatch {
    pub fn attended(value: bool) -> Self {
        Self {
            attended: Some(value),
            ..Self::default()
        }
    }

    pub fn paid(value: bool) -> Self {
        Self {
            paid: Some(value),
            ..Self::default()
        }
    }

    pub fn homework_done(value: bool) -> Self {
        Self {
            homework_done: Some(value),
            ..Self::default()
        }
    }

    pub fn student_note(value: impl Into<String>) -> Self {
        Self {
            student_note: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn parent_note(value: impl Into<String>) -> Self {
        Self {
            parent_note: Some(value.into()),
            ..Self::default()
        }
    }

    /// The record written for every student when a group lesson was not held.
    pub fn lesson_not_held() -> Self {
        Self {
            attended: Some(false),
            lesson_cancelled: Some(true),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch; returns whether any field actually changed.
    pub fn merge_into(&self, record: &mut ReportRecord) -> bool {
        let mut changed = false;
        changed |= merge_field(&mut record.attended, &self.attended);
        changed |= merge_field(&mut record.paid, &self.paid);
        changed |= merge_field(&mut record.homework_done, &self.homework_done);
        changed |= merge_field(&mut record.student_note, &self.student_note);
        changed |= merge_field(&mut record.parent_note, &self.parent_note);
        if let Some(cancelled) = self.lesson_cancelled {
            if record.lesson_cancelled != cancelled {
                record.lesson_cancelled = cancelled;
                changed = true;
            }
        }
        changed
    }
}

fn merge_field<T: Clone + PartialEq>(slot: &mut Option<T>, value: &Option<T>) -> bool {
    match value {
        Some(v) if slot.as_ref() != Some(v) => {
            *slot = Some(v.clone());
            true
        }
        _ => false,
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    Individual,
    Group,
}

/// Where a session is waiting. `DONE` is never stored: reaching it clears the
/// session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewState {
    AwaitGroupHeld,
    AwaitAttended,
    AwaitPaid,
    AwaitHomework,
    AwaitStudentNote,
    AwaitParentNote,
}

impl InterviewState {
    pub fn expects(self) -> AnswerKind {
        match self {
            Self::AwaitStudentNote | Self::AwaitParentNote => AnswerKind::Text,
            _ => AnswerKind::Choice,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitGroupHeld => "AWAIT_GROUP_HELD",
            Self::AwaitAttended => "AWAIT_ATTENDED",
            Self::AwaitPaid => "AWAIT_PAID",
            Self::AwaitHomework => "AWAIT_HOMEWORK",
            Self::AwaitStudentNote => "AWAIT_STUDENT_NOTE",
            Self::AwaitParentNote => "AWAIT_PARENT_NOTE",
        }
    }
}

impl std::fmt::Display for InterviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (lesson, student) pair a session will visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportTarget {
    pub lesson_id: LessonId,
    pub student_id: StudentId,
    pub full_name: String,
}

/// Answers for the current student that drive prompt wording.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scratch {
    #[serde(default)]
    pub attended: Option<bool>,
}

/// Durable continuation of one conversation's report interview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub conversation_id: String,
    pub flow: FlowKind,
    pub lesson_id: LessonId,
    pub lesson_date: Option<NaiveDate>,
    /// Students to visit, in order. Individual flows hold exactly one.
    pub targets: Vec<ReportTarget>,
    pub current_index: usize,
    pub state: InterviewState,
    #[serde(default)]
    pub scratch: Scratch,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn current_target(&self) -> Option<&ReportTarget> {
        self.targets.get(self.current_index)
    }

    pub fn is_last_target(&self) -> bool {
        self.current_index + 1 >= self.targets.len()
    }
}

// ============================================================================
// Engine I/O
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKind {
    Choice,
    Text,
}

/// One inbound answer from the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Input {
    /// A keyboard button / callback choice.
    Choice(bool),
    /// A free-form text message.
    Text(String),
}

impl Input {
    /// Parse a callback token such as `yes` or `0`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Some(Self::Choice(true)),
            "no" | "false" | "0" => Some(Self::Choice(false)),
            _ => None,
        }
    }
}

/// A question the transport should render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prompt {
    pub state: InterviewState,
    pub student: Option<ReportTarget>,
    pub text: String,
    pub expects: AnswerKind,
    /// The previous answer was rejected and the question is asked again.
    #[serde(default)]
    pub reprompt: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EngineOutcome {
    Prompt(Prompt),
    StudentAdvanced {
        prior_student_id: StudentId,
        next: Prompt,
    },
    Completed {
        reports: Vec<ReportRecord>,
        failed_deliveries: Vec<StudentId>,
    },
}

/// Placeholder answer meaning "no note".
pub const NO_NOTE_PLACEHOLDER: &str = "-";

/// Longest accepted free-text note, in characters.
pub const MAX_NOTE_CHARS: usize = 2000;

// ============================================================================
// Tests
// ============================================================================
