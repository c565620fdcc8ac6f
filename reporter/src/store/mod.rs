//! Collaborator contracts the interview engine is written against.
//!
//! Every trait is async and object safe so the engine can hold its
//! collaborators as `Arc<dyn …>` and tests can swap in doubles.

mod lessons;
mod reports;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared_types::{LessonId, ReportPatch, ReportRecord, SessionState, StudentId};

pub use lessons::SqliteLessonLookup;
pub use reports::SqliteReportStore;

/// Errors raised by any storage-backed collaborator.
#[derive(Debug, thiserror::Error, Clone)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Durable per-(lesson, student) report rows.
#[async_trait]
pub trait ReportStore: Send + Sync + 'static {
    /// Merge `patch` into the row, creating it if needed.
    ///
    /// Returns `true` when the row was created or changed. Writing a value the
    /// row already holds returns `false` and leaves the row untouched.
    async fn upsert(
        &self,
        lesson_id: LessonId,
        student_id: StudentId,
        patch: &ReportPatch,
    ) -> Result<bool, StoreError>;

    async fn get(
        &self,
        lesson_id: LessonId,
        student_id: StudentId,
    ) -> Result<Option<ReportRecord>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonKind {
    Individual,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterStudent {
    pub student_id: StudentId,
    pub full_name: String,
}

/// A lesson resolved to the students it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRoster {
    pub lesson_id: LessonId,
    pub kind: LessonKind,
    pub students: Vec<RosterStudent>,
    pub lesson_date: Option<NaiveDate>,
}

/// Read-only lesson → student resolution.
#[async_trait]
pub trait LessonLookup: Send + Sync + 'static {
    /// `Ok(None)` when the lesson does not exist.
    async fn resolve(&self, lesson_id: LessonId) -> Result<Option<LessonRoster>, StoreError>;
}

/// Keyed storage of the engine's continuation state.
///
/// The engine holds nothing in memory between inbound events, so a session
/// must survive a process restart once `save` returns.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn load(&self, conversation_id: &str) -> Result<Option<SessionState>, StoreError>;

    async fn save(&self, conversation_id: &str, session: &SessionState) -> Result<(), StoreError>;

    /// Remove the session. Clearing a missing session is not an error.
    async fn clear(&self, conversation_id: &str) -> Result<(), StoreError>;
}
