//! Interview engine - routes inbound answers to the active flow.
//!
//! Every call is a discrete step: load the session, run the flow handler,
//! commit its report writes, then persist the next session (or clear it and
//! fan out notifications when the flow is done). Nothing is kept in memory
//! between calls.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use shared_types::{
    EngineOutcome, FlowKind, Input, InterviewState, LessonId, Prompt, ReportRecord,
    ReportTarget, Scratch, SessionState, StudentId,
};

use crate::flows::{self, FlowError, Next, PendingWrite};
use crate::notify::NotificationDispatcher;
use crate::prompts;
use crate::store::{LessonKind, LessonLookup, ReportStore, SessionStore, StoreError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error, Clone)]
pub enum EngineError {
    #[error("Lesson {0} not found")]
    LessonNotFound(LessonId),

    #[error("Group lesson {0} has no students")]
    EmptyGroup(LessonId),

    #[error("No active report session for conversation {0}")]
    NoActiveSession(String),

    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Storage read failed: {0}")]
    StorageReadFailed(String),

    #[error("Report session aborted: {0}")]
    SessionAborted(String),
}

fn write_failed(e: StoreError) -> EngineError {
    EngineError::StorageWriteFailed(e.to_string())
}

fn read_failed(e: StoreError) -> EngineError {
    EngineError::StorageReadFailed(e.to_string())
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Clone)]
pub struct Engine {
    reports: Arc<dyn ReportStore>,
    lessons: Arc<dyn LessonLookup>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    sessions: Arc<dyn SessionStore>,
}

impl Engine {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        lessons: Arc<dyn LessonLookup>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            reports,
            lessons,
            dispatcher,
            sessions,
        }
    }

    /// The question a session is currently waiting on.
    pub fn prompt(session: &SessionState) -> Prompt {
        prompts::render(session, false)
    }

    /// Start a report interview for `lesson_id`.
    ///
    /// A session already open for the conversation is replaced.
    pub async fn begin(
        &self,
        conversation_id: &str,
        lesson_id: LessonId,
    ) -> Result<SessionState, EngineError> {
        let roster = self
            .lessons
            .resolve(lesson_id)
            .await
            .map_err(read_failed)?
            .ok_or(EngineError::LessonNotFound(lesson_id))?;

        let targets: Vec<ReportTarget> = roster
            .students
            .into_iter()
            .map(|s| ReportTarget {
                lesson_id,
                student_id: s.student_id,
                full_name: s.full_name,
            })
            .collect();

        let (flow, targets, state) = match roster.kind {
            LessonKind::Individual => {
                let target = targets
                    .into_iter()
                    .next()
                    .ok_or(EngineError::LessonNotFound(lesson_id))?;
                (
                    FlowKind::Individual,
                    vec![target],
                    InterviewState::AwaitAttended,
                )
            }
            LessonKind::Group if targets.is_empty() => {
                return Err(EngineError::EmptyGroup(lesson_id));
            }
            LessonKind::Group => (FlowKind::Group, targets, InterviewState::AwaitGroupHeld),
        };

        match self.sessions.load(conversation_id).await {
            Ok(Some(previous)) => tracing::warn!(
                conversation_id,
                previous_lesson_id = %previous.lesson_id,
                previous_state = %previous.state,
                "replacing unfinished report session"
            ),
            Ok(None) => {}
            // The save below overwrites the row either way.
            Err(e) => tracing::warn!(
                conversation_id,
                error = %e,
                "could not read previous report session before replacing it"
            ),
        }

        let now = Utc::now();
        let session = SessionState {
            conversation_id: conversation_id.to_string(),
            flow,
            lesson_id,
            lesson_date: roster.lesson_date,
            targets,
            current_index: 0,
            state,
            scratch: Scratch::default(),
            started_at: now,
            updated_at: now,
        };

        self.sessions
            .save(conversation_id, &session)
            .await
            .map_err(write_failed)?;

        tracing::info!(
            conversation_id,
            lesson_id = %lesson_id,
            flow = ?session.flow,
            students = session.targets.len(),
            "report session started"
        );
        Ok(session)
    }

    /// Apply one inbound answer to the conversation's session.
    pub async fn handle(
        &self,
        conversation_id: &str,
        input: Input,
    ) -> Result<EngineOutcome, EngineError> {
        let session = self
            .sessions
            .load(conversation_id)
            .await
            .map_err(read_failed)?
            .ok_or_else(|| EngineError::NoActiveSession(conversation_id.to_string()))?;

        let transition = match flows::advance(&session, &input, Utc::now()) {
            Ok(transition) => transition,
            Err(FlowError::Invalid(reason)) => {
                tracing::debug!(
                    conversation_id,
                    state = %session.state,
                    %reason,
                    "answer rejected, asking again"
                );
                return Ok(EngineOutcome::Prompt(prompts::render(&session, true)));
            }
            Err(FlowError::Unrecoverable(reason)) => {
                tracing::error!(
                    conversation_id,
                    state = %session.state,
                    %reason,
                    "report session cannot continue, clearing it"
                );
                self.sessions
                    .clear(conversation_id)
                    .await
                    .map_err(write_failed)?;
                return Err(EngineError::SessionAborted(reason));
            }
        };

        self.commit(&transition.writes).await?;

        match transition.next {
            Next::Continue(next) => {
                self.save(conversation_id, &next).await?;
                Ok(EngineOutcome::Prompt(prompts::render(&next, false)))
            }
            Next::StudentAdvanced { prior, state } => {
                self.save(conversation_id, &state).await?;
                tracing::info!(
                    conversation_id,
                    lesson_id = %state.lesson_id,
                    student_id = %prior,
                    current_index = state.current_index,
                    "student report finished"
                );
                Ok(EngineOutcome::StudentAdvanced {
                    prior_student_id: prior,
                    next: prompts::render(&state, false),
                })
            }
            Next::Done { finalized } => self.finish(conversation_id, &session, finalized).await,
        }
    }

    /// Drop the conversation's session. Committed report fields are kept.
    pub async fn cancel(&self, conversation_id: &str) -> Result<(), EngineError> {
        self.sessions
            .clear(conversation_id)
            .await
            .map_err(write_failed)?;
        tracing::info!(conversation_id, "report session cancelled");
        Ok(())
    }

    /// The conversation's active session, if any.
    pub async fn session(&self, conversation_id: &str) -> Result<Option<SessionState>, EngineError> {
        self.sessions
            .load(conversation_id)
            .await
            .map_err(read_failed)
    }

    async fn commit(&self, writes: &[PendingWrite]) -> Result<(), EngineError> {
        for write in writes {
            self.reports
                .upsert(write.target.lesson_id, write.target.student_id, &write.patch)
                .await
                .map_err(|e| {
                    tracing::error!(
                        lesson_id = %write.target.lesson_id,
                        student_id = %write.target.student_id,
                        error = %e,
                        "report write failed"
                    );
                    write_failed(e)
                })?;
        }
        Ok(())
    }

    async fn save(&self, conversation_id: &str, session: &SessionState) -> Result<(), EngineError> {
        self.sessions
            .save(conversation_id, session)
            .await
            .map_err(write_failed)
    }

    async fn finish(
        &self,
        conversation_id: &str,
        session: &SessionState,
        finalized: Vec<ReportTarget>,
    ) -> Result<EngineOutcome, EngineError> {
        let mut reports = Vec::with_capacity(finalized.len());
        for target in &finalized {
            let record = self
                .reports
                .get(target.lesson_id, target.student_id)
                .await
                .map_err(read_failed)?
                .ok_or_else(|| {
                    EngineError::StorageReadFailed(format!(
                        "report for lesson {}, student {} missing after commit",
                        target.lesson_id, target.student_id
                    ))
                })?;
            reports.push(record);
        }

        self.sessions
            .clear(conversation_id)
            .await
            .map_err(write_failed)?;

        let failed_deliveries = self.fan_out(&reports).await;

        tracing::info!(
            conversation_id,
            lesson_id = %session.lesson_id,
            flow = ?session.flow,
            reports = reports.len(),
            failed = failed_deliveries.len(),
            "report session completed"
        );

        Ok(EngineOutcome::Completed {
            reports,
            failed_deliveries,
        })
    }

    /// One independent delivery per finished record; failures are logged and
    /// returned, never retried.
    async fn fan_out(&self, reports: &[ReportRecord]) -> Vec<StudentId> {
        let deliveries = reports.iter().filter(|r| r.is_final()).map(|record| {
            let dispatcher = Arc::clone(&self.dispatcher);
            let (lesson_id, student_id) = (record.lesson_id, record.student_id);
            async move {
                match dispatcher.deliver(lesson_id, student_id).await {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(
                            lesson_id = %lesson_id,
                            student_id = %student_id,
                            error = %e,
                            "report notification failed"
                        );
                        Some(student_id)
                    }
                }
            }
        });

        join_all(deliveries).await.into_iter().flatten().collect()
    }
}
