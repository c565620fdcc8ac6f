//! Delivery of finished reports to the people who read them.
//!
//! The engine only needs the call contract: one `deliver` per finished
//! (lesson, student) pair, success or failure. Failures are never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shared_types::{LessonId, ReportRecord, StudentId};

use crate::store::{ReportStore, StoreError};

#[derive(Debug, thiserror::Error, Clone)]
pub enum DispatchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Delivery rejected with status {0}")]
    Rejected(u16),

    #[error("No report for lesson {lesson_id}, student {student_id}")]
    MissingReport {
        lesson_id: LessonId,
        student_id: StudentId,
    },

    #[error("Report lookup failed: {0}")]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync + 'static {
    /// Deliver the committed report for one student.
    ///
    /// Delivering an unchanged record again must be harmless.
    async fn deliver(&self, lesson_id: LessonId, student_id: StudentId)
        -> Result<(), DispatchError>;
}

#[derive(serde::Serialize)]
struct DeliveryPayload<'a> {
    lesson_id: LessonId,
    student_id: StudentId,
    report: &'a ReportRecord,
}

/// POSTs each finished report as JSON to a configured webhook.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
    reports: Arc<dyn ReportStore>,
}

impl WebhookDispatcher {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        reports: Arc<dyn ReportStore>,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            reports,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn deliver(
        &self,
        lesson_id: LessonId,
        student_id: StudentId,
    ) -> Result<(), DispatchError> {
        let report = self
            .reports
            .get(lesson_id, student_id)
            .await?
            .ok_or(DispatchError::MissingReport {
                lesson_id,
                student_id,
            })?;

        let response = self
            .client
            .post(&self.url)
            .json(&DeliveryPayload {
                lesson_id,
                student_id,
                report: &report,
            })
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected(status.as_u16()));
        }

        tracing::info!(
            lesson_id = %lesson_id,
            student_id = %student_id,
            "report delivered"
        );
        Ok(())
    }
}

/// Used when no webhook is configured: records the delivery in the log.
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn deliver(
        &self,
        lesson_id: LessonId,
        student_id: StudentId,
    ) -> Result<(), DispatchError> {
        tracing::info!(
            lesson_id = %lesson_id,
            student_id = %student_id,
            "report ready (no notification webhook configured)"
        );
        Ok(())
    }
}
