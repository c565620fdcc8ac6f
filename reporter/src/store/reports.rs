use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{LessonId, ReportPatch, ReportRecord, StudentId};
use sqlx::{Sqlite, SqlitePool};

use super::{ReportStore, StoreError};

/// SQLite-backed report rows.
///
/// Each upsert runs read-merge-write inside one transaction, so a patch is
/// either fully applied or not at all.
#[derive(Debug, Clone)]
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl SqliteReportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    lesson_id: i64,
    student_id: i64,
    attended: Option<bool>,
    paid: Option<bool>,
    homework_done: Option<bool>,
    student_note: Option<String>,
    parent_note: Option<String>,
    lesson_cancelled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReportRow> for ReportRecord {
    fn from(row: ReportRow) -> Self {
        ReportRecord {
            lesson_id: LessonId(row.lesson_id),
            student_id: StudentId(row.student_id),
            attended: row.attended,
            paid: row.paid,
            homework_done: row.homework_done,
            student_note: row.student_note,
            parent_note: row.parent_note,
            lesson_cancelled: row.lesson_cancelled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_REPORT: &str = "SELECT lesson_id, student_id, attended, paid, homework_done,
        student_note, parent_note, lesson_cancelled, created_at, updated_at
 FROM lesson_reports
 WHERE lesson_id = ? AND student_id = ?";

async fn fetch_report<'e, E>(
    executor: E,
    lesson_id: LessonId,
    student_id: StudentId,
) -> Result<Option<ReportRecord>, StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row: Option<ReportRow> = sqlx::query_as(SELECT_REPORT)
        .bind(lesson_id.0)
        .bind(student_id.0)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(ReportRecord::from))
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn upsert(
        &self,
        lesson_id: LessonId,
        student_id: StudentId,
        patch: &ReportPatch,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut record = fetch_report(&mut *tx, lesson_id, student_id)
            .await?
            .unwrap_or_else(|| ReportRecord::empty(lesson_id, student_id, now));

        // Nothing to write; dropping the transaction rolls it back.
        if !patch.merge_into(&mut record) {
            return Ok(false);
        }
        record.updated_at = now;

        sqlx::query(
            "INSERT INTO lesson_reports (
                lesson_id, student_id, attended, paid, homework_done,
                student_note, parent_note, lesson_cancelled, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(lesson_id, student_id) DO UPDATE SET
                attended = excluded.attended,
                paid = excluded.paid,
                homework_done = excluded.homework_done,
                student_note = excluded.student_note,
                parent_note = excluded.parent_note,
                lesson_cancelled = excluded.lesson_cancelled,
                updated_at = excluded.updated_at",
        )
        .bind(record.lesson_id.0)
        .bind(record.student_id.0)
        .bind(record.attended)
        .bind(record.paid)
        .bind(record.homework_done)
        .bind(&record.student_note)
        .bind(&record.parent_note)
        .bind(record.lesson_cancelled)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            lesson_id = %lesson_id,
            student_id = %student_id,
            complete = record.is_complete(),
            "report row written"
        );
        Ok(true)
    }

    async fn get(
        &self,
        lesson_id: LessonId,
        student_id: StudentId,
    ) -> Result<Option<ReportRecord>, StoreError> {
        fetch_report(&self.pool, lesson_id, student_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteReportStore {
        let pool = crate::db::connect_in_memory().await.unwrap();
        SqliteReportStore::new(pool)
    }

    #[tokio::test]
    async fn test_first_answer_creates_row() {
        let store = store().await;
        assert!(store.get(LessonId(1), StudentId(2)).await.unwrap().is_none());

        let changed = store
            .upsert(LessonId(1), StudentId(2), &ReportPatch::attended(true))
            .await
            .unwrap();
        assert!(changed);

        let record = store.get(LessonId(1), StudentId(2)).await.unwrap().unwrap();
        assert_eq!(record.attended, Some(true));
        assert_eq!(record.paid, None);
        assert!(!record.lesson_cancelled);
    }

    #[tokio::test]
    async fn test_repeated_upsert_leaves_row_unchanged() {
        let store = store().await;
        let patch = ReportPatch::paid(false);

        assert!(store.upsert(LessonId(1), StudentId(2), &patch).await.unwrap());
        let before = store.get(LessonId(1), StudentId(2)).await.unwrap().unwrap();

        assert!(!store.upsert(LessonId(1), StudentId(2), &patch).await.unwrap());
        let after = store.get(LessonId(1), StudentId(2)).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_empty_patch_does_not_create_row() {
        let store = store().await;
        let changed = store
            .upsert(LessonId(9), StudentId(9), &ReportPatch::default())
            .await
            .unwrap();
        assert!(!changed);
        assert!(store.get(LessonId(9), StudentId(9)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_updates_accumulate() {
        let store = store().await;
        let (lesson, student) = (LessonId(4), StudentId(5));
        for patch in [
            ReportPatch::attended(true),
            ReportPatch::paid(true),
            ReportPatch::homework_done(false),
            ReportPatch::student_note(""),
            ReportPatch::parent_note("keep it up"),
        ] {
            store.upsert(lesson, student, &patch).await.unwrap();
        }

        let record = store.get(lesson, student).await.unwrap().unwrap();
        assert!(record.is_complete());
        assert_eq!(record.student_note.as_deref(), Some(""));
        assert_eq!(record.parent_note.as_deref(), Some("keep it up"));
    }
}
