use async_trait::async_trait;
use chrono::NaiveDate;
use shared_types::{LessonId, StudentId};
use sqlx::SqlitePool;

use super::{LessonKind, LessonLookup, LessonRoster, RosterStudent, StoreError};

/// Resolves lessons from the roster tables maintained by the CRUD layer.
///
/// Individual lessons point at their student through `lessons.student_id`;
/// group lessons list theirs in `lesson_students`, visited by `position`.
#[derive(Debug, Clone)]
pub struct SqliteLessonLookup {
    pool: SqlitePool,
}

impl SqliteLessonLookup {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn individual_students(
        &self,
        student_id: Option<i64>,
    ) -> Result<Vec<RosterStudent>, StoreError> {
        let Some(student_id) = student_id else {
            return Ok(Vec::new());
        };
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, full_name FROM students WHERE id = ?")
                .bind(student_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.into_iter().map(roster_student).collect())
    }

    async fn group_students(&self, lesson_id: LessonId) -> Result<Vec<RosterStudent>, StoreError> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT s.id, s.full_name
             FROM lesson_students ls
             JOIN students s ON s.id = ls.student_id
             WHERE ls.lesson_id = ?
             ORDER BY ls.position ASC, s.id ASC",
        )
        .bind(lesson_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(roster_student).collect())
    }
}

fn roster_student((id, full_name): (i64, String)) -> RosterStudent {
    RosterStudent {
        student_id: StudentId(id),
        full_name,
    }
}

#[async_trait]
impl LessonLookup for SqliteLessonLookup {
    async fn resolve(&self, lesson_id: LessonId) -> Result<Option<LessonRoster>, StoreError> {
        let row: Option<(String, Option<NaiveDate>, Option<i64>)> =
            sqlx::query_as("SELECT kind, lesson_date, student_id FROM lessons WHERE id = ?")
                .bind(lesson_id.0)
                .fetch_optional(&self.pool)
                .await?;

        let Some((kind, lesson_date, student_id)) = row else {
            return Ok(None);
        };

        let (kind, students) = match kind.as_str() {
            "individual" => (
                LessonKind::Individual,
                self.individual_students(student_id).await?,
            ),
            "group" => (LessonKind::Group, self.group_students(lesson_id).await?),
            other => {
                return Err(StoreError::Corrupt(format!(
                    "lesson {lesson_id} has unknown kind '{other}'"
                )))
            }
        };

        Ok(Some(LessonRoster {
            lesson_id,
            kind,
            students,
            lesson_date,
        }))
    }
}
