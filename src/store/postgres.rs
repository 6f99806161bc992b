// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::{
    assessment::ASSIGNMENT_KIND,
    course::{CourseSummary, SemesterSummary},
    mastery::{CourseMastery, MasteryDetail, MasteryKey, MasteryValues},
    progress::{ProgressWrite, TopicProgress},
    topic::{NewTopic, Topic, UpdateTopicRequest},
    user::StudentSummary,
};

use super::{
    AssessmentRepository, DirectoryRepository, MasteryRepository, ProgressRepository, StoreError,
    TopicRepository,
};

const TOPIC_COLUMNS: &str = "id, course_id, semester_id, title, description, order_index, \
     duration_hours, difficulty, is_active, created_at, updated_at";

const PROGRESS_COLUMNS: &str = "id, student_id, topic_id, is_completed, completed_at, \
     mastery_level, time_spent_minutes, assessment_result, updated_at";

const MASTERY_COLUMNS: &str = "id, student_id, course_id, semester_id, mastery_level, \
     quiz_average, assignment_average, topic_completion_percentage, total_topics_completed, \
     total_topics, last_updated";

const MASTERY_DETAIL_SELECT: &str = r#"
    SELECT
        m.id, m.student_id, m.course_id, m.semester_id,
        m.mastery_level, m.quiz_average, m.assignment_average,
        m.topic_completion_percentage, m.total_topics_completed, m.total_topics,
        m.last_updated,
        u.username AS student_username,
        u.full_name AS student_full_name,
        c.code AS course_code,
        c.title AS course_title,
        s.name AS semester_name
    FROM course_mastery m
    JOIN users u ON u.id = m.student_id
    JOIN courses c ON c.id = m.course_id
    JOIN semesters s ON s.id = m.semester_id
"#;

/// PostgreSQL error code for unique violations.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Helper struct for reading topic rows; `difficulty` is stored as TEXT.
#[derive(sqlx::FromRow)]
struct TopicRow {
    id: i64,
    course_id: i64,
    semester_id: i64,
    title: String,
    description: Option<String>,
    order_index: i32,
    duration_hours: f64,
    difficulty: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TopicRow> for Topic {
    type Error = StoreError;

    fn try_from(row: TopicRow) -> Result<Self, Self::Error> {
        let difficulty = row.difficulty.parse().map_err(StoreError::CorruptRow)?;
        Ok(Topic {
            id: row.id,
            course_id: row.course_id,
            semester_id: row.semester_id,
            title: row.title,
            description: row.description,
            order_index: row.order_index,
            duration_hours: row.duration_hours,
            difficulty,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Mastery row joined with its student, course and semester.
#[derive(sqlx::FromRow)]
struct MasteryDetailRow {
    #[sqlx(flatten)]
    mastery: CourseMastery,
    student_username: String,
    student_full_name: String,
    course_code: String,
    course_title: String,
    semester_name: String,
}

impl From<MasteryDetailRow> for MasteryDetail {
    fn from(row: MasteryDetailRow) -> Self {
        let student = StudentSummary {
            id: row.mastery.student_id,
            username: row.student_username,
            full_name: row.student_full_name,
        };
        let course = CourseSummary {
            id: row.mastery.course_id,
            code: row.course_code,
            title: row.course_title,
        };
        let semester = SemesterSummary {
            id: row.mastery.semester_id,
            name: row.semester_name,
        };
        MasteryDetail {
            mastery: row.mastery,
            student,
            course,
            semester,
        }
    }
}

/// Maps constraint violations to their own variants so callers can answer 409 or 400.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match code.as_deref() {
        Some(UNIQUE_VIOLATION) => StoreError::UniqueViolation(err.to_string()),
        Some(FOREIGN_KEY_VIOLATION) => StoreError::InvalidReference(err.to_string()),
        _ => {
            tracing::error!("Database query failed: {:?}", err);
            StoreError::Database(err)
        }
    }
}

fn into_topics(rows: Vec<TopicRow>) -> Result<Vec<Topic>, StoreError> {
    rows.into_iter().map(Topic::try_from).collect()
}

/// `sqlx`-backed store over the schema in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TopicRepository for PgStore {
    async fn list_topics(
        &self,
        course_id: i64,
        semester_id: i64,
        include_inactive: bool,
    ) -> Result<Vec<Topic>, StoreError> {
        let sql = format!(
            "SELECT {TOPIC_COLUMNS} FROM topics \
             WHERE course_id = $1 AND semester_id = $2 AND ($3 OR is_active) \
             ORDER BY order_index ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, TopicRow>(&sql)
            .bind(course_id)
            .bind(semester_id)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        into_topics(rows)
    }

    async fn find_topic(&self, topic_id: i64) -> Result<Option<Topic>, StoreError> {
        let sql = format!("SELECT {TOPIC_COLUMNS} FROM topics WHERE id = $1");
        sqlx::query_as::<_, TopicRow>(&sql)
            .bind(topic_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(Topic::try_from)
            .transpose()
    }

    async fn max_order_index(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Option<i32>, StoreError> {
        sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(order_index) FROM topics WHERE course_id = $1 AND semester_id = $2",
        )
        .bind(course_id)
        .bind(semester_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO topics
            (course_id, semester_id, title, description, order_index, duration_hours, difficulty)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TOPIC_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TopicRow>(&sql)
            .bind(topic.course_id)
            .bind(topic.semester_id)
            .bind(&topic.title)
            .bind(&topic.description)
            .bind(topic.order_index)
            .bind(topic.duration_hours)
            .bind(topic.difficulty.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Topic::try_from(row)
    }

    async fn update_topic(
        &self,
        topic_id: i64,
        changes: &UpdateTopicRequest,
    ) -> Result<Option<Topic>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE topics SET updated_at = NOW()");

        if let Some(title) = &changes.title {
            builder.push(", title = ");
            builder.push_bind(title.clone());
        }

        if let Some(description) = &changes.description {
            builder.push(", description = ");
            builder.push_bind(description.clone());
        }

        if let Some(duration_hours) = changes.duration_hours {
            builder.push(", duration_hours = ");
            builder.push_bind(duration_hours);
        }

        if let Some(difficulty) = changes.difficulty {
            builder.push(", difficulty = ");
            builder.push_bind(difficulty.as_str());
        }

        if let Some(is_active) = changes.is_active {
            builder.push(", is_active = ");
            builder.push_bind(is_active);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(topic_id);
        builder.push(" RETURNING ");
        builder.push(TOPIC_COLUMNS);

        builder
            .build_query_as::<TopicRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?
            .map(Topic::try_from)
            .transpose()
    }

    async fn apply_topic_order(
        &self,
        course_id: i64,
        semester_id: i64,
        ordered_ids: &[i64],
    ) -> Result<(), StoreError> {
        // The order index constraint is deferred, so intermediate duplicates are fine.
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        for (position, topic_id) in ordered_ids.iter().enumerate() {
            let order_index = i32::try_from(position + 1)
                .map_err(|e| StoreError::CorruptRow(e.to_string()))?;

            sqlx::query(
                r#"
                UPDATE topics SET order_index = $1, updated_at = NOW()
                WHERE id = $2 AND course_id = $3 AND semester_id = $4
                "#,
            )
            .bind(order_index)
            .bind(topic_id)
            .bind(course_id)
            .bind(semester_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)
    }

    async fn count_topic_progress(&self, topic_id: i64) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM topic_progress WHERE topic_id = $1")
            .bind(topic_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn deactivate_topic(&self, topic_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE topics SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(topic_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_topic(&self, topic_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(topic_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProgressRepository for PgStore {
    async fn find_progress(
        &self,
        student_id: i64,
        topic_ids: &[i64],
    ) -> Result<Vec<TopicProgress>, StoreError> {
        if topic_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM topic_progress \
             WHERE student_id = $1 AND topic_id = ANY($2) \
             ORDER BY topic_id ASC"
        );
        sqlx::query_as::<_, TopicProgress>(&sql)
            .bind(student_id)
            .bind(topic_ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_progress_entry(
        &self,
        student_id: i64,
        topic_id: i64,
    ) -> Result<Option<TopicProgress>, StoreError> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM topic_progress WHERE student_id = $1 AND topic_id = $2"
        );
        sqlx::query_as::<_, TopicProgress>(&sql)
            .bind(student_id)
            .bind(topic_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn upsert_progress(&self, write: &ProgressWrite) -> Result<TopicProgress, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO topic_progress
            (student_id, topic_id, is_completed, completed_at, mastery_level,
             time_spent_minutes, assessment_result, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (student_id, topic_id) DO UPDATE SET
                is_completed = EXCLUDED.is_completed,
                completed_at = EXCLUDED.completed_at,
                mastery_level = EXCLUDED.mastery_level,
                time_spent_minutes = EXCLUDED.time_spent_minutes,
                assessment_result = EXCLUDED.assessment_result,
                updated_at = NOW()
            RETURNING {PROGRESS_COLUMNS}
            "#
        );
        sqlx::query_as::<_, TopicProgress>(&sql)
            .bind(write.student_id)
            .bind(write.topic_id)
            .bind(write.is_completed)
            .bind(write.completed_at)
            .bind(write.mastery_level)
            .bind(write.time_spent_minutes)
            .bind(&write.assessment_result)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl AssessmentRepository for PgStore {
    async fn quiz_scores(
        &self,
        student_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<Option<f64>>, StoreError> {
        sqlx::query_scalar::<_, Option<f64>>(
            r#"
            SELECT a.score
            FROM quiz_attempts a
            JOIN quizzes q ON q.id = a.quiz_id
            WHERE a.student_id = $1 AND q.course_id = $2 AND q.semester_id = $3
            ORDER BY a.id ASC
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .bind(semester_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn assignment_marks(
        &self,
        student_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<Option<f64>>, StoreError> {
        sqlx::query_scalar::<_, Option<f64>>(
            r#"
            SELECT s.marks
            FROM submissions s
            JOIN assessments a ON a.id = s.assessment_id
            WHERE s.student_id = $1 AND a.course_id = $2 AND a.semester_id = $3
              AND a.kind = $4
            ORDER BY s.id ASC
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .bind(semester_id)
        .bind(ASSIGNMENT_KIND)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)
    }
}

#[async_trait]
impl MasteryRepository for PgStore {
    async fn upsert_mastery(
        &self,
        key: MasteryKey,
        values: &MasteryValues,
        updated_at: DateTime<Utc>,
    ) -> Result<CourseMastery, StoreError> {
        // Full replace: every computed column is overwritten on conflict.
        let sql = format!(
            r#"
            INSERT INTO course_mastery
            (student_id, course_id, semester_id, mastery_level, quiz_average,
             assignment_average, topic_completion_percentage, total_topics_completed,
             total_topics, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (student_id, course_id, semester_id) DO UPDATE SET
                mastery_level = EXCLUDED.mastery_level,
                quiz_average = EXCLUDED.quiz_average,
                assignment_average = EXCLUDED.assignment_average,
                topic_completion_percentage = EXCLUDED.topic_completion_percentage,
                total_topics_completed = EXCLUDED.total_topics_completed,
                total_topics = EXCLUDED.total_topics,
                last_updated = EXCLUDED.last_updated
            RETURNING {MASTERY_COLUMNS}
            "#
        );
        sqlx::query_as::<_, CourseMastery>(&sql)
            .bind(key.student_id)
            .bind(key.course_id)
            .bind(key.semester_id)
            .bind(values.mastery_level)
            .bind(values.quiz_average)
            .bind(values.assignment_average)
            .bind(values.topic_completion_percentage)
            .bind(values.total_topics_completed)
            .bind(values.total_topics)
            .bind(updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn list_mastery_records(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<CourseMastery>, StoreError> {
        let sql = format!(
            "SELECT {MASTERY_COLUMNS} FROM course_mastery \
             WHERE course_id = $1 AND semester_id = $2 ORDER BY student_id ASC"
        );
        sqlx::query_as::<_, CourseMastery>(&sql)
            .bind(course_id)
            .bind(semester_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_mastery_detail(
        &self,
        key: MasteryKey,
    ) -> Result<Option<MasteryDetail>, StoreError> {
        let sql = format!(
            "{MASTERY_DETAIL_SELECT} \
             WHERE m.student_id = $1 AND m.course_id = $2 AND m.semester_id = $3"
        );
        let row = sqlx::query_as::<_, MasteryDetailRow>(&sql)
            .bind(key.student_id)
            .bind(key.course_id)
            .bind(key.semester_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(row.map(MasteryDetail::from))
    }

    async fn list_cohort_details(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<MasteryDetail>, StoreError> {
        let sql = format!(
            "{MASTERY_DETAIL_SELECT} \
             WHERE m.course_id = $1 AND m.semester_id = $2 \
             ORDER BY m.mastery_level DESC, m.student_id ASC"
        );
        let rows = sqlx::query_as::<_, MasteryDetailRow>(&sql)
            .bind(course_id)
            .bind(semester_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(MasteryDetail::from).collect())
    }

    async fn list_student_details(
        &self,
        student_id: i64,
        semester_id: Option<i64>,
    ) -> Result<Vec<MasteryDetail>, StoreError> {
        let sql = format!(
            "{MASTERY_DETAIL_SELECT} \
             WHERE m.student_id = $1 AND ($2::BIGINT IS NULL OR m.semester_id = $2) \
             ORDER BY m.last_updated DESC, m.id DESC"
        );
        let rows = sqlx::query_as::<_, MasteryDetailRow>(&sql)
            .bind(student_id)
            .bind(semester_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(MasteryDetail::from).collect())
    }
}

#[async_trait]
impl DirectoryRepository for PgStore {
    async fn is_lecturer_assigned(
        &self,
        lecturer_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM course_lecturers
                WHERE lecturer_id = $1 AND course_id = $2 AND semester_id = $3
            )
            "#,
        )
        .bind(lecturer_id)
        .bind(course_id)
        .bind(semester_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }
}
