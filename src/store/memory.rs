// src/store/memory.rs

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    assessment::{QuizAttempt, Submission},
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

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    students: BTreeMap<i64, StudentSummary>,
    courses: BTreeMap<i64, CourseSummary>,
    semesters: BTreeMap<i64, SemesterSummary>,
    lecturers: BTreeSet<(i64, i64, i64)>,
    topics: BTreeMap<i64, Topic>,
    progress: BTreeMap<(i64, i64), TopicProgress>,
    quiz_attempts: Vec<QuizAttempt>,
    submissions: Vec<Submission>,
    masteries: BTreeMap<MasteryKey, CourseMastery>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Mirrors the inner joins of the SQL store: records with dangling references are skipped.
    fn detail(&self, mastery: &CourseMastery) -> Option<MasteryDetail> {
        Some(MasteryDetail {
            mastery: mastery.clone(),
            student: self.students.get(&mastery.student_id)?.clone(),
            course: self.courses.get(&mastery.course_id)?.clone(),
            semester: self.semesters.get(&mastery.semester_id)?.clone(),
        })
    }

    /// Mirrors the foreign keys of the SQL schema.
    fn check_student(&self, student_id: i64) -> Result<(), StoreError> {
        if self.students.contains_key(&student_id) {
            Ok(())
        } else {
            Err(StoreError::InvalidReference(format!(
                "student {} does not exist",
                student_id
            )))
        }
    }

    fn check_offering(&self, course_id: i64, semester_id: i64) -> Result<(), StoreError> {
        if !self.courses.contains_key(&course_id) {
            return Err(StoreError::InvalidReference(format!(
                "course {} does not exist",
                course_id
            )));
        }
        if !self.semesters.contains_key(&semester_id) {
            return Err(StoreError::InvalidReference(format!(
                "semester {} does not exist",
                semester_id
            )));
        }
        Ok(())
    }

    fn order_taken(&self, course_id: i64, semester_id: i64, order_index: i32) -> bool {
        self.topics.values().any(|topic| {
            topic.course_id == course_id
                && topic.semester_id == semester_id
                && topic.order_index == order_index
        })
    }
}

/// Process-local store used by tests and local tooling.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    pub fn add_student(&self, username: &str, full_name: &str) -> Result<i64, StoreError> {
        let mut state = self.state()?;
        let id = state.allocate_id();
        state.students.insert(
            id,
            StudentSummary {
                id,
                username: username.to_owned(),
                full_name: full_name.to_owned(),
            },
        );
        Ok(id)
    }

    pub fn add_course(&self, code: &str, title: &str) -> Result<i64, StoreError> {
        let mut state = self.state()?;
        let id = state.allocate_id();
        state.courses.insert(
            id,
            CourseSummary {
                id,
                code: code.to_owned(),
                title: title.to_owned(),
            },
        );
        Ok(id)
    }

    pub fn add_semester(&self, name: &str) -> Result<i64, StoreError> {
        let mut state = self.state()?;
        let id = state.allocate_id();
        state.semesters.insert(
            id,
            SemesterSummary {
                id,
                name: name.to_owned(),
            },
        );
        Ok(id)
    }

    pub fn assign_lecturer(
        &self,
        lecturer_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<(), StoreError> {
        self.state()?
            .lecturers
            .insert((lecturer_id, course_id, semester_id));
        Ok(())
    }

    pub fn add_quiz_attempt(&self, attempt: QuizAttempt) -> Result<(), StoreError> {
        self.state()?.quiz_attempts.push(attempt);
        Ok(())
    }

    pub fn add_submission(&self, submission: Submission) -> Result<(), StoreError> {
        self.state()?.submissions.push(submission);
        Ok(())
    }
}

#[async_trait]
impl TopicRepository for InMemoryStore {
    async fn list_topics(
        &self,
        course_id: i64,
        semester_id: i64,
        include_inactive: bool,
    ) -> Result<Vec<Topic>, StoreError> {
        let state = self.state()?;
        let mut topics: Vec<Topic> = state
            .topics
            .values()
            .filter(|t| t.course_id == course_id && t.semester_id == semester_id)
            .filter(|t| include_inactive || t.is_active)
            .cloned()
            .collect();
        topics.sort_by_key(|t| (t.order_index, t.id));
        Ok(topics)
    }

    async fn find_topic(&self, topic_id: i64) -> Result<Option<Topic>, StoreError> {
        Ok(self.state()?.topics.get(&topic_id).cloned())
    }

    async fn max_order_index(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Option<i32>, StoreError> {
        Ok(self
            .state()?
            .topics
            .values()
            .filter(|t| t.course_id == course_id && t.semester_id == semester_id)
            .map(|t| t.order_index)
            .max())
    }

    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic, StoreError> {
        let mut state = self.state()?;
        state.check_offering(topic.course_id, topic.semester_id)?;
        if state.order_taken(topic.course_id, topic.semester_id, topic.order_index) {
            return Err(StoreError::UniqueViolation(format!(
                "order index {} is already used in this course offering",
                topic.order_index
            )));
        }

        let id = state.allocate_id();
        let now = Utc::now();
        let created = Topic {
            id,
            course_id: topic.course_id,
            semester_id: topic.semester_id,
            title: topic.title.clone(),
            description: topic.description.clone(),
            order_index: topic.order_index,
            duration_hours: topic.duration_hours,
            difficulty: topic.difficulty,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.topics.insert(id, created.clone());
        Ok(created)
    }

    async fn update_topic(
        &self,
        topic_id: i64,
        changes: &UpdateTopicRequest,
    ) -> Result<Option<Topic>, StoreError> {
        let mut state = self.state()?;
        let Some(topic) = state.topics.get_mut(&topic_id) else {
            return Ok(None);
        };

        if let Some(title) = &changes.title {
            topic.title = title.clone();
        }
        if let Some(description) = &changes.description {
            topic.description = Some(description.clone());
        }
        if let Some(duration_hours) = changes.duration_hours {
            topic.duration_hours = duration_hours;
        }
        if let Some(difficulty) = changes.difficulty {
            topic.difficulty = difficulty;
        }
        if let Some(is_active) = changes.is_active {
            topic.is_active = is_active;
        }
        topic.updated_at = Utc::now();

        Ok(Some(topic.clone()))
    }

    async fn apply_topic_order(
        &self,
        course_id: i64,
        semester_id: i64,
        ordered_ids: &[i64],
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        // All-or-nothing: check every id before touching any row.
        let all_owned = ordered_ids.iter().all(|id| {
            state
                .topics
                .get(id)
                .is_some_and(|t| t.course_id == course_id && t.semester_id == semester_id)
        });
        if !all_owned {
            return Err(StoreError::InvalidReference(
                "reorder referenced a topic outside the course offering".to_owned(),
            ));
        }

        let now = Utc::now();
        for (order_index, id) in (1..).zip(ordered_ids) {
            if let Some(topic) = state.topics.get_mut(id) {
                topic.order_index = order_index;
                topic.updated_at = now;
            }
        }
        Ok(())
    }

    async fn count_topic_progress(&self, topic_id: i64) -> Result<i64, StoreError> {
        let count = self
            .state()?
            .progress
            .values()
            .filter(|p| p.topic_id == topic_id)
            .count();
        i64::try_from(count).map_err(|e| StoreError::CorruptRow(e.to_string()))
    }

    async fn deactivate_topic(&self, topic_id: i64) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        Ok(match state.topics.get_mut(&topic_id) {
            Some(topic) => {
                topic.is_active = false;
                topic.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete_topic(&self, topic_id: i64) -> Result<bool, StoreError> {
        Ok(self.state()?.topics.remove(&topic_id).is_some())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryStore {
    async fn find_progress(
        &self,
        student_id: i64,
        topic_ids: &[i64],
    ) -> Result<Vec<TopicProgress>, StoreError> {
        let wanted: BTreeSet<i64> = topic_ids.iter().copied().collect();
        let mut records: Vec<TopicProgress> = self
            .state()?
            .progress
            .values()
            .filter(|p| p.student_id == student_id && wanted.contains(&p.topic_id))
            .cloned()
            .collect();
        records.sort_by_key(|p| p.topic_id);
        Ok(records)
    }

    async fn find_progress_entry(
        &self,
        student_id: i64,
        topic_id: i64,
    ) -> Result<Option<TopicProgress>, StoreError> {
        Ok(self.state()?.progress.get(&(student_id, topic_id)).cloned())
    }

    async fn upsert_progress(&self, write: &ProgressWrite) -> Result<TopicProgress, StoreError> {
        let mut state = self.state()?;
        state.check_student(write.student_id)?;
        if !state.topics.contains_key(&write.topic_id) {
            return Err(StoreError::InvalidReference(format!(
                "topic {} does not exist",
                write.topic_id
            )));
        }
        let key = (write.student_id, write.topic_id);
        let existing_id = state.progress.get(&key).map(|p| p.id);
        let id = match existing_id {
            Some(id) => id,
            None => state.allocate_id(),
        };
        let record = TopicProgress {
            id,
            student_id: write.student_id,
            topic_id: write.topic_id,
            is_completed: write.is_completed,
            completed_at: write.completed_at,
            mastery_level: write.mastery_level,
            time_spent_minutes: write.time_spent_minutes,
            assessment_result: write.assessment_result.clone(),
            updated_at: Utc::now(),
        };
        state.progress.insert(key, record.clone());
        Ok(record)
    }
}

#[async_trait]
impl AssessmentRepository for InMemoryStore {
    async fn quiz_scores(
        &self,
        student_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<Option<f64>>, StoreError> {
        Ok(self
            .state()?
            .quiz_attempts
            .iter()
            .filter(|a| {
                a.student_id == student_id
                    && a.course_id == course_id
                    && a.semester_id == semester_id
            })
            .map(|a| a.score)
            .collect())
    }

    async fn assignment_marks(
        &self,
        student_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<Option<f64>>, StoreError> {
        Ok(self
            .state()?
            .submissions
            .iter()
            .filter(|s| {
                s.student_id == student_id
                    && s.course_id == course_id
                    && s.semester_id == semester_id
                    && s.is_assignment()
            })
            .map(|s| s.marks)
            .collect())
    }
}

#[async_trait]
impl MasteryRepository for InMemoryStore {
    async fn upsert_mastery(
        &self,
        key: MasteryKey,
        values: &MasteryValues,
        updated_at: DateTime<Utc>,
    ) -> Result<CourseMastery, StoreError> {
        let mut state = self.state()?;
        state.check_student(key.student_id)?;
        state.check_offering(key.course_id, key.semester_id)?;
        let existing_id = state.masteries.get(&key).map(|m| m.id);
        let id = match existing_id {
            Some(id) => id,
            None => state.allocate_id(),
        };
        let record = CourseMastery {
            id,
            student_id: key.student_id,
            course_id: key.course_id,
            semester_id: key.semester_id,
            mastery_level: values.mastery_level,
            quiz_average: values.quiz_average,
            assignment_average: values.assignment_average,
            topic_completion_percentage: values.topic_completion_percentage,
            total_topics_completed: values.total_topics_completed,
            total_topics: values.total_topics,
            last_updated: updated_at,
        };
        state.masteries.insert(key, record.clone());
        Ok(record)
    }

    async fn list_mastery_records(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<CourseMastery>, StoreError> {
        let mut records: Vec<CourseMastery> = self
            .state()?
            .masteries
            .values()
            .filter(|m| m.course_id == course_id && m.semester_id == semester_id)
            .cloned()
            .collect();
        records.sort_by_key(|m| m.student_id);
        Ok(records)
    }

    async fn find_mastery_detail(
        &self,
        key: MasteryKey,
    ) -> Result<Option<MasteryDetail>, StoreError> {
        let state = self.state()?;
        Ok(state.masteries.get(&key).and_then(|m| state.detail(m)))
    }

    async fn list_cohort_details(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<MasteryDetail>, StoreError> {
        let state = self.state()?;
        let mut details: Vec<MasteryDetail> = state
            .masteries
            .values()
            .filter(|m| m.course_id == course_id && m.semester_id == semester_id)
            .filter_map(|m| state.detail(m))
            .collect();
        details.sort_by(|a, b| {
            b.mastery
                .mastery_level
                .total_cmp(&a.mastery.mastery_level)
                .then(a.mastery.student_id.cmp(&b.mastery.student_id))
        });
        Ok(details)
    }

    async fn list_student_details(
        &self,
        student_id: i64,
        semester_id: Option<i64>,
    ) -> Result<Vec<MasteryDetail>, StoreError> {
        let state = self.state()?;
        let mut details: Vec<MasteryDetail> = state
            .masteries
            .values()
            .filter(|m| m.student_id == student_id)
            .filter(|m| semester_id.is_none_or(|semester| m.semester_id == semester))
            .filter_map(|m| state.detail(m))
            .collect();
        details.sort_by(|a, b| {
            b.mastery
                .last_updated
                .cmp(&a.mastery.last_updated)
                .then(b.mastery.id.cmp(&a.mastery.id))
        });
        Ok(details)
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryStore {
    async fn is_lecturer_assigned(
        &self,
        lecturer_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<bool, StoreError> {
        Ok(self
            .state()?
            .lecturers
            .contains(&(lecturer_id, course_id, semester_id)))
    }
}
