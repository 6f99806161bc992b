// src/services/mastery.rs

//! Mastery calculator: rolls topic progress, quiz attempts and assignment
//! submissions into one record per (student, course, semester), and
//! summarises a cohort's records into statistics.

use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        mastery::{CourseMastery, MasteryDistribution, MasteryKey, MasteryStatistics, MasteryValues},
        progress::TopicProgress,
    },
    store::LmsStore,
};

/// Arithmetic mean, or 0 for an empty input.
fn mean_or_zero(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0_f64, 0_u32), |(sum, count), value| (sum + value, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

/// Mean of assessment scores where an unscored attempt counts as 0.
fn score_average(scores: &[Option<f64>]) -> f64 {
    mean_or_zero(scores.iter().map(|score| score.unwrap_or(0.0)))
}

/// Computes the rollup for one student from already-fetched rows.
///
/// `progress` must only contain records for topics of the offering, so the
/// completed count never exceeds `total_topics`.
pub fn compute_mastery(
    total_topics: usize,
    progress: &[TopicProgress],
    quiz_scores: &[Option<f64>],
    assignment_marks: &[Option<f64>],
) -> MasteryValues {
    let completed = progress.iter().filter(|p| p.is_completed).count();

    let topic_completion_percentage = if total_topics > 0 {
        completed as f64 / total_topics as f64 * 100.0
    } else {
        0.0
    };

    MasteryValues {
        mastery_level: mean_or_zero(progress.iter().map(|p| p.mastery_level)),
        quiz_average: score_average(quiz_scores),
        assignment_average: score_average(assignment_marks),
        topic_completion_percentage,
        total_topics_completed: completed as i64,
        total_topics: total_topics as i64,
    }
}

/// Summarises a cohort. An empty cohort yields zeroed statistics with every band present.
pub fn summarize_cohort(records: &[CourseMastery]) -> MasteryStatistics {
    if records.is_empty() {
        return MasteryStatistics::default();
    }

    let mut distribution = MasteryDistribution::default();
    for record in records {
        distribution.record(record.mastery_level);
    }

    MasteryStatistics {
        total_students: records.len() as i64,
        average_mastery_level: mean_or_zero(records.iter().map(|r| r.mastery_level)),
        average_quiz_score: mean_or_zero(records.iter().map(|r| r.quiz_average)),
        average_assignment_score: mean_or_zero(records.iter().map(|r| r.assignment_average)),
        average_completion_rate: mean_or_zero(
            records.iter().map(|r| r.topic_completion_percentage),
        ),
        distribution,
    }
}

/// Recomputes and upserts the mastery record for `key`.
///
/// * Counts every topic of the offering, inactive ones included.
/// * Unknown ids produce an all-zero record rather than an error.
/// * Performs exactly one write.
pub async fn recompute_mastery<S>(store: &S, key: MasteryKey) -> Result<CourseMastery, AppError>
where
    S: LmsStore + ?Sized,
{
    let topics = store
        .list_topics(key.course_id, key.semester_id, true)
        .await?;
    let topic_ids: Vec<i64> = topics.iter().map(|t| t.id).collect();

    let progress = store.find_progress(key.student_id, &topic_ids).await?;
    let quiz_scores = store
        .quiz_scores(key.student_id, key.course_id, key.semester_id)
        .await?;
    let assignment_marks = store
        .assignment_marks(key.student_id, key.course_id, key.semester_id)
        .await?;

    let values = compute_mastery(topics.len(), &progress, &quiz_scores, &assignment_marks);
    let record = store.upsert_mastery(key, &values, Utc::now()).await?;

    tracing::debug!(
        student_id = key.student_id,
        course_id = key.course_id,
        semester_id = key.semester_id,
        mastery_level = record.mastery_level,
        completion = record.topic_completion_percentage,
        "Mastery recomputed"
    );

    Ok(record)
}

/// Cohort statistics for a course offering.
pub async fn mastery_statistics<S>(
    store: &S,
    course_id: i64,
    semester_id: i64,
) -> Result<MasteryStatistics, AppError>
where
    S: LmsStore + ?Sized,
{
    let records = store.list_mastery_records(course_id, semester_id).await?;
    Ok(summarize_cohort(&records))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        models::{
            assessment::{QuizAttempt, Submission},
            progress::ProgressWrite,
            topic::{Difficulty, NewTopic},
        },
        store::{InMemoryStore, MasteryRepository, ProgressRepository, TopicRepository},
    };

    fn progress(topic_id: i64, completed: bool, level: f64) -> TopicProgress {
        TopicProgress {
            id: topic_id,
            student_id: 1,
            topic_id,
            is_completed: completed,
            completed_at: completed.then(Utc::now),
            mastery_level: level,
            time_spent_minutes: 0,
            assessment_result: None,
            updated_at: Utc::now(),
        }
    }

    fn cohort_record(student_id: i64, level: f64) -> CourseMastery {
        CourseMastery {
            id: student_id,
            student_id,
            course_id: 1,
            semester_id: 1,
            mastery_level: level,
            quiz_average: 50.0,
            assignment_average: 40.0,
            topic_completion_percentage: 100.0,
            total_topics_completed: 2,
            total_topics: 2,
            last_updated: Utc::now(),
        }
    }

    fn enrolment(store: &InMemoryStore) -> MasteryKey {
        MasteryKey {
            student_id: store.add_student("ana", "Ana Lima").unwrap(),
            course_id: store.add_course("CS101", "Intro to Programming").unwrap(),
            semester_id: store.add_semester("2026 Fall").unwrap(),
        }
    }

    async fn seed_topics(
        store: &InMemoryStore,
        course_id: i64,
        semester_id: i64,
        count: i32,
    ) -> Vec<i64> {
        let mut ids = Vec::new();
        for order_index in 1..=count {
            let topic = store
                .insert_topic(&NewTopic {
                    course_id,
                    semester_id,
                    title: format!("Topic {order_index}"),
                    description: None,
                    order_index,
                    duration_hours: 1.0,
                    difficulty: Difficulty::Beginner,
                })
                .await
                .unwrap();
            ids.push(topic.id);
        }
        ids
    }

    async fn complete(store: &InMemoryStore, student_id: i64, topic_id: i64, level: f64) {
        store
            .upsert_progress(&ProgressWrite {
                student_id,
                topic_id,
                is_completed: true,
                completed_at: Some(Utc::now()),
                mastery_level: level,
                time_spent_minutes: 30,
                assessment_result: None,
            })
            .await
            .unwrap();
    }

    #[test]
    fn empty_inputs_yield_all_zero_values() {
        assert_eq!(compute_mastery(0, &[], &[], &[]), MasteryValues::default());
    }

    #[test]
    fn progress_without_completion_still_counts_towards_mastery_level() {
        let records = [progress(1, false, 40.0), progress(2, true, 100.0)];
        let values = compute_mastery(4, &records, &[], &[]);

        assert_eq!(values.mastery_level, 70.0);
        assert_eq!(values.total_topics_completed, 1);
        assert_eq!(values.topic_completion_percentage, 25.0);
    }

    #[test]
    fn unscored_attempts_count_as_zero_in_the_denominator() {
        let quiz_scores = [Some(80.0), None];
        let assignment_marks = [None, Some(90.0), Some(60.0)];
        let values = compute_mastery(0, &[], &quiz_scores, &assignment_marks);

        assert_eq!(values.quiz_average, 40.0);
        assert_eq!(values.assignment_average, 50.0);
    }

    #[test]
    fn completion_percentage_is_exact_and_bounded() {
        for total in 1..=12_usize {
            for completed in 0..=total {
                let records: Vec<TopicProgress> =
                    (0..completed).map(|i| progress(i as i64, true, 100.0)).collect();
                let values = compute_mastery(total, &records, &[], &[]);

                assert_eq!(
                    values.topic_completion_percentage,
                    100.0 * (completed as f64 / total as f64)
                );
                assert!((0.0..=100.0).contains(&values.topic_completion_percentage));
            }
        }
    }

    #[test]
    fn boundary_levels_fall_into_the_upper_band() {
        let records = vec![
            cohort_record(1, 25.0),
            cohort_record(2, 50.0),
            cohort_record(3, 75.0),
            cohort_record(4, 24.999),
        ];

        let stats = summarize_cohort(&records);

        assert_eq!(
            stats.distribution,
            MasteryDistribution {
                low: 1,
                medium: 1,
                high: 1,
                mastered: 1,
            }
        );
        assert_eq!(stats.total_students, 4);
        assert_eq!(stats.average_quiz_score, 50.0);
        assert_eq!(stats.average_assignment_score, 40.0);
        assert_eq!(stats.average_completion_rate, 100.0);
    }

    #[test]
    fn empty_cohort_has_zeroed_buckets() {
        let stats = summarize_cohort(&[]);

        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.average_mastery_level, 0.0);
        assert_eq!(stats.distribution, MasteryDistribution::default());

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["distribution"]["low"], 0);
        assert_eq!(json["distribution"]["mastered"], 0);
    }

    #[tokio::test]
    async fn recompute_matches_worked_example() {
        let store = InMemoryStore::new();
        let key = enrolment(&store);
        let (student, course, semester) = (key.student_id, key.course_id, key.semester_id);
        let topics = seed_topics(&store, course, semester, 4).await;
        for (topic_id, level) in topics.iter().zip([80.0, 90.0, 100.0]) {
            complete(&store, student, *topic_id, level).await;
        }
        for score in [70.0, 90.0] {
            store
                .add_quiz_attempt(QuizAttempt {
                    student_id: student,
                    course_id: course,
                    semester_id: semester,
                    score: Some(score),
                })
                .unwrap();
        }
        store
            .add_submission(Submission {
                student_id: student,
                course_id: course,
                semester_id: semester,
                kind: "assignment".to_string(),
                marks: Some(60.0),
            })
            .unwrap();
        // Non-assignment assessments are ignored.
        store
            .add_submission(Submission {
                student_id: student,
                course_id: course,
                semester_id: semester,
                kind: "exam".to_string(),
                marks: Some(10.0),
            })
            .unwrap();

        let record = recompute_mastery(&store, key).await.unwrap();

        assert_eq!(record.topic_completion_percentage, 75.0);
        assert_eq!(record.mastery_level, 90.0);
        assert_eq!(record.quiz_average, 80.0);
        assert_eq!(record.assignment_average, 60.0);
        assert_eq!(record.total_topics_completed, 3);
        assert_eq!(record.total_topics, 4);
    }

    #[tokio::test]
    async fn recompute_without_activity_writes_a_zero_record() {
        let store = InMemoryStore::new();
        let key = enrolment(&store);

        let record = recompute_mastery(&store, key).await.unwrap();

        assert_eq!(record.values(), MasteryValues::default());
        assert_eq!(
            store
                .list_mastery_records(key.course_id, key.semester_id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn recompute_rejects_unknown_references() {
        let store = InMemoryStore::new();
        let known = enrolment(&store);

        for key in [
            MasteryKey {
                student_id: 9_999,
                ..known
            },
            MasteryKey {
                course_id: 9_999,
                ..known
            },
            MasteryKey {
                semester_id: 9_999,
                ..known
            },
        ] {
            let result = recompute_mastery(&store, key).await;
            assert!(matches!(result, Err(AppError::BadRequest(_))), "{key:?}");
        }
        assert!(
            store
                .list_mastery_records(known.course_id, known.semester_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn recompute_is_idempotent_and_replaces_stale_values() {
        let store = InMemoryStore::new();
        let key = enrolment(&store);
        let topics = seed_topics(&store, key.course_id, key.semester_id, 2).await;
        store
            .upsert_mastery(
                key,
                &MasteryValues {
                    mastery_level: 12.0,
                    quiz_average: 99.0,
                    assignment_average: 99.0,
                    topic_completion_percentage: 99.0,
                    total_topics_completed: 9,
                    total_topics: 9,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        complete(&store, key.student_id, topics[0], 70.0).await;

        let first = recompute_mastery(&store, key).await.unwrap();
        let second = recompute_mastery(&store, key).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.values(), second.values());
        assert_eq!(first.quiz_average, 0.0);
        assert_eq!(first.topic_completion_percentage, 50.0);
    }

    #[tokio::test]
    async fn inactive_topics_stay_in_the_denominator() {
        let store = InMemoryStore::new();
        let key = enrolment(&store);
        let topics = seed_topics(&store, key.course_id, key.semester_id, 2).await;
        complete(&store, key.student_id, topics[0], 100.0).await;
        store.deactivate_topic(topics[1]).await.unwrap();

        let record = recompute_mastery(&store, key).await.unwrap();

        assert_eq!(record.total_topics, 2);
        assert_eq!(record.topic_completion_percentage, 50.0);
    }

    #[tokio::test]
    async fn statistics_without_records_are_zeroed() {
        let store = InMemoryStore::new();

        let stats = mastery_statistics(&store, 1, 1).await.unwrap();

        assert_eq!(stats, MasteryStatistics::default());
    }
}
