// tests/pg_tests.rs
//
// Runs the HTTP surface against a real PostgreSQL database.
// Skipped unless DATABASE_URL points at a database the tests may write to.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mastery_backend::{
    config::Config,
    models::user::Role,
    routes,
    services::notifier::TracingNotifier,
    state::AppState,
    store::PgStore,
    utils::jwt::sign_jwt,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

const JWT_SECRET: &str = "test_secret_for_pg_tests";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Suffix that keeps seeded usernames and codes unique across runs.
fn unique(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let n = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{nanos}_{n}")
}

struct TestApp {
    address: String,
    pool: PgPool,
    client: reqwest::Client,
}

impl TestApp {
    fn token(&self, id: i64, role: Role) -> String {
        let token = sign_jwt(id, role, JWT_SECRET, 600).expect("Failed to sign token");
        format!("Bearer {}", token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn add_user(&self, prefix: &str, role: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, full_name, role) VALUES ($1, $1, $2) RETURNING id",
        )
        .bind(unique(prefix))
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert user")
    }

    /// Seeds one course offering with an assigned lecturer and an enrolled student.
    async fn seed_offering(&self) -> Offering {
        let course_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO courses (code, title) VALUES ($1, 'Databases') RETURNING id",
        )
        .bind(unique("DB"))
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert course");

        let semester_id =
            sqlx::query_scalar::<_, i64>("INSERT INTO semesters (name) VALUES ($1) RETURNING id")
                .bind(unique("term"))
                .fetch_one(&self.pool)
                .await
                .expect("Failed to insert semester");

        let lecturer_id = self.add_user("lecturer", "lecturer").await;
        sqlx::query(
            "INSERT INTO course_lecturers (lecturer_id, course_id, semester_id) \
             VALUES ($1, $2, $3)",
        )
        .bind(lecturer_id)
        .bind(course_id)
        .bind(semester_id)
        .execute(&self.pool)
        .await
        .expect("Failed to assign lecturer");

        let student_id = self.add_user("student", "student").await;

        Offering {
            course_id,
            semester_id,
            lecturer: self.token(lecturer_id, Role::Lecturer),
            student_id,
            student: self.token(student_id, Role::Student),
        }
    }

    async fn create_topic(&self, offering: &Offering, body: Value) -> reqwest::Response {
        let mut body = body;
        body["course_id"] = json!(offering.course_id);
        body["semester_id"] = json!(offering.semester_id);
        self.client
            .post(self.url("/api/topics"))
            .header("Authorization", &offering.lecturer)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn topic_ids(&self, offering: &Offering, titles: &[&str]) -> Vec<i64> {
        let mut ids = Vec::new();
        for title in titles {
            let created: Value = self
                .create_topic(offering, json!({ "title": title, "duration_hours": 1.0 }))
                .await
                .json()
                .await
                .unwrap();
            ids.push(created["id"].as_i64().unwrap());
        }
        ids
    }
}

struct Offering {
    course_id: i64,
    semester_id: i64,
    lecturer: String,
    student_id: i64,
    student: String,
}

/// Spawns the app over `PgStore`, or returns `None` when DATABASE_URL is unset.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL tests");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to PostgreSQL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let config = Config {
        database_url,
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        max_connections: 5,
        log_dir: "logs".to_string(),
    };

    let state = AppState {
        store: Arc::new(PgStore::new(pool.clone())),
        notifier: Arc::new(TracingNotifier),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
    })
}

fn approx(value: &Value, expected: f64) -> bool {
    value
        .as_f64()
        .is_some_and(|actual| (actual - expected).abs() < 1e-9)
}

#[tokio::test]
async fn taken_order_index_conflicts() {
    let Some(app) = spawn_app().await else { return };
    let offering = app.seed_offering().await;

    let first = app
        .create_topic(&offering, json!({ "title": "Joins", "duration_hours": 1.0 }))
        .await;
    assert_eq!(first.status().as_u16(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["order_index"], 1);

    let clash = app
        .create_topic(
            &offering,
            json!({ "title": "Clash", "order_index": 1, "duration_hours": 1.0 }),
        )
        .await;
    assert_eq!(clash.status().as_u16(), 409);
}

#[tokio::test]
async fn reorder_renumbers_inside_one_transaction() {
    let Some(app) = spawn_app().await else { return };
    let offering = app.seed_offering().await;
    let ids = app.topic_ids(&offering, &["A", "B", "C"]).await;

    let reorder = |topic_ids: Vec<i64>| {
        app.client
            .put(app.url("/api/topics/reorder"))
            .header("Authorization", &offering.lecturer)
            .json(&json!({
                "course_id": offering.course_id,
                "semester_id": offering.semester_id,
                "topic_ids": topic_ids
            }))
            .send()
    };

    let partial = reorder(vec![ids[1], ids[0]]).await.unwrap();
    assert_eq!(partial.status().as_u16(), 400);

    // Swapping positions passes through duplicate indexes mid-transaction
    let response = reorder(vec![ids[2], ids[1], ids[0]]).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let ordered: Vec<Value> = response.json().await.unwrap();
    let titles: Vec<&str> = ordered.iter().map(|t| t["title"].as_str().unwrap()).collect();
    let indexes: Vec<i64> = ordered
        .iter()
        .map(|t| t["order_index"].as_i64().unwrap())
        .collect();
    assert_eq!(titles, vec!["C", "B", "A"]);
    assert_eq!(indexes, vec![1, 2, 3]);

    let stored: Vec<(i64, i32)> = sqlx::query_as(
        "SELECT id, order_index FROM topics WHERE course_id = $1 AND semester_id = $2 \
         ORDER BY order_index",
    )
    .bind(offering.course_id)
    .bind(offering.semester_id)
    .fetch_all(&app.pool)
    .await
    .unwrap();
    assert_eq!(stored, vec![(ids[2], 1), (ids[1], 2), (ids[0], 3)]);
}

#[tokio::test]
async fn progress_recomputes_and_feeds_cohort_queries() {
    let Some(app) = spawn_app().await else { return };
    let offering = app.seed_offering().await;
    let ids = app.topic_ids(&offering, &["Indexes", "Plans"]).await;

    let quiz_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO quizzes (course_id, semester_id, title) VALUES ($1, $2, 'Q1') RETURNING id",
    )
    .bind(offering.course_id)
    .bind(offering.semester_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO quiz_attempts (quiz_id, student_id, score) VALUES ($1, $2, 80)")
        .bind(quiz_id)
        .bind(offering.student_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let recorded = app
        .client
        .put(app.url(&format!("/api/progress/topics/{}", ids[0])))
        .header("Authorization", &offering.student)
        .json(&json!({ "is_completed": true, "time_spent_minutes": 20 }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(recorded.status().as_u16(), 200);
    let recorded: Value = recorded.json().await.unwrap();
    assert_eq!(recorded["newly_completed"], true);

    let mastery = &recorded["mastery"];
    assert!(approx(&mastery["mastery_level"], 100.0));
    assert!(approx(&mastery["quiz_average"], 80.0));
    assert!(approx(&mastery["assignment_average"], 0.0));
    assert!(approx(&mastery["topic_completion_percentage"], 50.0));
    assert_eq!(mastery["total_topics_completed"], 1);
    assert_eq!(mastery["total_topics"], 2);

    let offering_path = format!(
        "/api/lecturer/courses/{}/semesters/{}",
        offering.course_id, offering.semester_id
    );

    let cohort: Vec<Value> = app
        .client
        .get(app.url(&format!("{offering_path}/mastery")))
        .header("Authorization", &offering.lecturer)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(cohort.len(), 1);
    assert_eq!(cohort[0]["student_id"], offering.student_id);

    let stats: Value = app
        .client
        .get(app.url(&format!("{offering_path}/statistics")))
        .header("Authorization", &offering.lecturer)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_students"], 1);
    assert_eq!(
        stats["distribution"],
        json!({ "low": 0, "medium": 0, "high": 0, "mastered": 1 })
    );
    assert!(approx(&stats["average_quiz_score"], 80.0));

    let history: Vec<Value> = app
        .client
        .get(app.url("/api/mastery/history"))
        .header("Authorization", &offering.student)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["course_id"], offering.course_id);
    assert_eq!(history[0]["semester_id"], offering.semester_id);

    // Staff recalculation reads the same stored rows
    let recalculated: Value = app
        .client
        .post(app.url(&format!(
            "{offering_path}/students/{}/recalculate",
            offering.student_id
        )))
        .header("Authorization", &offering.lecturer)
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert!(approx(&recalculated["topic_completion_percentage"], 50.0));
    assert_eq!(recalculated["total_topics"], 2);
}

#[tokio::test]
async fn recalculate_for_unknown_course_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let offering = app.seed_offering().await;

    let response = app
        .client
        .post(app.url("/api/mastery/recalculate"))
        .header("Authorization", &offering.student)
        .json(&json!({ "course_id": i64::MAX, "semester_id": offering.semester_id }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);

    let written: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM course_mastery WHERE student_id = $1")
            .bind(offering.student_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(written, 0);
}
