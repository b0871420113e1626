// tests/progress_tests.rs
//
// End-to-end flows for the progress & grading core: enrollment, lesson
// completion, quiz submission, attempt caps and grade derivation.

use lms_backend::{config::Config, routes, state::AppState};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;

async fn spawn_app() -> (String, PgPool) {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "progress_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (address, pool)
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

/// Registers and logs in a fresh learner, returning the bearer token.
async fn register_and_login(client: &reqwest::Client, address: &str) -> String {
    let username = unique_name("learner");
    let password = "password123";

    client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Register failed");

    let login: serde_json::Value = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

// -- Seeding helpers (direct SQL, like an instructor would have set up) -----

async fn seed_approved_course(pool: &PgPool) -> i64 {
    let instructor_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, password, role) VALUES ($1, 'x', 'instructor') RETURNING id",
    )
    .bind(unique_name("instructor"))
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO courses (instructor_id, title, status)
         VALUES ($1, 'Seeded course', 'approved') RETURNING id",
    )
    .bind(instructor_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn add_module(pool: &PgPool, course_id: i64, position: i32) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO course_modules (course_id, title, position)
         VALUES ($1, 'Module', $2) RETURNING id",
    )
    .bind(course_id)
    .bind(position)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn add_lesson(pool: &PgPool, module_id: i64, position: i32) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO lessons (module_id, title, content, position)
         VALUES ($1, 'Lesson', '<p>body</p>', $2) RETURNING id",
    )
    .bind(module_id)
    .bind(position)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn add_quiz(
    pool: &PgPool,
    scope_column: &str,
    scope_id: i64,
    passing_score: i32,
    attempts_allowed: i32,
    published: bool,
) -> i64 {
    let sql = format!(
        "INSERT INTO quizzes (title, {scope_column}, passing_score, attempts_allowed, is_published)
         VALUES ('Quiz', $1, $2, $3, $4) RETURNING id"
    );
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(scope_id)
        .bind(passing_score)
        .bind(attempts_allowed)
        .bind(published)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn add_question(pool: &PgPool, quiz_id: i64, correct: &str, points: i32, position: i32) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO questions (quiz_id, content, question_type, options, correct_answer, points, position)
         VALUES ($1, 'Question', 'multiple_choice', '[\"A\",\"B\",\"C\"]', $2, $3, $4) RETURNING id",
    )
    .bind(quiz_id)
    .bind(correct)
    .bind(points)
    .bind(position)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn enroll(client: &reqwest::Client, address: &str, token: &str, course_id: i64) -> serde_json::Value {
    let response = client
        .post(&format!("{}/api/courses/{}/enroll", address, course_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Enroll failed");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

async fn get_progress(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    course_id: i64,
) -> serde_json::Value {
    client
        .get(&format!("{}/api/courses/{}/progress", address, course_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Progress fetch failed")
        .json()
        .await
        .unwrap()
}

// -- Tests ------------------------------------------------------------------

/// 2 lessons + 1 module-level quiz (passing 70). Completing one lesson lands
/// at 33%, both at 67%, and an 8/10 quiz submission finishes the course with
/// grade "8.0".
#[tokio::test]
async fn lesson_and_quiz_completion_drive_progress() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;
    let module_id = add_module(&pool, course_id, 0).await;
    let lesson_1 = add_lesson(&pool, module_id, 0).await;
    let lesson_2 = add_lesson(&pool, module_id, 1).await;
    let quiz_id = add_quiz(&pool, "module_id", module_id, 70, 3, true).await;
    let q1 = add_question(&pool, quiz_id, "A", 8, 0).await;
    let q2 = add_question(&pool, quiz_id, "B", 2, 1).await;

    let enrollment = enroll(&client, &address, &token, course_id).await;
    assert_eq!(enrollment["progress"], 0);
    assert_eq!(enrollment["status"], "enrolled");
    assert_eq!(enrollment["grade"], "Incomplete");

    // One of three items done: 33%.
    let response = client
        .put(&format!("{}/api/lessons/{}/complete", address, lesson_1))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let enrollment: serde_json::Value = response.json().await.unwrap();
    assert_eq!(enrollment["progress"], 33);
    assert_eq!(enrollment["status"], "enrolled");
    assert_eq!(enrollment["grade"], "Incomplete");

    // Two of three: 67%.
    let enrollment: serde_json::Value = client
        .put(&format!("{}/api/lessons/{}/complete", address, lesson_2))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(enrollment["progress"], 67);

    // 8 of 10 points: 80%, passes at threshold 70.
    let response = client
        .post(&format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "answers": [
                {"question_id": q1, "answer": "A"},
                {"question_id": q2, "answer": "C"}
            ],
            "time_taken": 95
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let outcome: serde_json::Value = response.json().await.unwrap();
    assert_eq!(outcome["score"]["percentage"], 80);
    assert_eq!(outcome["score"]["status"], "passed");
    assert_eq!(outcome["score"]["attempt_number"], 1);
    // No lesson-scoped quizzes, so the letter-grade metric stays incomplete.
    assert_eq!(outcome["grade"], "Incomplete");

    let progress = get_progress(&client, &address, &token, course_id).await;
    assert_eq!(progress["progress"], 100);
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["grade"], "8.0");

    // Reading again changes nothing: the recompute is idempotent.
    let progress_again = get_progress(&client, &address, &token, course_id).await;
    assert_eq!(progress_again["progress"], 100);
    assert_eq!(progress_again["grade"], "8.0");
}

/// A single-attempt quiz accepts the first submission and rejects the second
/// with 403, leaving exactly one attempt row.
#[tokio::test]
async fn attempts_cap_blocks_further_submissions() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;
    let module_id = add_module(&pool, course_id, 0).await;
    let quiz_id = add_quiz(&pool, "module_id", module_id, 70, 1, true).await;
    let q1 = add_question(&pool, quiz_id, "A", 10, 0).await;

    enroll(&client, &address, &token, course_id).await;

    let body = serde_json::json!({
        "answers": [{"question_id": q1, "answer": "B"}]
    });

    let first = client
        .post(&format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 200);

    let second = client
        .post(&format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 403);

    let attempts = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(attempts, 1, "the rejected submission must not write a row");
}

/// A course with no lessons and no quizzes is complete from the moment of
/// enrollment.
#[tokio::test]
async fn trivial_course_completes_on_enroll() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;

    let enrollment = enroll(&client, &address, &token, course_id).await;
    assert_eq!(enrollment["progress"], 100);
    assert_eq!(enrollment["status"], "completed");
    assert_eq!(enrollment["grade"], "Complete");
}

/// Unpublished quizzes are invisible to learners: submission is 404, and
/// they do not widen the progress denominator.
#[tokio::test]
async fn unpublished_quizzes_do_not_count() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;
    let module_id = add_module(&pool, course_id, 0).await;
    let lesson_id = add_lesson(&pool, module_id, 0).await;
    let quiz_id = add_quiz(&pool, "module_id", module_id, 70, 3, false).await;
    add_question(&pool, quiz_id, "A", 10, 0).await;

    enroll(&client, &address, &token, course_id).await;

    let response = client
        .post(&format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"answers": [{"question_id": 1, "answer": "A"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // The only countable item is the lesson; completing it finishes the course.
    let enrollment: serde_json::Value = client
        .put(&format!("{}/api/lessons/{}/complete", address, lesson_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(enrollment["progress"], 100);
    assert_eq!(enrollment["status"], "completed");
}

/// Un-completing a lesson walks progress back down.
#[tokio::test]
async fn uncomplete_reverts_progress() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;
    let module_id = add_module(&pool, course_id, 0).await;
    let lesson_1 = add_lesson(&pool, module_id, 0).await;
    add_lesson(&pool, module_id, 1).await;

    enroll(&client, &address, &token, course_id).await;

    let enrollment: serde_json::Value = client
        .put(&format!("{}/api/lessons/{}/complete", address, lesson_1))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(enrollment["progress"], 50);

    let enrollment: serde_json::Value = client
        .put(&format!("{}/api/lessons/{}/uncomplete", address, lesson_1))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(enrollment["progress"], 0);
    assert_eq!(enrollment["status"], "enrolled");
    assert_eq!(enrollment["grade"], "Incomplete");
}

/// A lesson-scoped quiz feeds both grading paths: the letter grade in the
/// submit response, and — once the latest attempt regresses — a zero
/// contribution to the completion grade (best recent state, not ever-passed).
#[tokio::test]
async fn regressed_latest_attempt_zeroes_the_completion_grade() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;
    let module_id = add_module(&pool, course_id, 0).await;
    let lesson_id = add_lesson(&pool, module_id, 0).await;
    let quiz_id = add_quiz(&pool, "lesson_id", lesson_id, 70, 2, true).await;
    let q1 = add_question(&pool, quiz_id, "A", 8, 0).await;
    let q2 = add_question(&pool, quiz_id, "B", 2, 1).await;

    enroll(&client, &address, &token, course_id).await;

    // First attempt passes with 8/10: the lesson-quiz letter grade is B.
    let outcome: serde_json::Value = client
        .post(&format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "answers": [
                {"question_id": q1, "answer": "A"},
                {"question_id": q2, "answer": "C"}
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["score"]["status"], "passed");
    assert_eq!(outcome["grade"], "B");
    assert_eq!(outcome["average_score"], 8.0);

    // Completing the lesson finishes the course; the quiz percentage (80)
    // is the whole grade average.
    let enrollment: serde_json::Value = client
        .put(&format!("{}/api/lessons/{}/complete", address, lesson_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(enrollment["progress"], 100);
    assert_eq!(enrollment["grade"], "8.0");

    // Second attempt fails; the latest attempt now contributes 0 even though
    // an earlier attempt passed.
    let outcome: serde_json::Value = client
        .post(&format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "answers": [
                {"question_id": q1, "answer": "C"},
                {"question_id": q2, "answer": "C"}
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["score"]["status"], "failed");
    assert_eq!(outcome["score"]["attempt_number"], 2);

    let progress = get_progress(&client, &address, &token, course_id).await;
    assert_eq!(progress["progress"], 100);
    assert_eq!(progress["grade"], "0.0");
}

/// The score-status endpoint reports the attempt budget for the retake UI.
#[tokio::test]
async fn score_status_reports_attempt_budget() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;
    let module_id = add_module(&pool, course_id, 0).await;
    let quiz_id = add_quiz(&pool, "module_id", module_id, 70, 3, true).await;
    let q1 = add_question(&pool, quiz_id, "A", 10, 0).await;

    enroll(&client, &address, &token, course_id).await;

    client
        .post(&format!("{}/api/quizzes/{}/submit", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"answers": [{"question_id": q1, "answer": "B"}]}))
        .send()
        .await
        .unwrap();

    let status: serde_json::Value = client
        .get(&format!("{}/api/quizzes/{}/score", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(status["has_completed"], false);
    assert_eq!(status["latest_score"]["percentage"], 0);
    assert_eq!(status["attempts"]["used"], 1);
    assert_eq!(status["attempts"]["remaining"], 2);
    assert_eq!(status["attempts"]["can_retake"], true);
}

/// Unenrolling removes the enrollment row; progress reads 404 afterwards.
#[tokio::test]
async fn unenroll_removes_the_enrollment() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;
    enroll(&client, &address, &token, course_id).await;

    let response = client
        .delete(&format!("{}/api/courses/{}/enroll", address, course_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .get(&format!("{}/api/courses/{}/progress", address, course_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

/// Lesson comments: replies nest under their parents, and deleting a root
/// removes the whole subtree.
#[tokio::test]
async fn comment_tree_builds_and_deletes_as_a_subtree() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let course_id = seed_approved_course(&pool).await;
    let module_id = add_module(&pool, course_id, 0).await;
    let lesson_id = add_lesson(&pool, module_id, 0).await;

    let root: serde_json::Value = client
        .post(&format!("{}/api/lessons/{}/comments", address, lesson_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"content": "Great lesson!"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let root_id = root["id"].as_i64().unwrap();

    client
        .post(&format!("{}/api/lessons/{}/comments", address, lesson_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"content": "Agreed.", "parent_id": root_id}))
        .send()
        .await
        .unwrap();

    let tree: Vec<serde_json::Value> = client
        .get(&format!("{}/api/lessons/{}/comments", address, lesson_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["replies"].as_array().unwrap().len(), 1);

    let response = client
        .delete(&format!("{}/api/comments/{}", address, root_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let tree: Vec<serde_json::Value> = client
        .get(&format!("{}/api/lessons/{}/comments", address, lesson_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(tree.is_empty(), "reply must be gone with its parent");
}
