//! HTTP API for the learning-path progress engine.
//!
//! Exposes an axum [`Router`] backed by any
//! [`pathway_core::store::ProgressStore`]. Every route requires a bearer
//! session token; TLS and reverse-proxy concerns are the caller's
//! responsibility.

pub mod auth;
pub mod error;
pub mod evidence;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use pathway_core::store::ProgressStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ProgressStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the learning-path API.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ProgressStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .route("/learning-path/me", get(handlers::me::handler::<S>))
    .route("/learning-path/progress", post(handlers::progress::handler::<S>))
    .route(
      "/learning-path/section-status",
      post(handlers::section_status::handler::<S>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use pathway_core::{
    activity::{
      AdaptiveSessionRow, AdaptiveSessionStatus, NewLectureProgress,
    },
    curriculum::{
      CourseRow, LectureRef, ModuleRow, QuizRef, SectionMeta, SubjectRow,
    },
    store::ProgressStore as _,
  };
  use pathway_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  const TOKEN: &str = "tok-test";

  /// One course / subject with two ordered modules; `module-1` has one
  /// section with one lecture.
  async fn make_state() -> (AppState<SqliteStore>, Uuid) {
    let store = SqliteStore::open_in_memory().await.unwrap();

    store
      .put_course(CourseRow {
        id:          "course-1".into(),
        title:       "Data Basics".into(),
        order_index: Some(0.0),
      })
      .await
      .unwrap();
    store
      .put_subject(SubjectRow {
        id:          "subject-1".into(),
        title:       "Spreadsheets".into(),
        course_id:   "course-1".into(),
        order_index: Some(0.0),
      })
      .await
      .unwrap();
    store
      .put_module(ModuleRow {
        id:          "module-1".into(),
        title:       "Formulas".into(),
        subject_id:  "subject-1".into(),
        slug:        Some("formulas".into()),
        order_index: Some(0.0),
      })
      .await
      .unwrap();
    store
      .put_module(ModuleRow {
        id:          "module-2".into(),
        title:       "Charts".into(),
        subject_id:  "subject-1".into(),
        slug:        None,
        order_index: Some(1.0),
      })
      .await
      .unwrap();
    store
      .put_section(SectionMeta {
        id:          "sec-1".into(),
        module_id:   "module-1".into(),
        title:       Some("Getting Started".into()),
        order_index: Some(0.0),
      })
      .await
      .unwrap();
    store
      .put_lecture(LectureRef {
        id:         "lec-1".into(),
        section_id: "sec-1".into(),
      })
      .await
      .unwrap();

    let user = Uuid::new_v4();
    store.create_session(TOKEN, user).await.unwrap();

    let state = AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig {
        host:       "127.0.0.1".into(),
        port:       8080,
        store_path: PathBuf::from(":memory:"),
      }),
    };
    (state, user)
  }

  async fn oneshot_json(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes =
      axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  // ── Auth ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_token_returns_structured_401() {
    let (state, _) = make_state().await;
    let (status, body) =
      oneshot_json(state, "GET", "/learning-path/me", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication_required");
    assert_eq!(body["requiresAuthentication"], json!(true));
  }

  #[tokio::test]
  async fn stale_token_returns_401() {
    let (state, _) = make_state().await;
    let (status, _) =
      oneshot_json(state, "GET", "/learning-path/me", Some("stale"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  // ── GET /learning-path/me ──────────────────────────────────────────────

  #[tokio::test]
  async fn me_without_stored_path_builds_gated_fallback_tree() {
    let (state, _) = make_state().await;
    let (status, body) =
      oneshot_json(state, "GET", "/learning-path/me", Some(TOKEN), None).await;

    assert_eq!(status, StatusCode::OK);
    let modules = &body[0]["subjects"][0]["modules"];
    assert_eq!(modules[0]["id"], "module-1");
    assert_eq!(modules[0]["is_active"], json!(true));
    // Second mandatory module stays locked behind the first.
    assert_eq!(modules[1]["id"], "module-2");
    assert_eq!(modules[1]["is_active"], json!(false));
    assert_eq!(modules[1]["active"], "inactive");
  }

  #[tokio::test]
  async fn me_with_stored_path_trusts_stored_activation() {
    let (state, user) = make_state().await;
    state
      .store
      .replace_path(
        user,
        &json!({ "courses": [{
          "id": "course-1",
          "subjects": [{
            "id": "subject-1",
            "modules": [
              { "id": "module-1", "order_index": 1, "is_active": false },
              { "id": "module-2", "order_index": 2, "is_active": true }
            ]
          }]
        }] }),
      )
      .await
      .unwrap();

    let (status, body) =
      oneshot_json(state, "GET", "/learning-path/me", Some(TOKEN), None).await;

    assert_eq!(status, StatusCode::OK);
    let modules = &body[0]["subjects"][0]["modules"];
    assert_eq!(modules[0]["is_active"], json!(false));
    assert_eq!(modules[1]["is_active"], json!(true));
  }

  // ── POST /learning-path/section-status ─────────────────────────────────

  #[tokio::test]
  async fn section_status_reports_completion_after_watching() {
    let (state, user) = make_state().await;
    state
      .store
      .record_lecture_progress(NewLectureProgress {
        user_id:          user,
        course_id:        None,
        subject_id:       None,
        module_id:        "module-1".into(),
        section_id:       "sec-1".into(),
        lecture_id:       "lec-1".into(),
        watched_seconds:  Some(97),
        duration_seconds: Some(100),
        is_watched:       true,
      })
      .await
      .unwrap();

    let (status, body) = oneshot_json(
      state,
      "POST",
      "/learning-path/section-status",
      Some(TOKEN),
      Some(json!({ "sectionIds": ["sec-1", "sec-1", "sec-unknown"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let summary = &body["statuses"]["sec-1"];
    assert_eq!(summary["lecturesSatisfied"], json!(true));
    assert_eq!(summary["completed"], json!(true));
    assert_eq!(summary["progressPercent"], json!(100));
    // Unknown ids are skipped, not errors.
    assert!(body["statuses"].get("sec-unknown").is_none());
  }

  async fn answer_quiz_question(state: &AppState<SqliteStore>, question: &str) {
    let (status, _) = oneshot_json(
      state.clone(),
      "POST",
      "/learning-path/progress",
      Some(TOKEN),
      Some(json!({
        "moduleId":       "module-1",
        "sectionId":      "sec-1",
        "quizQuestionId": question,
        "activity":       "quiz",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
  }

  async fn section_summary(
    state: &AppState<SqliteStore>,
    section_id: &str,
  ) -> Value {
    let (status, body) = oneshot_json(
      state.clone(),
      "POST",
      "/learning-path/section-status",
      Some(TOKEN),
      Some(json!({ "sectionIds": [section_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["statuses"][section_id].clone()
  }

  #[tokio::test]
  async fn adaptive_bar_counts_distinct_questions() {
    let (state, user) = make_state().await;
    state
      .store
      .put_adaptive_session(user, AdaptiveSessionRow {
        id:                      "as-1".into(),
        section_id:              "sec-1".into(),
        status:                  AdaptiveSessionStatus::Completed,
        current_question_number: 3,
        created_at:              None,
        updated_at:              None,
      })
      .await
      .unwrap();

    // One question answered twice is still one toward the bar of 3.
    answer_quiz_question(&state, "q-1").await;
    answer_quiz_question(&state, "q-1").await;
    let summary = section_summary(&state, "sec-1").await;
    assert_eq!(summary["adaptiveSatisfied"], json!(false));

    answer_quiz_question(&state, "q-2").await;
    answer_quiz_question(&state, "q-3").await;
    let summary = section_summary(&state, "sec-1").await;
    assert_eq!(summary["adaptiveSatisfied"], json!(true));
  }

  #[tokio::test]
  async fn basic_quiz_attempt_satisfies_assessment() {
    let (state, _) = make_state().await;
    state
      .store
      .put_quiz(QuizRef { id: "quiz-1".into(), section_id: "sec-1".into() })
      .await
      .unwrap();

    let summary = section_summary(&state, "sec-1").await;
    assert_eq!(summary["adaptiveSatisfied"], json!(false));

    let (status, _) = oneshot_json(
      state.clone(),
      "POST",
      "/learning-path/progress",
      Some(TOKEN),
      Some(json!({
        "moduleId":  "module-1",
        "sectionId": "sec-1",
        "quizId":    "quiz-1",
        "activity":  "quiz",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let summary = section_summary(&state, "sec-1").await;
    assert_eq!(summary["adaptiveSatisfied"], json!(true));
  }

  #[tokio::test]
  async fn onboarding_exception_applies_in_every_subject() {
    let (state, user) = make_state().await;
    state
      .store
      .put_subject(SubjectRow {
        id:          "subject-2".into(),
        title:       "Statistics".into(),
        course_id:   "course-1".into(),
        order_index: Some(1.0),
      })
      .await
      .unwrap();
    state
      .store
      .put_module(ModuleRow {
        id:          "module-3".into(),
        title:       "Averages".into(),
        subject_id:  "subject-2".into(),
        slug:        None,
        order_index: Some(0.0),
      })
      .await
      .unwrap();
    state
      .store
      .put_section(SectionMeta {
        id:          "sec-2".into(),
        module_id:   "module-3".into(),
        title:       Some("Intro".into()),
        order_index: Some(0.0),
      })
      .await
      .unwrap();
    state
      .store
      .put_lecture(LectureRef { id: "lec-2".into(), section_id: "sec-2".into() })
      .await
      .unwrap();
    state
      .store
      .record_lecture_progress(NewLectureProgress {
        user_id:          user,
        course_id:        None,
        subject_id:       None,
        module_id:        "module-3".into(),
        section_id:       "sec-2".into(),
        lecture_id:       "lec-2".into(),
        watched_seconds:  Some(100),
        duration_seconds: Some(100),
        is_watched:       true,
      })
      .await
      .unwrap();

    // The second subject's opening section is gated by lectures alone,
    // same as the first subject's.
    let summary = section_summary(&state, "sec-2").await;
    assert_eq!(summary["quizApplicable"], json!(false));
    assert_eq!(summary["exerciseApplicable"], json!(false));
    assert_eq!(summary["completed"], json!(true));
  }

  // ── POST /learning-path/progress ───────────────────────────────────────

  #[tokio::test]
  async fn progress_unknown_module_returns_404() {
    let (state, _) = make_state().await;
    let (status, body) = oneshot_json(
      state,
      "POST",
      "/learning-path/progress",
      Some(TOKEN),
      Some(json!({ "moduleId": "nope", "activity": "lecture" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "module_not_found");
  }

  #[tokio::test]
  async fn progress_without_stored_path_reports_not_updated() {
    let (state, _) = make_state().await;
    let (status, body) = oneshot_json(
      state,
      "POST",
      "/learning-path/progress",
      Some(TOKEN),
      Some(json!({
        "moduleId":        "formulas",
        "sectionId":       "sec-1",
        "lectureId":       "lec-1",
        "watchedSeconds":  96,
        "durationSeconds": 100,
        "activity":        "lecture",
      })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["updated"], json!(false));
    let completion = &body["moduleCompletion"];
    assert_eq!(completion["viewedLecture"], json!(true));
    // The only section is fully watched, so the rollup completes the module.
    assert_eq!(completion["completed"], json!(true));
    assert_eq!(completion["progressPercent"], json!(100));
  }

  #[tokio::test]
  async fn progress_rewrites_stored_path_and_unlocks_next_module() {
    let (state, user) = make_state().await;
    state
      .store
      .replace_path(
        user,
        &json!({ "courses": [{
          "id": "course-1",
          "subjects": [{
            "id": "subject-1",
            "modules": [
              { "id": "module-1", "order_index": 0, "completed": false },
              { "id": "module-2", "order_index": 1, "completed": false }
            ]
          }]
        }] }),
      )
      .await
      .unwrap();

    let (status, body) = oneshot_json(
      state.clone(),
      "POST",
      "/learning-path/progress",
      Some(TOKEN),
      Some(json!({
        "moduleId":        "module-1",
        "sectionId":       "sec-1",
        "lectureId":       "lec-1",
        "watchedSeconds":  100,
        "durationSeconds": 100,
        "activity":        "lecture",
      })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], json!(true));
    assert_eq!(body["moduleCompletion"]["completed"], json!(true));

    let stored = state.store.load_path(user).await.unwrap().unwrap();
    let modules = &stored["courses"][0]["subjects"][0]["modules"];
    assert_eq!(modules[0]["completed"], json!(true));
    assert_eq!(modules[0]["progress"], json!(100));
    assert_eq!(modules[1]["is_active"], json!(true));
    assert_eq!(modules[1]["active"], "active");
  }

  #[tokio::test]
  async fn progress_lecture_without_lecture_fields_is_rejected() {
    let (state, _) = make_state().await;
    let (status, body) = oneshot_json(
      state,
      "POST",
      "/learning-path/progress",
      Some(TOKEN),
      Some(json!({ "moduleId": "module-1", "activity": "lecture" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "lecture_fields_missing");
  }
}
