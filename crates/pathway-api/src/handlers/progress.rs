//! `POST /learning-path/progress`.
//!
//! Records one unit of learner activity, recomputes the module's
//! completion and progress, persists the status row, and rewrites the
//! stored path document so its gate flags stay consistent.

use std::collections::HashMap;

use axum::{Json, extract::State};
use pathway_core::{
  activity::{
    ActivityKind, LEGACY_QUIZ_QUESTION_BAR, ModuleExerciseSubmissionRow,
    NewBasicQuizAttempt, NewExerciseQuestionSubmission, NewExerciseSubmission,
    NewLectureProgress, NewModuleStatus, NewQuizAttempt, lecture_is_watched,
  },
  aggregate::{self, ModuleCompletionSignals},
  curriculum::{ModuleRequirement, ModuleRow},
  path_doc,
  store::ProgressStore,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiError, evidence};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressBody {
  pub module_id:            String,
  pub course_id:            Option<String>,
  pub subject_id:           Option<String>,
  pub section_id:           Option<String>,
  pub lecture_id:           Option<String>,
  pub watched_seconds:      Option<i64>,
  pub duration_seconds:     Option<i64>,
  pub quiz_id:              Option<String>,
  pub quiz_question_id:     Option<String>,
  pub exercise_id:          Option<String>,
  pub exercise_question_id: Option<String>,
  pub exercise_is_correct:  Option<bool>,
  pub exercise_user_answer: Option<String>,
  pub activity:             ActivityKind,
}

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<ProgressBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ProgressStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();

  let module = store
    .resolve_module(&body.module_id)
    .await
    .map_err(|e| ApiError::store("module_fetch_failed", e))?
    .ok_or_else(|| ApiError::NotFound("module_not_found".into()))?;

  record_activity(store, user, &module, &body).await?;

  // Fresh per-section evidence drives both completion and percent.
  let sections = store
    .sections_of_module(&module.id)
    .await
    .map_err(|e| ApiError::store("module_sections_fetch_failed", e))?;
  let section_ids: Vec<String> = sections.iter().map(|s| s.id.clone()).collect();
  let batch = evidence::gather(store, user, &section_ids).await?;
  let snapshot = evidence::snapshot_from(&batch.reports);
  let rollup = evidence::rollup_from(&batch.reports);

  // Legacy module-scope signals, still reported to callers.
  let quiz_question_count = store
    .module_quiz_attempt_count(user, &module.id)
    .await
    .map_err(|e| ApiError::store("module_quiz_count_failed", e))?;
  let module_submissions = store
    .module_exercise_submissions(user, &module.id)
    .await
    .map_err(|e| ApiError::store("module_exercise_fetch_failed", e))?;
  let (correctness_percentage, exercise_fully_correct) =
    exercise_correctness(&module_submissions);

  let document = store
    .load_path(user)
    .await
    .map_err(|e| ApiError::store("path_fetch_failed", e))?;
  let courses = document
    .as_ref()
    .map(path_doc::extract_courses)
    .unwrap_or_default();

  let optional =
    resolve_optional(store, user, &module, &body.module_id, &courses).await?;

  let (signals, completed, percent) = if optional {
    (ModuleCompletionSignals::optional_bypass(), true, 100)
  } else {
    let signals = ModuleCompletionSignals {
      viewed_lecture: snapshot.watched_lectures > 0,
      attempted_quiz: quiz_question_count >= LEGACY_QUIZ_QUESTION_BAR,
      attempted_exercise: !module_submissions.is_empty(),
      exercise_fully_correct,
    };
    let completed = aggregate::module_completed(signals, rollup);
    // A sectionless module that is legacy-complete has nothing left to
    // count, so it reports full progress.
    let percent = if rollup.is_none() && completed {
      100
    } else {
      aggregate::effective_percent(&snapshot, rollup)
    };
    (signals, completed, percent)
  };

  let status = if optional {
    ModuleRequirement::Optional
  } else {
    ModuleRequirement::Mandatory
  };
  store
    .upsert_module_status(NewModuleStatus {
      user_id: user,
      module_id: module.id.clone(),
      status,
      correctness_percentage,
      progress: aggregate::clamp_progress(percent),
    })
    .await
    .map_err(|e| ApiError::store("module_status_write_failed", e))?;

  let completion = json!({
    "viewedLecture":        signals.viewed_lecture,
    "attemptedQuiz":        signals.attempted_quiz,
    "attemptedExercise":    signals.attempted_exercise,
    "exerciseFullyCorrect": signals.exercise_fully_correct,
    "completed":            completed,
    "progressPercent":      aggregate::clamp_progress(percent),
  });

  if courses.is_empty() {
    // Nothing stored to rewrite; the status row alone carries the state.
    return Ok(Json(json!({
      "ok":               true,
      "updated":          false,
      "moduleCompletion": completion,
    })));
  }

  let rewritten = rewrite_document(
    courses,
    &module,
    &body.module_id,
    &body.activity,
    completed,
    aggregate::clamp_progress(percent),
    correctness_percentage,
    optional,
  );
  store
    .replace_path(user, &json!({ "courses": rewritten }))
    .await
    .map_err(|e| ApiError::store("path_write_failed", e))?;

  Ok(Json(json!({
    "ok":               true,
    "updated":          true,
    "moduleCompletion": completion,
  })))
}

// ─── Activity recording ──────────────────────────────────────────────────────

async fn record_activity<S>(
  store: &S,
  user: Uuid,
  module: &ModuleRow,
  body: &ProgressBody,
) -> Result<(), ApiError>
where
  S: ProgressStore,
{
  match body.activity {
    ActivityKind::Lecture => {
      let (Some(section_id), Some(lecture_id)) =
        (body.section_id.clone(), body.lecture_id.clone())
      else {
        return Err(ApiError::BadRequest("lecture_fields_missing".into()));
      };
      let is_watched =
        lecture_is_watched(body.watched_seconds, body.duration_seconds);
      store
        .record_lecture_progress(NewLectureProgress {
          user_id: user,
          course_id: body.course_id.clone(),
          subject_id: body.subject_id.clone(),
          module_id: module.id.clone(),
          section_id,
          lecture_id,
          watched_seconds: body.watched_seconds,
          duration_seconds: body.duration_seconds,
          is_watched,
        })
        .await
        .map_err(|e| ApiError::store("lecture_progress_write_failed", e))?;
    }
    ActivityKind::Quiz => {
      // A per-question answer and a whole-quiz attempt are separate
      // records; an update may carry either or both.
      let Some(section_id) = body.section_id.clone() else {
        return Err(ApiError::BadRequest("quiz_fields_missing".into()));
      };
      if body.quiz_id.is_none() && body.quiz_question_id.is_none() {
        return Err(ApiError::BadRequest("quiz_fields_missing".into()));
      }
      if body.quiz_question_id.is_some() {
        store
          .record_quiz_attempt(NewQuizAttempt {
            user_id: user,
            course_id: body.course_id.clone(),
            subject_id: body.subject_id.clone(),
            module_id: module.id.clone(),
            section_id: section_id.clone(),
            question_id: body.quiz_question_id.clone(),
          })
          .await
          .map_err(|e| ApiError::store("quiz_attempt_write_failed", e))?;
      }
      if let Some(quiz_id) = body.quiz_id.clone() {
        store
          .record_basic_quiz_attempt(NewBasicQuizAttempt {
            user_id: user,
            section_id,
            quiz_id,
          })
          .await
          .map_err(|e| ApiError::store("basic_quiz_attempt_write_failed", e))?;
      }
    }
    ActivityKind::Exercise => {
      let Some(section_id) = body.section_id.clone() else {
        return Err(ApiError::BadRequest("exercise_fields_missing".into()));
      };
      store
        .record_exercise_submission(NewExerciseSubmission {
          user_id: user,
          course_id: body.course_id.clone(),
          subject_id: body.subject_id.clone(),
          module_id: module.id.clone(),
          section_id,
          exercise_id: body.exercise_id.clone(),
          question_id: body.exercise_question_id.clone(),
          is_correct: body.exercise_is_correct,
        })
        .await
        .map_err(|e| ApiError::store("exercise_submission_write_failed", e))?;
      if let (Some(exercise_id), Some(question_id)) =
        (body.exercise_id.clone(), body.exercise_question_id.clone())
      {
        store
          .record_exercise_question_submission(NewExerciseQuestionSubmission {
            user_id: user,
            exercise_id,
            question_id,
            user_answer: body.exercise_user_answer.clone(),
            is_correct: body.exercise_is_correct.unwrap_or(false),
          })
          .await
          .map_err(|e| ApiError::store("exercise_question_write_failed", e))?;
      }
    }
  }
  Ok(())
}

// ─── Derivation helpers ──────────────────────────────────────────────────────

/// Last submission per question wins. Returns the correctness
/// percentage over distinct questions (`None` with no submissions) and
/// whether every question's latest answer is correct.
fn exercise_correctness(
  submissions: &[ModuleExerciseSubmissionRow],
) -> (Option<f64>, bool) {
  let mut latest: HashMap<&str, bool> = HashMap::new();
  for row in submissions {
    if let Some(question_id) = row.question_id.as_deref() {
      latest.insert(question_id, row.is_correct.unwrap_or(false));
    }
  }
  if latest.is_empty() {
    return (None, false);
  }
  let correct = latest.values().filter(|c| **c).count();
  let percentage = (correct as f64 / latest.len() as f64) * 100.0;
  (Some(percentage), correct == latest.len())
}

/// Whether the module is optional for this user: the stored path
/// document decides first, then the persisted status row. Mandatory by
/// default.
async fn resolve_optional<S>(
  store: &S,
  user: Uuid,
  module: &ModuleRow,
  requested_key: &str,
  courses: &[Value],
) -> Result<bool, ApiError>
where
  S: ProgressStore,
{
  for course in courses {
    for subject in
      course.get("subjects").and_then(Value::as_array).into_iter().flatten()
    {
      for candidate in path_doc::extract_modules(subject) {
        if matches_module(&candidate, module, requested_key) {
          return Ok(!path_doc::is_mandatory_module(&candidate));
        }
      }
    }
  }

  let ids = vec![module.id.clone()];
  let rows = store
    .module_statuses(user, &ids)
    .await
    .map_err(|e| ApiError::store("module_status_fetch_failed", e))?;
  Ok(rows.first().is_some_and(|r| r.status.is_optional()))
}

/// A stored-path module value may carry the primary key, the slug, or
/// the raw key the client sent.
fn matches_module(
  candidate: &Value,
  module: &ModuleRow,
  requested_key: &str,
) -> bool {
  path_doc::module_matches(candidate, &module.id)
    || path_doc::module_matches(candidate, requested_key)
    || module
      .slug
      .as_deref()
      .is_some_and(|slug| path_doc::module_matches(candidate, slug))
}

// ─── Document rewrite ────────────────────────────────────────────────────────

/// OR-merge the activity flag for this update into the module's
/// `activity` object; flags only ever flip to true.
fn merge_activity(module: &mut Map<String, Value>, kind: &ActivityKind) {
  let activity = module
    .entry("activity")
    .or_insert_with(|| Value::Object(Map::new()));
  let Some(activity) = activity.as_object_mut() else { return };
  let key = match kind {
    ActivityKind::Lecture => "viewedLecture",
    ActivityKind::Quiz => "attemptedQuiz",
    ActivityKind::Exercise => "attemptedExercise",
  };
  activity.insert(key.into(), Value::Bool(true));
}

#[allow(clippy::too_many_arguments)]
fn rewrite_document(
  courses: Vec<Value>,
  module: &ModuleRow,
  requested_key: &str,
  activity: &ActivityKind,
  completed: bool,
  percent: i64,
  correctness_percentage: Option<f64>,
  optional: bool,
) -> Vec<Value> {
  let mut out = Vec::with_capacity(courses.len());
  for course in courses {
    let subjects = course
      .get("subjects")
      .and_then(Value::as_array)
      .cloned()
      .unwrap_or_default();

    let mut out_subjects = Vec::with_capacity(subjects.len());
    for subject in subjects {
      let mut modules = path_doc::extract_modules(&subject);
      let mut touched = false;
      for value in &mut modules {
        if !matches_module(value, module, requested_key) {
          continue;
        }
        touched = true;
        if let Some(obj) = value.as_object_mut() {
          obj.insert("completed".into(), Value::Bool(completed));
          obj.insert("progress".into(), json!(percent));
          if let Some(correctness) = correctness_percentage {
            obj.insert("correctness_percentage".into(), json!(correctness));
          }
          let status = if optional { "optional" } else { "mandatory" };
          obj.insert("status".into(), Value::String(status.into()));
          merge_activity(obj, activity);
        }
      }

      let mut modules = path_doc::apply_module_activation(modules);
      if touched && completed {
        path_doc::unlock_next_after(&mut modules, &module.id);
      }

      let mut subject_obj =
        subject.as_object().cloned().unwrap_or_else(Map::new);
      subject_obj.insert("modules".into(), Value::Array(modules));
      out_subjects.push(Value::Object(subject_obj));
    }

    let mut course_obj = course.as_object().cloned().unwrap_or_else(Map::new);
    course_obj.insert("subjects".into(), Value::Array(out_subjects));
    out.push(Value::Object(course_obj));
  }
  out
}
