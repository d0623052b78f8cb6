//! `GET /learning-path/me`.
//!
//! Returns the gate-annotated Course → Subject → Module tree for the
//! caller. The stored path document is the fast path; users without one
//! get a tree computed from the curriculum relations directly.

use std::collections::HashMap;

use axum::{Json, extract::State};
use pathway_core::{
  activity::ModuleStatusRow,
  ordering, path_doc,
  store::ProgressStore,
};
use serde_json::{Map, Value, json};

use crate::{AppState, auth::CurrentUser, error::ApiError};

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError>
where
  S: ProgressStore + Clone + Send + Sync + 'static,
{
  let store = state.store.as_ref();

  let document = store
    .load_path(user)
    .await
    .map_err(|e| ApiError::store("path_fetch_failed", e))?;

  let courses = match &document {
    Some(doc) => {
      let courses = path_doc::extract_courses(doc);
      if courses.is_empty() {
        tracing::warn!(%user, "stored path yielded no courses, using fallback");
      }
      courses
    }
    None => Vec::new(),
  };

  let tree = if courses.is_empty() {
    fallback_tree(store, user).await?
  } else {
    stored_tree(store, user, courses).await?
  };

  Ok(Json(Value::Array(tree)))
}

async fn module_status_map<S>(
  store: &S,
  user: uuid::Uuid,
  module_ids: &[String],
) -> Result<HashMap<String, ModuleStatusRow>, ApiError>
where
  S: ProgressStore,
{
  let rows = store
    .module_statuses(user, module_ids)
    .await
    .map_err(|e| ApiError::store("module_status_fetch_failed", e))?;
  Ok(rows.into_iter().map(|r| (r.module_id.clone(), r)).collect())
}

/// Overlay the persisted status row onto a raw module value. The row is
/// authoritative for status, correctness and progress; 100% progress
/// also marks the module completed.
fn merge_status(module: &mut Value, row: &ModuleStatusRow) {
  let Some(obj) = module.as_object_mut() else { return };
  obj.insert("status".into(), Value::String(row.status.as_str().into()));
  if let Some(correctness) = row.correctness_percentage {
    obj.insert("correctness_percentage".into(), json!(correctness));
  }
  if let Some(progress) = row.progress {
    obj.insert("progress".into(), json!(progress));
    if progress >= 100 {
      obj.insert("completed".into(), Value::Bool(true));
    }
  }
}

// ─── Stored-path flow ────────────────────────────────────────────────────────

async fn stored_tree<S>(
  store: &S,
  user: uuid::Uuid,
  courses: Vec<Value>,
) -> Result<Vec<Value>, ApiError>
where
  S: ProgressStore,
{
  let module_ids = path_doc::collect_module_ids(&courses);
  let statuses = module_status_map(store, user, &module_ids).await?;

  let courses =
    ordering::sort_by_order(courses, ordering::resolve_order_index);

  let mut out = Vec::with_capacity(courses.len());
  for course in courses {
    let subjects = course
      .get("subjects")
      .and_then(Value::as_array)
      .cloned()
      .unwrap_or_default();
    let subjects =
      ordering::sort_by_order(subjects, ordering::resolve_order_index);

    let mut out_subjects = Vec::with_capacity(subjects.len());
    for subject in subjects {
      let mut modules = path_doc::extract_modules(&subject);
      for module in &mut modules {
        if let Some(row) =
          path_doc::module_id(module).and_then(|id| statuses.get(&id))
        {
          merge_status(module, row);
        }
      }
      let modules = path_doc::refresh_stored_activation(modules);

      let mut subject_obj =
        subject.as_object().cloned().unwrap_or_else(Map::new);
      subject_obj.insert("modules".into(), Value::Array(modules));
      out_subjects.push(Value::Object(subject_obj));
    }

    let mut course_obj = course.as_object().cloned().unwrap_or_else(Map::new);
    course_obj.insert("subjects".into(), Value::Array(out_subjects));
    out.push(Value::Object(course_obj));
  }
  Ok(out)
}

// ─── Fallback flow ───────────────────────────────────────────────────────────

async fn fallback_tree<S>(
  store: &S,
  user: uuid::Uuid,
) -> Result<Vec<Value>, ApiError>
where
  S: ProgressStore,
{
  let courses = store
    .all_courses()
    .await
    .map_err(|e| ApiError::store("courses_fetch_failed", e))?;
  let courses = ordering::sort_by_order(courses, |c| c.order_index);

  let mut out = Vec::with_capacity(courses.len());
  for course in courses {
    let subjects = store
      .subjects_of_course(&course.id)
      .await
      .map_err(|e| ApiError::store("subjects_fetch_failed", e))?;
    let subjects = ordering::sort_by_order(subjects, |s| s.order_index);

    let mut out_subjects = Vec::with_capacity(subjects.len());
    for subject in subjects {
      let module_rows = store
        .modules_of_subject(&subject.id)
        .await
        .map_err(|e| ApiError::store("modules_fetch_failed", e))?;
      let module_ids: Vec<String> =
        module_rows.iter().map(|m| m.id.clone()).collect();
      let statuses = module_status_map(store, user, &module_ids).await?;

      let mut modules = Vec::with_capacity(module_rows.len());
      for row in module_rows {
        let mut module = json!({
          "id":          row.id,
          "title":       row.title,
          "slug":        row.slug,
          "order_index": row.order_index,
        });
        if let Some(status) = statuses.get(&row.id) {
          merge_status(&mut module, status);
        }
        modules.push(module);
      }
      // No stored flags to trust here, so the gate is computed fresh.
      let modules = path_doc::apply_module_activation(modules);

      out_subjects.push(json!({
        "id":          subject.id,
        "title":       subject.title,
        "order_index": subject.order_index,
        "modules":     modules,
      }));
    }

    out.push(json!({
      "id":          course.id,
      "title":       course.title,
      "order_index": course.order_index,
      "subjects":    out_subjects,
    }));
  }
  Ok(out)
}
