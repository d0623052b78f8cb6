//! `POST /learning-path/section-status`.

use axum::{Json, extract::State};
use pathway_core::store::ProgressStore;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, auth::CurrentUser, error::ApiError, evidence};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStatusBody {
  pub section_ids: Vec<String>,
}

/// Evaluate the requirement summary of every requested section in one
/// batch, plus the caller's recent finished adaptive sessions.
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<SectionStatusBody>,
) -> Result<Json<Value>, ApiError>
where
  S: ProgressStore + Clone + Send + Sync + 'static,
{
  let batch =
    evidence::gather(state.store.as_ref(), user, &body.section_ids).await?;

  Ok(Json(json!({
    "statuses":               batch.statuses(),
    "adaptiveSessionHistory": batch.history,
  })))
}
