//! Activity rows — per-user evidence the engine aggregates.
//!
//! Read-side rows are the minimal projections the evaluator needs;
//! write-side `New*` inputs mirror the upsert/insert shapes backends
//! persist. Submission tables are append-only; progress tables are
//! upsert-by-key so recomputation never duplicates rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::curriculum::ModuleRequirement;

/// Fraction of a lecture that must be played for it to count as watched.
pub const WATCHED_THRESHOLD: f64 = 0.95;

/// Distinct module-scoped quiz questions required by the legacy
/// module-completion signal.
pub const LEGACY_QUIZ_QUESTION_BAR: u64 = 10;

/// The kind of learner activity a progress update reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
  Lecture,
  Quiz,
  Exercise,
}

/// A lecture counts as watched once ~95% of it has been played.
pub fn lecture_is_watched(
  watched_seconds: Option<i64>,
  duration_seconds: Option<i64>,
) -> bool {
  match (watched_seconds, duration_seconds) {
    (Some(w), Some(d)) if d > 0 => (w as f64) / (d as f64) >= WATCHED_THRESHOLD,
    _ => false,
  }
}

// ─── Read-side rows ──────────────────────────────────────────────────────────

/// A watched-lecture row (`is_watched = true` only).
#[derive(Debug, Clone)]
pub struct WatchedLectureRow {
  pub section_id: String,
  pub lecture_id: String,
}

/// One answered adaptive-quiz question, unique per (user, section, question).
#[derive(Debug, Clone)]
pub struct QuizAttemptRow {
  pub section_id:  String,
  pub question_id: Option<String>,
}

/// A whole-quiz attempt record written by the static quiz flow, unique
/// per (user, quiz). Distinct from per-question answer rows: only this
/// record marks the basic assessment path taken.
#[derive(Debug, Clone)]
pub struct BasicQuizAttemptRow {
  pub section_id: String,
  pub quiz_id:    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveSessionStatus {
  InProgress,
  Completed,
  Stopped,
}

impl AdaptiveSessionStatus {
  pub fn parse(value: &str) -> Option<Self> {
    match value {
      "in_progress" => Some(Self::InProgress),
      "completed" => Some(Self::Completed),
      "stopped" => Some(Self::Stopped),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::InProgress => "in_progress",
      Self::Completed => "completed",
      Self::Stopped => "stopped",
    }
  }

  /// Finished sessions are the only ones that count toward requirements.
  pub fn is_finished(self) -> bool {
    matches!(self, Self::Completed | Self::Stopped)
  }
}

/// An adaptive-quiz session; `current_question_number` only ever grows.
#[derive(Debug, Clone)]
pub struct AdaptiveSessionRow {
  pub id:                      String,
  pub section_id:              String,
  pub status:                  AdaptiveSessionStatus,
  pub current_question_number: i64,
  pub created_at:              Option<DateTime<Utc>>,
  pub updated_at:              Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AdaptiveResponseRow {
  pub session_id:  String,
  pub is_correct:  Option<bool>,
  pub user_answer: Option<String>,
}

/// One exercise-question submission; append-only, most recent wins.
#[derive(Debug, Clone)]
pub struct ExerciseSubmissionRow {
  pub exercise_id:  String,
  pub question_id:  String,
  pub submitted_at: Option<DateTime<Utc>>,
}

/// A module-scoped exercise submission used by the legacy completion path.
#[derive(Debug, Clone)]
pub struct ModuleExerciseSubmissionRow {
  pub question_id: Option<String>,
  pub is_correct:  Option<bool>,
}

/// Explicit per-exercise progress marker (`completed` or not).
#[derive(Debug, Clone)]
pub struct ExerciseProgressRow {
  pub exercise_id: String,
  pub completed:   bool,
}

/// The single upserted per-(user, module) status row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleStatusRow {
  pub module_id:              String,
  pub status:                 ModuleRequirement,
  pub correctness_percentage: Option<f64>,
  pub progress:               Option<i64>,
}

// ─── Write-side inputs ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewLectureProgress {
  pub user_id:          Uuid,
  pub course_id:        Option<String>,
  pub subject_id:       Option<String>,
  pub module_id:        String,
  pub section_id:       String,
  pub lecture_id:       String,
  pub watched_seconds:  Option<i64>,
  pub duration_seconds: Option<i64>,
  pub is_watched:       bool,
}

#[derive(Debug, Clone)]
pub struct NewQuizAttempt {
  pub user_id:     Uuid,
  pub course_id:   Option<String>,
  pub subject_id:  Option<String>,
  pub module_id:   String,
  pub section_id:  String,
  pub question_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBasicQuizAttempt {
  pub user_id:    Uuid,
  pub section_id: String,
  pub quiz_id:    String,
}

#[derive(Debug, Clone)]
pub struct NewExerciseSubmission {
  pub user_id:     Uuid,
  pub course_id:   Option<String>,
  pub subject_id:  Option<String>,
  pub module_id:   String,
  pub section_id:  String,
  pub exercise_id: Option<String>,
  pub question_id: Option<String>,
  pub is_correct:  Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewExerciseQuestionSubmission {
  pub user_id:     Uuid,
  pub exercise_id: String,
  pub question_id: String,
  pub user_answer: Option<String>,
  pub is_correct:  bool,
}

#[derive(Debug, Clone)]
pub struct NewModuleStatus {
  pub user_id:                Uuid,
  pub module_id:              String,
  pub status:                 ModuleRequirement,
  pub correctness_percentage: Option<f64>,
  /// Clamped to 0–100 by the store.
  pub progress:               i64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn watched_threshold() {
    assert!(lecture_is_watched(Some(95), Some(100)));
    assert!(!lecture_is_watched(Some(94), Some(100)));
    assert!(!lecture_is_watched(Some(10), Some(0)));
    assert!(!lecture_is_watched(None, Some(100)));
  }
}
