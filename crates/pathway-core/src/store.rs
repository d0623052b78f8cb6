//! The `ProgressStore` trait.
//!
//! Implemented by storage backends (e.g. `pathway-store-sqlite`). The
//! API layer depends on this abstraction, not on any concrete backend.
//! Batch reads take id slices so backends can chunk large `IN` lists;
//! callers pass every id they need in one call.

use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

use crate::{
  activity::{
    AdaptiveResponseRow, AdaptiveSessionRow, BasicQuizAttemptRow,
    ExerciseProgressRow, ExerciseSubmissionRow, ModuleExerciseSubmissionRow,
    ModuleStatusRow, NewBasicQuizAttempt, NewExerciseQuestionSubmission,
    NewExerciseSubmission, NewLectureProgress, NewModuleStatus, NewQuizAttempt,
    QuizAttemptRow, WatchedLectureRow,
  },
  curriculum::{
    CourseRow, ExerciseQuestionRef, ExerciseRef, LectureRef, ModuleRow,
    QuizQuestionRef, QuizRef, SectionMeta, SubjectRow,
  },
};

/// Abstraction over a progress store backend.
///
/// Reads are plain projections; submission writes are append-only while
/// progress writes are upsert-by-key, so recomputing and re-persisting a
/// derived status never duplicates rows.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ProgressStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Resolve a bearer token to the user it authenticates, if any.
  fn resolve_session<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + 'a;

  // ── Curriculum reads ──────────────────────────────────────────────────

  /// Look up a module by primary key, falling back to slug. Progress
  /// updates may address a module either way.
  fn resolve_module<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<ModuleRow>, Self::Error>> + Send + 'a;

  fn course<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<CourseRow>, Self::Error>> + Send + 'a;

  fn subject<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<SubjectRow>, Self::Error>> + Send + 'a;

  fn section<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<SectionMeta>, Self::Error>> + Send + 'a;

  /// All sections of a module, unordered; callers sort for display.
  fn sections_of_module<'a>(
    &'a self,
    module_id: &'a str,
  ) -> impl Future<Output = Result<Vec<SectionMeta>, Self::Error>> + Send + 'a;

  // ── Fallback curriculum tree ──────────────────────────────────────────
  // Used to synthesise a path when a user has no stored document.

  fn all_courses(
    &self,
  ) -> impl Future<Output = Result<Vec<CourseRow>, Self::Error>> + Send + '_;

  fn subjects_of_course<'a>(
    &'a self,
    course_id: &'a str,
  ) -> impl Future<Output = Result<Vec<SubjectRow>, Self::Error>> + Send + 'a;

  fn modules_of_subject<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Vec<ModuleRow>, Self::Error>> + Send + 'a;

  // ── Content reads ─────────────────────────────────────────────────────

  fn lectures_in_sections<'a>(
    &'a self,
    section_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<LectureRef>, Self::Error>> + Send + 'a;

  fn quizzes_in_sections<'a>(
    &'a self,
    section_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<QuizRef>, Self::Error>> + Send + 'a;

  fn quiz_questions<'a>(
    &'a self,
    quiz_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<QuizQuestionRef>, Self::Error>> + Send + 'a;

  fn exercises_in_sections<'a>(
    &'a self,
    section_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<ExerciseRef>, Self::Error>> + Send + 'a;

  fn exercise_questions<'a>(
    &'a self,
    exercise_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<ExerciseQuestionRef>, Self::Error>>
  + Send
  + 'a;

  // ── Activity reads ────────────────────────────────────────────────────

  /// Watched-lecture rows only (`is_watched` filtering happens in SQL).
  fn watched_lectures<'a>(
    &'a self,
    user_id: Uuid,
    section_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<WatchedLectureRow>, Self::Error>>
  + Send
  + 'a;

  fn quiz_attempts<'a>(
    &'a self,
    user_id: Uuid,
    section_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<QuizAttemptRow>, Self::Error>> + Send + 'a;

  /// Whole-quiz attempt records from the static quiz flow, one per
  /// (user, quiz). Separate from per-question answer rows.
  fn basic_quiz_attempts<'a>(
    &'a self,
    user_id: Uuid,
    section_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<BasicQuizAttemptRow>, Self::Error>>
  + Send
  + 'a;

  /// Distinct quiz questions the user has answered at module scope.
  /// Feeds the legacy completion signal.
  fn module_quiz_attempt_count<'a>(
    &'a self,
    user_id: Uuid,
    module_id: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  fn adaptive_sessions<'a>(
    &'a self,
    user_id: Uuid,
    section_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<AdaptiveSessionRow>, Self::Error>>
  + Send
  + 'a;

  fn adaptive_responses<'a>(
    &'a self,
    session_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<AdaptiveResponseRow>, Self::Error>>
  + Send
  + 'a;

  fn exercise_submissions<'a>(
    &'a self,
    user_id: Uuid,
    exercise_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<ExerciseSubmissionRow>, Self::Error>>
  + Send
  + 'a;

  fn exercise_progress<'a>(
    &'a self,
    user_id: Uuid,
    exercise_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<ExerciseProgressRow>, Self::Error>>
  + Send
  + 'a;

  fn module_exercise_submissions<'a>(
    &'a self,
    user_id: Uuid,
    module_id: &'a str,
  ) -> impl Future<
    Output = Result<Vec<ModuleExerciseSubmissionRow>, Self::Error>,
  > + Send
  + 'a;

  fn module_statuses<'a>(
    &'a self,
    user_id: Uuid,
    module_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<ModuleStatusRow>, Self::Error>> + Send + 'a;

  // ── Activity writes ───────────────────────────────────────────────────

  /// Upsert by (user, lecture); re-reporting the same lecture only ever
  /// raises the watched position.
  fn record_lecture_progress(
    &self,
    input: NewLectureProgress,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert by (user, section, question).
  fn record_quiz_attempt(
    &self,
    input: NewQuizAttempt,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert by (user, quiz); re-submitting the same quiz is a no-op.
  fn record_basic_quiz_attempt(
    &self,
    input: NewBasicQuizAttempt,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Append-only; history is preserved and most recent wins on read.
  fn record_exercise_submission(
    &self,
    input: NewExerciseSubmission,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Append-only per-question submission for structured exercises.
  fn record_exercise_question_submission(
    &self,
    input: NewExerciseQuestionSubmission,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert the single per-(user, module) status row and return it as
  /// persisted. Progress is clamped to 0–100.
  fn upsert_module_status(
    &self,
    input: NewModuleStatus,
  ) -> impl Future<Output = Result<ModuleStatusRow, Self::Error>> + Send + '_;

  // ── Path document ─────────────────────────────────────────────────────

  /// The user's stored path document, verbatim. `None` when the user
  /// has never been assigned one.
  fn load_path(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + '_;

  /// Replace the stored path document wholesale.
  fn replace_path<'a>(
    &'a self,
    user_id: Uuid,
    document: &'a Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
