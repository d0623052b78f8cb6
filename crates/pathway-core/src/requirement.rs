//! Requirement Evaluator — per-section satisfaction of the three
//! requirement categories (lecture-watch, assessment, exercise).
//!
//! The evaluator is a pure function over pre-fetched evidence; all
//! store round trips happen before it runs. Overrides from
//! [`crate::policy`] are applied as the final step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::policy;

// ─── Evidence ────────────────────────────────────────────────────────────────

/// Per-exercise evidence within a section.
#[derive(Debug, Clone, Default)]
pub struct ExerciseEvidence {
  pub exercise_id:        String,
  pub total_questions:    usize,
  /// Distinct questions with at least one submission, any correctness.
  pub answered_questions: usize,
  /// An explicit `completed` progress record exists. Counts even when
  /// not every question has a submission (mentor-chat and generated
  /// flows mark completion directly).
  pub progress_completed: bool,
}

impl ExerciseEvidence {
  pub fn fully_answered(&self) -> bool {
    self.total_questions > 0 && self.answered_questions >= self.total_questions
  }

  pub fn completed(&self) -> bool {
    self.progress_completed || self.fully_answered()
  }
}

/// Everything the evaluator needs to know about one section.
#[derive(Debug, Clone, Default)]
pub struct SectionEvidence {
  pub section_id:    String,
  pub subject_title: Option<String>,
  pub section_title: Option<String>,
  /// The very first section of the very first module in its subject —
  /// the onboarding section, gated only by its lectures.
  pub first_of_first_module: bool,

  pub total_lectures:   usize,
  pub watched_lectures: usize,

  pub exercises: Vec<ExerciseEvidence>,
  /// Distinct inline exercise-question ids across the section.
  pub total_exercise_questions:    usize,
  /// Distinct exercise questions answered at least once.
  pub answered_exercise_questions: usize,

  pub total_quiz_questions:           usize,
  pub answered_static_quiz_questions: usize,
  /// A basic (static) quiz attempt record exists for the section.
  pub basic_quiz_attempted:           bool,
  /// Highest `current_question_number` over finished adaptive sessions.
  pub adaptive_question_target:       i64,
  /// Distinct adaptive-answered questions in the section.
  pub answered_adaptive_questions:    usize,
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// The derived requirement status for one section. Never stored —
/// recomputed from evidence on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRequirementSummary {
  pub lectures_satisfied: bool,
  /// Assessment category satisfaction (basic attempt OR adaptive bar).
  pub adaptive_satisfied: bool,
  pub exercise_satisfied: bool,

  pub total_exercises:     usize,
  pub completed_exercises: usize,
  pub exercise_statuses:   BTreeMap<String, bool>,

  pub total_quiz_questions:    usize,
  pub answered_quiz_questions: usize,
  /// Static-quiz coverage, informational only.
  pub quiz_satisfied:          bool,

  pub quiz_applicable:     bool,
  pub lectures_applicable: bool,
  pub exercise_applicable: bool,
  pub lecture_count:       usize,

  pub met_count:        usize,
  pub total_count:      usize,
  pub completed:        bool,
  pub progress_percent: i64,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub subject_title: Option<String>,
}

/// `round(100 * met / total)`, vacuously 100 when nothing applies.
fn percent(met: usize, total: usize) -> i64 {
  if total == 0 {
    100
  } else {
    ((met as f64 / total as f64) * 100.0).round() as i64
  }
}

/// Evaluate one section's requirement summary from its evidence.
pub fn evaluate(evidence: &SectionEvidence) -> SectionRequirementSummary {
  let total_exercises = evidence.exercises.len();

  let mut exercise_statuses = BTreeMap::new();
  let mut completed_exercises = 0;
  let mut has_fully_answered_exercise = false;
  for exercise in &evidence.exercises {
    let completed = exercise.completed();
    exercise_statuses.insert(exercise.exercise_id.clone(), completed);
    if completed {
      completed_exercises += 1;
    }
    if exercise.fully_answered() {
      has_fully_answered_exercise = true;
    }
  }

  let answered_all_inline_questions = evidence.total_exercise_questions > 0
    && evidence.answered_exercise_questions >= evidence.total_exercise_questions;

  let mut lectures_satisfied = evidence.total_lectures > 0
    && evidence.watched_lectures >= evidence.total_lectures;

  let mut assessment_satisfied = evidence.basic_quiz_attempted
    || (evidence.adaptive_question_target > 0
      && evidence.answered_adaptive_questions as i64
        >= evidence.adaptive_question_target);

  // Satisfied when the section has recorded exercises and one of them
  // is fully answered, or — with only inline questions — when every
  // inline question has been answered at least once.
  let mut exercise_satisfied = if total_exercises > 0 {
    has_fully_answered_exercise
  } else {
    answered_all_inline_questions
  };

  let mut lectures_applicable = evidence.total_lectures > 0;
  // With static questions the assessment is applicable outright; with
  // none, the adaptive flow is the only path and the requirement is
  // still shown rather than waiting for a session row. Net effect:
  // applicable unless the onboarding exception or a policy rule says
  // otherwise.
  let mut assessment_applicable = true;
  let mut exercise_applicable =
    total_exercises > 0 || evidence.total_exercise_questions > 0;

  if evidence.first_of_first_module {
    assessment_applicable = false;
    exercise_applicable = false;
  }

  let effect = policy::lookup(
    evidence.subject_title.as_deref(),
    evidence.section_title.as_deref(),
  );
  if effect.exercise_any_completed {
    exercise_satisfied = completed_exercises >= 1;
  }
  if let Some(v) = effect.lectures_satisfied {
    lectures_satisfied = v;
  }
  if let Some(v) = effect.assessment_satisfied {
    assessment_satisfied = v;
  }
  if let Some(v) = effect.exercise_satisfied {
    exercise_satisfied = v;
  }
  if let Some(v) = effect.lectures_applicable {
    lectures_applicable = v;
  }
  if let Some(v) = effect.assessment_applicable {
    assessment_applicable = v;
  }
  if let Some(v) = effect.exercise_applicable {
    exercise_applicable = v;
  }

  let categories = [
    (lectures_applicable, lectures_satisfied),
    (assessment_applicable, assessment_satisfied),
    (exercise_applicable, exercise_satisfied),
  ];
  let total_count = categories.iter().filter(|(a, _)| *a).count();
  let met_count = categories.iter().filter(|(a, s)| *a && *s).count();

  SectionRequirementSummary {
    lectures_satisfied,
    adaptive_satisfied: assessment_satisfied,
    exercise_satisfied,
    total_exercises,
    completed_exercises,
    exercise_statuses,
    total_quiz_questions: evidence.total_quiz_questions,
    answered_quiz_questions: evidence.answered_static_quiz_questions,
    quiz_satisfied: evidence.total_quiz_questions > 0
      && evidence.answered_static_quiz_questions
        >= evidence.total_quiz_questions,
    quiz_applicable: assessment_applicable,
    lectures_applicable,
    exercise_applicable,
    lecture_count: evidence.total_lectures,
    met_count,
    total_count,
    completed: met_count == total_count,
    progress_percent: percent(met_count, total_count),
    subject_title: evidence.subject_title.clone(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base() -> SectionEvidence {
    SectionEvidence { section_id: "s1".into(), ..Default::default() }
  }

  #[test]
  fn vacuous_section_is_complete() {
    // No lectures, no exercises, and the onboarding exception strips
    // the assessment requirement: nothing applies.
    let evidence =
      SectionEvidence { first_of_first_module: true, ..base() };
    let summary = evaluate(&evidence);
    assert_eq!(summary.total_count, 0);
    assert!(summary.completed);
    assert_eq!(summary.progress_percent, 100);
  }

  #[test]
  fn lectures_watched_but_adaptive_pending() {
    // 3/3 lectures watched, no exercises, no adaptive session ever
    // recorded: assessment still applicable (adaptive-only default)
    // and unsatisfied, so the section is incomplete at 50%.
    let evidence = SectionEvidence {
      total_lectures: 3,
      watched_lectures: 3,
      ..base()
    };
    let summary = evaluate(&evidence);
    assert!(summary.lectures_satisfied);
    assert!(!summary.exercise_applicable);
    assert!(summary.quiz_applicable);
    assert!(!summary.adaptive_satisfied);
    assert!(!summary.completed);
    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.met_count, 1);
    assert_eq!(summary.progress_percent, 50);
  }

  #[test]
  fn basic_attempt_and_adaptive_bar_are_alternatives() {
    let attempted = SectionEvidence { basic_quiz_attempted: true, ..base() };
    assert!(evaluate(&attempted).adaptive_satisfied);

    let adaptive = SectionEvidence {
      adaptive_question_target: 5,
      answered_adaptive_questions: 5,
      ..base()
    };
    assert!(evaluate(&adaptive).adaptive_satisfied);

    let short = SectionEvidence {
      adaptive_question_target: 5,
      answered_adaptive_questions: 4,
      ..base()
    };
    assert!(!evaluate(&short).adaptive_satisfied);
  }

  #[test]
  fn exercise_satisfied_counts_answers_not_correctness() {
    // One exercise, one question, answered incorrectly: "answered" is
    // the bar, so the requirement is met.
    let evidence = SectionEvidence {
      exercises: vec![ExerciseEvidence {
        exercise_id: "e1".into(),
        total_questions: 1,
        answered_questions: 1,
        progress_completed: false,
      }],
      total_exercise_questions: 1,
      answered_exercise_questions: 1,
      ..base()
    };
    let summary = evaluate(&evidence);
    assert!(summary.exercise_satisfied);
    assert_eq!(summary.completed_exercises, 1);
    assert_eq!(summary.exercise_statuses.get("e1"), Some(&true));
  }

  #[test]
  fn explicit_progress_record_completes_an_exercise() {
    let evidence = SectionEvidence {
      exercises: vec![ExerciseEvidence {
        exercise_id: "e1".into(),
        total_questions: 4,
        answered_questions: 0,
        progress_completed: true,
      }],
      total_exercise_questions: 4,
      ..base()
    };
    let summary = evaluate(&evidence);
    // Completed via the progress record, but not fully answered, so the
    // generic exercise bar is still unmet.
    assert_eq!(summary.completed_exercises, 1);
    assert!(!summary.exercise_satisfied);
  }

  #[test]
  fn inline_questions_without_exercises_require_full_coverage() {
    let partial = SectionEvidence {
      total_exercise_questions: 3,
      answered_exercise_questions: 2,
      ..base()
    };
    assert!(!evaluate(&partial).exercise_satisfied);

    let full = SectionEvidence {
      total_exercise_questions: 3,
      answered_exercise_questions: 3,
      ..base()
    };
    assert!(evaluate(&full).exercise_satisfied);
  }

  #[test]
  fn onboarding_section_is_gated_by_lectures_only() {
    let evidence = SectionEvidence {
      first_of_first_module: true,
      total_lectures: 2,
      watched_lectures: 1,
      exercises: vec![ExerciseEvidence {
        exercise_id: "e1".into(),
        total_questions: 1,
        answered_questions: 0,
        progress_completed: false,
      }],
      total_exercise_questions: 1,
      ..base()
    };
    let summary = evaluate(&evidence);
    assert!(!summary.quiz_applicable);
    assert!(!summary.exercise_applicable);
    assert_eq!(summary.total_count, 1);
    assert!(!summary.completed);
  }

  #[test]
  fn any_completed_override_lowers_the_exercise_bar() {
    // Subject-wide rule: one completed exercise suffices even when
    // another exercise is untouched.
    let evidence = SectionEvidence {
      subject_title: Some("Art of Problem Solving".into()),
      exercises: vec![
        ExerciseEvidence {
          exercise_id: "e1".into(),
          total_questions: 2,
          answered_questions: 0,
          progress_completed: true,
        },
        ExerciseEvidence {
          exercise_id: "e2".into(),
          total_questions: 2,
          answered_questions: 0,
          progress_completed: false,
        },
      ],
      total_exercise_questions: 4,
      ..base()
    };
    let summary = evaluate(&evidence);
    assert!(summary.exercise_satisfied);
    assert!(!summary.quiz_applicable);
  }

  #[test]
  fn forced_satisfaction_rule_completes_the_section() {
    let evidence = SectionEvidence {
      subject_title: Some("Python".into()),
      section_title: Some("Practice Exercise".into()),
      total_lectures: 3,
      watched_lectures: 0,
      ..base()
    };
    let summary = evaluate(&evidence);
    assert!(summary.lectures_satisfied);
    assert!(summary.adaptive_satisfied);
    assert!(summary.completed);
  }

  #[test]
  fn static_quiz_coverage_is_reported_separately() {
    let evidence = SectionEvidence {
      total_quiz_questions: 4,
      answered_static_quiz_questions: 4,
      ..base()
    };
    let summary = evaluate(&evidence);
    assert!(summary.quiz_satisfied);
    // Coverage alone does not satisfy the assessment category.
    assert!(!summary.adaptive_satisfied);
  }
}
