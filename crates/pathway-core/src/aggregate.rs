//! Module Completion Aggregator — combines a module's sections into a
//! single completion signal and a 0–100 progress percentage.
//!
//! Two strategies coexist. The snapshot strategy sums coarse unit
//! counts in bulk and only feeds the persisted `progress` number. The
//! section-rollup strategy averages fresh per-section completion and,
//! when available, overrides the snapshot. Optional modules bypass
//! both: always complete, always 100.

use serde::{Deserialize, Serialize};

// ─── Snapshot strategy ───────────────────────────────────────────────────────

/// Bulk per-module counters gathered in one pass over the store.
#[derive(Debug, Clone, Default)]
pub struct ModuleProgressSnapshot {
  pub total_lectures:              usize,
  pub watched_lectures:            usize,
  pub total_exercise_questions:    usize,
  pub answered_exercise_questions: usize,
  pub total_adaptive_sections:     usize,
  pub completed_adaptive_sections: usize,
  pub section_ids:                 Vec<String>,
}

impl ModuleProgressSnapshot {
  /// Coarse progress approximation over all countable units.
  pub fn percent(&self) -> i64 {
    let completed = self.watched_lectures
      + self.answered_exercise_questions
      + self.completed_adaptive_sections;
    let total = self.total_lectures
      + self.total_exercise_questions
      + self.total_adaptive_sections;
    if total == 0 {
      0
    } else {
      ((completed as f64 / total as f64) * 100.0).round() as i64
    }
  }
}

// ─── Section-rollup strategy ─────────────────────────────────────────────────

/// Fresh per-section completion counts for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRollup {
  pub total:     usize,
  pub completed: usize,
}

impl SectionRollup {
  pub fn percent(&self) -> i64 {
    if self.total == 0 {
      0
    } else {
      ((self.completed as f64 / self.total as f64) * 100.0).round() as i64
    }
  }

  /// Vacuously complete when the module has no sections.
  pub fn all_complete(&self) -> bool { self.completed >= self.total }
}

/// The persisted progress number: rollup when available, else snapshot.
pub fn effective_percent(
  snapshot: &ModuleProgressSnapshot,
  rollup: Option<SectionRollup>,
) -> i64 {
  rollup.map(|r| r.percent()).unwrap_or_else(|| snapshot.percent())
}

/// Clamp a progress value into the persisted 0–100 range.
pub fn clamp_progress(value: i64) -> i64 { value.clamp(0, 100) }

// ─── Legacy completion signals ───────────────────────────────────────────────

/// The direct-count completion signals used before sections carried
/// their own requirement summaries, and still reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCompletionSignals {
  pub viewed_lecture:         bool,
  pub attempted_quiz:         bool,
  pub attempted_exercise:     bool,
  pub exercise_fully_correct: bool,
}

impl ModuleCompletionSignals {
  /// Optional modules skip derivation entirely.
  pub fn optional_bypass() -> Self {
    Self {
      viewed_lecture:         true,
      attempted_quiz:         true,
      attempted_exercise:     true,
      exercise_fully_correct: true,
    }
  }

  /// The legacy module-complete rule. Note it requires fully-correct
  /// exercises, unlike the per-section "answered" bar.
  pub fn legacy_complete(&self) -> bool {
    self.viewed_lecture && self.attempted_quiz && self.exercise_fully_correct
  }
}

/// Module completion: fresh section rollup is authoritative when
/// present, otherwise fall back to the legacy signals.
pub fn module_completed(
  signals: ModuleCompletionSignals,
  rollup: Option<SectionRollup>,
) -> bool {
  match rollup {
    Some(r) => r.all_complete(),
    None => signals.legacy_complete(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_percent_sums_all_unit_kinds() {
    let snapshot = ModuleProgressSnapshot {
      total_lectures: 4,
      watched_lectures: 2,
      total_exercise_questions: 3,
      answered_exercise_questions: 3,
      total_adaptive_sections: 3,
      completed_adaptive_sections: 1,
      section_ids: vec![],
    };
    // (2 + 3 + 1) / (4 + 3 + 3) = 60%
    assert_eq!(snapshot.percent(), 60);
  }

  #[test]
  fn empty_snapshot_is_zero_percent() {
    assert_eq!(ModuleProgressSnapshot::default().percent(), 0);
  }

  #[test]
  fn rollup_overrides_snapshot() {
    let snapshot = ModuleProgressSnapshot {
      total_lectures: 1,
      watched_lectures: 0,
      ..Default::default()
    };
    let rollup = SectionRollup { total: 2, completed: 1 };
    assert_eq!(effective_percent(&snapshot, Some(rollup)), 50);
    assert_eq!(effective_percent(&snapshot, None), 0);
  }

  #[test]
  fn sectionless_module_rolls_up_as_complete_but_zero_percent() {
    let rollup = SectionRollup { total: 0, completed: 0 };
    assert!(rollup.all_complete());
    assert_eq!(rollup.percent(), 0);
  }

  #[test]
  fn legacy_completion_requires_fully_correct_exercises() {
    let signals = ModuleCompletionSignals {
      viewed_lecture:         true,
      attempted_quiz:         true,
      attempted_exercise:     true,
      exercise_fully_correct: false,
    };
    assert!(!signals.legacy_complete());
    assert!(ModuleCompletionSignals::optional_bypass().legacy_complete());
  }

  #[test]
  fn rollup_is_authoritative_over_legacy_signals() {
    let signals = ModuleCompletionSignals {
      viewed_lecture:         false,
      attempted_quiz:         false,
      attempted_exercise:     false,
      exercise_fully_correct: false,
    };
    let done = SectionRollup { total: 2, completed: 2 };
    assert!(module_completed(signals, Some(done)));
    assert!(!module_completed(signals, None));
  }

  #[test]
  fn clamp_keeps_persisted_progress_in_range() {
    assert_eq!(clamp_progress(-5), 0);
    assert_eq!(clamp_progress(42), 42);
    assert_eq!(clamp_progress(140), 100);
  }
}
