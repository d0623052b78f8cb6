//! Curriculum rows — the relational shapes the engine derives views over.
//!
//! The engine never owns curriculum data. Ids are opaque strings: callers
//! may address modules by primary key or by slug, and stored path
//! documents carry whichever form they were generated with.

use serde::{Deserialize, Serialize};

// ─── Requirement status ──────────────────────────────────────────────────────

/// Whether a module gates the modules after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleRequirement {
  #[default]
  Mandatory,
  Optional,
}

impl ModuleRequirement {
  /// Anything other than a case-insensitive `"optional"` is mandatory.
  pub fn parse(value: Option<&str>) -> Self {
    match value {
      Some(s) if s.eq_ignore_ascii_case("optional") => Self::Optional,
      _ => Self::Mandatory,
    }
  }

  pub fn is_optional(self) -> bool { matches!(self, Self::Optional) }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Mandatory => "mandatory",
      Self::Optional => "optional",
    }
  }
}

// ─── Hierarchy rows ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRow {
  pub id:          String,
  pub title:       String,
  pub order_index: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectRow {
  pub id:          String,
  pub title:       String,
  pub course_id:   String,
  pub order_index: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRow {
  pub id:          String,
  pub title:       String,
  pub subject_id:  String,
  /// Optional human-readable alias; progress updates may address a
  /// module by slug instead of id.
  pub slug:        Option<String>,
  pub order_index: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMeta {
  pub id:          String,
  pub module_id:   String,
  pub title:       Option<String>,
  pub order_index: Option<f64>,
}

// ─── Content refs ────────────────────────────────────────────────────────────
// Thin (id, parent) pairs — all the evaluator needs from content tables.

#[derive(Debug, Clone)]
pub struct LectureRef {
  pub id:         String,
  pub section_id: String,
}

#[derive(Debug, Clone)]
pub struct QuizRef {
  pub id:         String,
  pub section_id: String,
}

#[derive(Debug, Clone)]
pub struct QuizQuestionRef {
  pub id:      String,
  pub quiz_id: String,
}

#[derive(Debug, Clone)]
pub struct ExerciseRef {
  pub id:         String,
  pub section_id: String,
}

#[derive(Debug, Clone)]
pub struct ExerciseQuestionRef {
  pub id:          String,
  pub exercise_id: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn requirement_parse_defaults_to_mandatory() {
    assert_eq!(ModuleRequirement::parse(None), ModuleRequirement::Mandatory);
    assert_eq!(
      ModuleRequirement::parse(Some("weird")),
      ModuleRequirement::Mandatory
    );
    assert_eq!(
      ModuleRequirement::parse(Some("OPTIONAL")),
      ModuleRequirement::Optional
    );
  }
}
