//! Requirement override policy — business exceptions keyed by subject
//! and section title, applied as the final evaluation step.
//!
//! These started life as one-off fixups for specific content; keeping
//! them in one declarative table makes each rule auditable and
//! independently testable. Several look like content repairs rather
//! than product rules — confirm with product before adding more.

/// A partial override of the generic requirement computation.
/// `None` fields leave the computed value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideEffect {
  pub lectures_satisfied:    Option<bool>,
  pub assessment_satisfied:  Option<bool>,
  pub exercise_satisfied:    Option<bool>,
  pub lectures_applicable:   Option<bool>,
  pub assessment_applicable: Option<bool>,
  pub exercise_applicable:   Option<bool>,
  /// Swap the exercise bar from "one exercise fully answered" to "any
  /// exercise completed". Evaluated before the flag overrides above.
  pub exercise_any_completed: bool,
}

impl OverrideEffect {
  /// Layer `later` on top of `self`; set fields in `later` win.
  fn merged(self, later: Self) -> Self {
    Self {
      lectures_satisfied:    later.lectures_satisfied.or(self.lectures_satisfied),
      assessment_satisfied:  later.assessment_satisfied.or(self.assessment_satisfied),
      exercise_satisfied:    later.exercise_satisfied.or(self.exercise_satisfied),
      lectures_applicable:   later.lectures_applicable.or(self.lectures_applicable),
      assessment_applicable: later.assessment_applicable.or(self.assessment_applicable),
      exercise_applicable:   later.exercise_applicable.or(self.exercise_applicable),
      exercise_any_completed: self.exercise_any_completed
        || later.exercise_any_completed,
    }
  }
}

/// One entry in the policy table. `section: None` applies to every
/// section of the subject; section-scoped rules layer on top.
#[derive(Debug, Clone, Copy)]
pub struct OverrideRule {
  pub subject: &'static str,
  pub section: Option<&'static str>,
  pub effect:  OverrideEffect,
}

const SATISFY_ALL: OverrideEffect = OverrideEffect {
  lectures_satisfied: Some(true),
  assessment_satisfied: Some(true),
  exercise_satisfied: Some(true),
  lectures_applicable: None,
  assessment_applicable: None,
  exercise_applicable: None,
  exercise_any_completed: false,
};

const NONE: OverrideEffect = OverrideEffect {
  lectures_satisfied: None,
  assessment_satisfied: None,
  exercise_satisfied: None,
  lectures_applicable: None,
  assessment_applicable: None,
  exercise_applicable: None,
  exercise_any_completed: false,
};

/// The full rule list, in application order.
pub const RULES: &[OverrideRule] = &[
  OverrideRule {
    subject: "Art of Problem Solving",
    section: None,
    effect: OverrideEffect {
      assessment_applicable: Some(false),
      exercise_any_completed: true,
      ..NONE
    },
  },
  OverrideRule {
    subject: "Art of Problem Solving",
    section: Some("Case Study"),
    effect: SATISFY_ALL,
  },
  OverrideRule {
    subject: "Google Sheets",
    section: Some("End Project Final"),
    effect: OverrideEffect {
      lectures_satisfied: Some(false),
      assessment_satisfied: Some(true),
      exercise_satisfied: Some(false),
      assessment_applicable: Some(false),
      ..NONE
    },
  },
  OverrideRule {
    subject: "Google Sheets",
    section: Some("End Project"),
    effect: OverrideEffect {
      assessment_applicable: Some(false),
      ..SATISFY_ALL
    },
  },
  OverrideRule {
    subject: "Google Sheets",
    section: Some("Pivot table - Practice Problem"),
    effect: OverrideEffect {
      lectures_satisfied: Some(false),
      assessment_satisfied: Some(true),
      exercise_satisfied: Some(true),
      ..NONE
    },
  },
  OverrideRule {
    subject: "Python",
    section: Some("Practice Exercise"),
    effect: SATISFY_ALL,
  },
  // Topic tagging is empty for this section, so no quiz can be built.
  OverrideRule {
    subject: "Python",
    section: Some("Interview Practice Questions"),
    effect: OverrideEffect { assessment_applicable: Some(false), ..NONE },
  },
];

/// Look up the merged override for a section. Titles are matched after
/// trimming; subject-wide rules apply first, section rules layer on top.
pub fn lookup(
  subject_title: Option<&str>,
  section_title: Option<&str>,
) -> OverrideEffect {
  let subject = subject_title.map(str::trim).unwrap_or("");
  let section = section_title.map(str::trim);

  let mut effect = OverrideEffect::default();
  for rule in RULES {
    if rule.subject != subject {
      continue;
    }
    let matches = match rule.section {
      None => true,
      Some(scoped) => section == Some(scoped),
    };
    if matches {
      effect = effect.merged(rule.effect);
    }
  }
  effect
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn no_rule_means_no_override() {
    assert_eq!(lookup(Some("Rust"), Some("Ownership")), OverrideEffect::default());
    assert_eq!(lookup(None, None), OverrideEffect::default());
  }

  #[test]
  fn subject_wide_rule_applies_to_every_section() {
    let effect = lookup(Some("Art of Problem Solving"), Some("Anything"));
    assert_eq!(effect.assessment_applicable, Some(false));
    assert!(effect.exercise_any_completed);
    assert_eq!(effect.exercise_satisfied, None);
  }

  #[test]
  fn section_rule_layers_on_top_of_subject_rule() {
    let effect = lookup(Some("Art of Problem Solving"), Some("Case Study"));
    assert_eq!(effect.assessment_applicable, Some(false));
    assert_eq!(effect.lectures_satisfied, Some(true));
    assert_eq!(effect.assessment_satisfied, Some(true));
    assert_eq!(effect.exercise_satisfied, Some(true));
    assert!(effect.exercise_any_completed);
  }

  #[test]
  fn titles_are_trimmed_before_matching() {
    let effect = lookup(Some(" Google Sheets "), Some(" End Project Final "));
    assert_eq!(effect.assessment_satisfied, Some(true));
    assert_eq!(effect.lectures_satisfied, Some(false));
  }
}
