//! Sequential Gate Resolver — decides which units in an ordered sibling
//! list are attemptable.
//!
//! The rule, applied left to right over units already in display order:
//! optional units are always active; a mandatory unit is active while
//! every mandatory unit before it is completed; a unit whose
//! `order_index` is exactly 0 is forced active, bootstrapping the list
//! even when completion data is absent or malformed. There is no
//! terminal state — the list is re-resolved fresh on every read.

use serde::{Deserialize, Serialize};

/// Gating input for one unit (module or section).
#[derive(Debug, Clone, Copy, Default)]
pub struct GateUnit {
  pub optional:    bool,
  pub completed:   bool,
  pub order_index: Option<f64>,
}

/// Whether a unit is attemptable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
  Active,
  Inactive,
}

impl GateState {
  pub fn is_active(self) -> bool { matches!(self, Self::Active) }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Inactive => "inactive",
    }
  }
}

/// Resolve the gate state of every unit. `units` must already be in
/// display order (see [`crate::ordering::sort_by_order`]).
pub fn resolve(units: &[GateUnit]) -> Vec<GateState> {
  let mut prefix_satisfied = true;

  units
    .iter()
    .map(|unit| {
      let state = if unit.optional || unit.order_index == Some(0.0) {
        GateState::Active
      } else if prefix_satisfied {
        GateState::Active
      } else {
        GateState::Inactive
      };
      if !unit.optional {
        prefix_satisfied = prefix_satisfied && unit.completed;
      }
      state
    })
    .collect()
}

/// After the unit at `completed_index` transitions to completed, find
/// the next incomplete mandatory sibling to flip active in the same
/// response (no second round trip).
pub fn next_mandatory_to_unlock(
  units: &[GateUnit],
  completed_index: usize,
) -> Option<usize> {
  units
    .iter()
    .enumerate()
    .skip(completed_index + 1)
    .find(|(_, unit)| !unit.optional && !unit.completed)
    .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mandatory(completed: bool, order: f64) -> GateUnit {
    GateUnit { optional: false, completed, order_index: Some(order) }
  }

  fn optional(order: f64) -> GateUnit {
    GateUnit { optional: true, completed: false, order_index: Some(order) }
  }

  #[test]
  fn incomplete_first_mandatory_blocks_second() {
    let states = resolve(&[mandatory(false, 0.0), mandatory(false, 1.0)]);
    assert_eq!(states, vec![GateState::Active, GateState::Inactive]);
  }

  #[test]
  fn optional_never_blocks() {
    let states = resolve(&[optional(0.0), mandatory(false, 1.0)]);
    assert_eq!(states, vec![GateState::Active, GateState::Active]);
  }

  #[test]
  fn active_set_is_completed_prefix_plus_one_plus_optionals() {
    let units = [
      mandatory(true, 0.0),
      optional(1.0),
      mandatory(true, 2.0),
      mandatory(false, 3.0),
      optional(4.0),
      mandatory(false, 5.0),
    ];
    let states = resolve(&units);
    let active: Vec<bool> = states.iter().map(|s| s.is_active()).collect();
    // Completed mandatory prefix + the first incomplete mandatory unit
    // + every optional unit; nothing after the frontier.
    assert_eq!(active, vec![true, true, true, true, true, false]);
  }

  #[test]
  fn order_zero_forces_active_regardless_of_prefix() {
    let units = [
      mandatory(false, 1.0),
      // Malformed data: a later sibling carrying order 0.
      mandatory(false, 0.0),
      mandatory(false, 2.0),
    ];
    let states = resolve(&units);
    assert_eq!(
      states,
      vec![GateState::Active, GateState::Active, GateState::Inactive]
    );
  }

  #[test]
  fn missing_order_does_not_force() {
    let units = [
      mandatory(false, 1.0),
      GateUnit { optional: false, completed: false, order_index: None },
    ];
    assert_eq!(resolve(&units)[1], GateState::Inactive);
  }

  #[test]
  fn unlock_skips_optional_and_completed_siblings() {
    let units = [
      mandatory(true, 0.0),
      optional(1.0),
      mandatory(true, 2.0),
      mandatory(false, 3.0),
    ];
    assert_eq!(next_mandatory_to_unlock(&units, 0), Some(3));
    assert_eq!(next_mandatory_to_unlock(&units, 3), None);
  }
}
