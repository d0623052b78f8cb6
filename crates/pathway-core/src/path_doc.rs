//! Path Normalizer / Extractor — locates the canonical course and
//! module arrays inside a stored path document, whatever historical
//! shape it was serialised in, and annotates module arrays for the
//! progress flow.
//!
//! Extraction is a fixed priority list of shape parsers, each returning
//! `Option<Vec<Value>>`, followed by a generic recursive fallback. A
//! document that matches no shape degrades to an empty list — the
//! engine reports "no path" rather than erroring.

use serde_json::Value;

use crate::{
  gate::{self, GateUnit},
  ordering,
};

// ─── Course extraction ───────────────────────────────────────────────────────

type ShapeParser = fn(&Value) -> Option<Vec<Value>>;

/// Known stored-path shapes, in priority order.
const COURSE_SHAPES: &[(&str, ShapeParser)] = &[
  ("array", shape_root_array),
  ("personalized_data.courses", shape_personalized_courses),
  ("personalized_data.steps", shape_personalized_steps),
  ("path.personalized_data", shape_path_personalized),
  ("path.courses", shape_path_courses),
  ("path.steps", shape_path_steps),
  ("steps", shape_root_steps),
  ("courses", shape_root_courses),
  ("any-root-array", shape_any_root_array),
];

fn as_array(value: Option<&Value>) -> Option<Vec<Value>> {
  value.and_then(Value::as_array).map(|a| a.to_vec())
}

/// Collect `step.resources.course_structure.courses` across a steps
/// array. `None` unless at least one course was found.
fn courses_from_steps(steps: &Value) -> Option<Vec<Value>> {
  let steps = steps.as_array()?;
  let mut courses = Vec::new();
  for step in steps {
    if let Some(found) = step
      .pointer("/resources/course_structure/courses")
      .and_then(Value::as_array)
    {
      courses.extend(found.iter().cloned());
    }
  }
  if courses.is_empty() { None } else { Some(courses) }
}

fn shape_root_array(raw: &Value) -> Option<Vec<Value>> {
  raw.as_array().map(|a| a.to_vec())
}

fn shape_personalized_courses(raw: &Value) -> Option<Vec<Value>> {
  as_array(raw.pointer("/personalized_data/courses"))
}

fn shape_personalized_steps(raw: &Value) -> Option<Vec<Value>> {
  raw.pointer("/personalized_data/steps").and_then(courses_from_steps)
}

fn shape_path_personalized(raw: &Value) -> Option<Vec<Value>> {
  let personalized = raw.pointer("/path/personalized_data")?;
  as_array(personalized.get("courses"))
    .or_else(|| personalized.get("steps").and_then(courses_from_steps))
}

fn shape_path_courses(raw: &Value) -> Option<Vec<Value>> {
  as_array(raw.pointer("/path/courses"))
}

fn shape_path_steps(raw: &Value) -> Option<Vec<Value>> {
  raw.pointer("/path/steps").and_then(courses_from_steps)
}

fn shape_root_steps(raw: &Value) -> Option<Vec<Value>> {
  raw.get("steps").and_then(courses_from_steps)
}

fn shape_root_courses(raw: &Value) -> Option<Vec<Value>> {
  as_array(raw.get("courses"))
}

/// Last resort before the recursive fallback: any root-level key whose
/// value is an array.
fn shape_any_root_array(raw: &Value) -> Option<Vec<Value>> {
  let obj = raw.as_object()?;
  obj.values().find_map(|value| value.as_array().map(|a| a.to_vec()))
}

/// Depth-first search for the first non-empty array stored under a key
/// whose name contains `fragment` (case-insensitive).
fn find_array_by_key_fragment(
  value: &Value,
  fragment: &str,
) -> Option<Vec<Value>> {
  let obj = value.as_object()?;
  for (key, nested) in obj {
    if key.to_lowercase().contains(fragment)
      && let Some(found) = nested.as_array()
      && !found.is_empty()
    {
      return Some(found.to_vec());
    }
  }
  for nested in obj.values() {
    if let Some(found) = find_array_by_key_fragment(nested, fragment) {
      return Some(found);
    }
  }
  None
}

/// Extract the course list from a stored path document.
///
/// Accepts a JSON-encoded string, a bare course array, or an object in
/// any of the known historical shapes; degrades to empty when nothing
/// matches.
pub fn extract_courses(raw: &Value) -> Vec<Value> {
  if raw.is_null() {
    return Vec::new();
  }

  // Some rows hold the document JSON-encoded a second time.
  if let Some(text) = raw.as_str() {
    return match serde_json::from_str::<Value>(text) {
      Ok(parsed) => extract_courses(&parsed),
      Err(_) => Vec::new(),
    };
  }

  for (_, parser) in COURSE_SHAPES {
    if let Some(courses) = parser(raw) {
      return courses;
    }
  }

  find_array_by_key_fragment(raw, "course").unwrap_or_default()
}

// ─── Module extraction ───────────────────────────────────────────────────────

/// Locate the module array inside a subject value, trying the known
/// nesting shapes before the generic "module"-keyed fallback.
pub fn extract_modules(subject: &Value) -> Vec<Value> {
  let direct = ["modules", "module_list", "items"];
  for key in direct {
    if let Some(found) = as_array(subject.get(key)) {
      return found;
    }
  }
  if let Some(found) = subject
    .as_object()
    .and_then(|obj| obj.values().find_map(|v| v.as_array().map(|a| a.to_vec())))
  {
    return found;
  }
  let nested = [
    "/course_structure/modules",
    "/resources/modules",
    "/resources/course_structure/modules",
  ];
  for pointer in nested {
    if let Some(found) = as_array(subject.pointer(pointer)) {
      return found;
    }
  }
  find_array_by_key_fragment(subject, "module").unwrap_or_default()
}

// ─── Field access helpers ────────────────────────────────────────────────────

/// Coerce an id-ish value (string or number) to its canonical string.
pub fn id_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// A module's id under any of its historical key spellings.
pub fn module_id(module: &Value) -> Option<String> {
  ["id", "moduleId", "module_id"]
    .iter()
    .find_map(|key| module.get(*key).and_then(id_string))
}

/// Whether `module` is addressed by `needle` (primary key or slug).
pub fn module_matches(module: &Value, needle: &str) -> bool {
  module_id(module).as_deref() == Some(needle)
    || module.get("slug").and_then(id_string).as_deref() == Some(needle)
}

/// Mandatory unless the stored value says otherwise.
pub fn is_mandatory_module(module: &Value) -> bool {
  if let Some(status) = module.get("status").and_then(Value::as_str)
    && status.eq_ignore_ascii_case("optional")
  {
    return false;
  }
  if let Some(flag) = module.get("is_mandatory").and_then(Value::as_bool) {
    return flag;
  }
  true
}

/// Completion flag of a raw stored-path module: an explicit `completed`,
/// a fully-true activity record, or 100% correctness.
pub fn module_completion_flag(module: &Value) -> bool {
  if module.get("completed").and_then(Value::as_bool) == Some(true) {
    return true;
  }
  if let Some(activity) = module.get("activity") {
    let all = ["viewedLecture", "attemptedQuiz", "attemptedExercise"]
      .iter()
      .all(|key| activity.get(*key).and_then(Value::as_bool) == Some(true));
    if all {
      return true;
    }
  }
  matches!(
    module.get("correctness_percentage").and_then(Value::as_f64),
    Some(pct) if pct >= 100.0
  )
}

/// Stored activation flag, if the document carries one: a boolean
/// `is_active`, or an `"active"`/`"inactive"` token under `active` or
/// `active_state`.
pub fn explicit_active(module: &Value) -> Option<bool> {
  if let Some(flag) = module.get("is_active").and_then(Value::as_bool) {
    return Some(flag);
  }
  ["active", "active_state"].iter().find_map(|key| {
    match module.get(*key).and_then(Value::as_str)? {
      s if s.eq_ignore_ascii_case("active") => Some(true),
      s if s.eq_ignore_ascii_case("inactive") => Some(false),
      _ => None,
    }
  })
}

// ─── Activation stamping ─────────────────────────────────────────────────────

fn gate_unit(module: &Value) -> GateUnit {
  GateUnit {
    optional:    !is_mandatory_module(module),
    completed:   module_completion_flag(module),
    order_index: ordering::resolve_order_index(module),
  }
}

fn stamp_active(module: &mut Value, active: bool) {
  if let Some(obj) = module.as_object_mut() {
    obj.insert("is_active".into(), Value::Bool(active));
    obj.insert(
      "active".into(),
      Value::String(if active { "active" } else { "inactive" }.into()),
    );
  }
}

/// Normalise and gate-annotate a subject's module array in place of the
/// stored one: sorts by order, normalises `status`/`is_mandatory`,
/// derives `completed`, and stamps `is_active`/`active` per the
/// sequential gate.
pub fn apply_module_activation(modules: Vec<Value>) -> Vec<Value> {
  let mut sorted =
    ordering::sort_by_order(modules, ordering::resolve_order_index);

  let units: Vec<GateUnit> = sorted.iter().map(gate_unit).collect();
  let states = gate::resolve(&units);

  for (module, (unit, state)) in
    sorted.iter_mut().zip(units.iter().zip(states))
  {
    if let Some(obj) = module.as_object_mut() {
      let status = if unit.optional { "optional" } else { "mandatory" };
      obj.insert("status".into(), Value::String(status.into()));
      obj.insert("is_mandatory".into(), Value::Bool(!unit.optional));
      obj.insert("completed".into(), Value::Bool(unit.completed));
    }
    stamp_active(module, state.is_active());
  }
  sorted
}

/// Re-stamp activation for a stored module list without recomputing the
/// gate. Stored flags are trusted as written by the last progress
/// update; optional and order-0 modules are forced active, and a list
/// whose flags are all absent or inactive gets its first module forced.
pub fn refresh_stored_activation(modules: Vec<Value>) -> Vec<Value> {
  let mut sorted =
    ordering::sort_by_order(modules, ordering::resolve_order_index);
  let mut any_active = false;
  for module in &mut sorted {
    let forced = !is_mandatory_module(module)
      || ordering::resolve_order_index(module) == Some(0.0);
    let active = forced || explicit_active(module).unwrap_or(false);
    stamp_active(module, active);
    any_active |= active;
  }
  if !any_active {
    ensure_first_active(&mut sorted);
  }
  sorted
}

/// After `completed_key` transitions to completed, flip the next
/// incomplete mandatory sibling active in the same pass.
pub fn unlock_next_after(modules: &mut [Value], completed_key: &str) {
  let Some(completed_index) =
    modules.iter().position(|m| module_matches(m, completed_key))
  else {
    return;
  };
  let units: Vec<GateUnit> = modules.iter().map(gate_unit).collect();
  if let Some(next) = gate::next_mandatory_to_unlock(&units, completed_index) {
    stamp_active(&mut modules[next], true);
  }
}

/// Force the first module (lowest order, then position) active —
/// repairs documents whose activation flags are absent or malformed.
pub fn ensure_first_active(modules: &mut [Value]) {
  if let Some(first) =
    ordering::first_by_order(modules, ordering::resolve_order_index)
  {
    stamp_active(&mut modules[first], true);
  }
}

/// All module ids reachable from a course list, for bulk status lookup.
pub fn collect_module_ids(courses: &[Value]) -> Vec<String> {
  let mut seen = std::collections::BTreeSet::new();
  for course in courses {
    for subject in as_array(course.get("subjects")).unwrap_or_default() {
      for module in extract_modules(&subject) {
        if let Some(id) = module_id(&module) {
          seen.insert(id);
        }
      }
    }
  }
  seen.into_iter().collect()
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn course_list() -> Value {
    json!([
      { "id": "c1", "title": "Course One", "subjects": [] },
      { "id": "c2", "title": "Course Two", "subjects": [] }
    ])
  }

  #[test]
  fn all_known_shapes_extract_the_same_courses() {
    let courses = course_list();
    let step = json!({
      "resources": { "course_structure": { "courses": courses } }
    });

    let shapes = vec![
      courses.clone(),
      json!({ "personalized_data": { "courses": courses } }),
      json!({ "personalized_data": { "steps": [step] } }),
      json!({ "path": { "courses": courses } }),
      json!({ "path": { "steps": [step] } }),
      json!({ "steps": [step] }),
      json!({ "courses": courses }),
    ];

    let expected = courses.as_array().unwrap().clone();
    for shape in shapes {
      assert_eq!(extract_courses(&shape), expected);
    }
  }

  #[test]
  fn double_encoded_documents_are_unwrapped() {
    let encoded =
      Value::String(json!({ "courses": course_list() }).to_string());
    assert_eq!(extract_courses(&encoded).len(), 2);

    let garbage = Value::String("not json".into());
    assert!(extract_courses(&garbage).is_empty());
  }

  #[test]
  fn unknown_shape_falls_back_to_course_keyed_search() {
    let raw = json!({
      "wrapper": { "deeply": { "my_courses": course_list() } }
    });
    assert_eq!(extract_courses(&raw).len(), 2);
  }

  #[test]
  fn unextractable_document_degrades_to_empty() {
    assert!(extract_courses(&json!({ "version": 3 })).is_empty());
    assert!(extract_courses(&Value::Null).is_empty());
  }

  #[test]
  fn modules_found_under_alternate_keys() {
    let modules = json!([{ "id": "m1" }]);
    let subjects = vec![
      json!({ "modules": modules }),
      json!({ "module_list": modules }),
      json!({ "items": modules }),
      json!({ "course_structure": { "modules": modules } }),
      json!({ "resources": { "course_structure": { "modules": modules } } }),
      json!({ "nested": { "all_modules": modules } }),
    ];
    for subject in subjects {
      assert_eq!(extract_modules(&subject).len(), 1);
    }
    assert!(extract_modules(&json!({ "title": "empty" })).is_empty());
  }

  #[test]
  fn completion_flag_sources() {
    assert!(module_completion_flag(&json!({ "completed": true })));
    assert!(module_completion_flag(&json!({
      "activity": {
        "viewedLecture": true,
        "attemptedQuiz": true,
        "attemptedExercise": true
      }
    })));
    assert!(module_completion_flag(
      &json!({ "correctness_percentage": 100 })
    ));
    assert!(!module_completion_flag(&json!({
      "completed": false,
      "correctness_percentage": 80,
      "activity": { "viewedLecture": true }
    })));
  }

  #[test]
  fn activation_stamps_gate_states() {
    let modules = vec![
      json!({ "id": "m2", "order_index": 1, "completed": false }),
      json!({ "id": "m1", "order_index": 0, "completed": false }),
      json!({ "id": "m3", "order_index": 2, "status": "optional" }),
    ];
    let annotated = apply_module_activation(modules);

    assert_eq!(annotated[0]["id"], "m1");
    assert_eq!(annotated[0]["is_active"], json!(true));
    // m2 blocked behind incomplete m1, optional m3 open.
    assert_eq!(annotated[1]["is_active"], json!(false));
    assert_eq!(annotated[1]["active"], json!("inactive"));
    assert_eq!(annotated[2]["is_active"], json!(true));
    assert_eq!(annotated[2]["status"], json!("optional"));
  }

  #[test]
  fn stored_flags_are_trusted_and_repaired() {
    let stored = vec![
      json!({ "id": "m1", "order_index": 1, "active": "inactive" }),
      json!({ "id": "m2", "order_index": 2, "is_active": true }),
      json!({ "id": "m3", "order_index": 3, "status": "optional" }),
    ];
    let refreshed = refresh_stored_activation(stored);
    assert_eq!(refreshed[0]["is_active"], json!(false));
    assert_eq!(refreshed[1]["is_active"], json!(true));
    assert_eq!(refreshed[2]["is_active"], json!(true));

    // All flags missing: the first module gets forced.
    let bare = vec![
      json!({ "id": "m1", "order_index": 2 }),
      json!({ "id": "m2", "order_index": 1 }),
    ];
    let repaired = refresh_stored_activation(bare);
    assert_eq!(repaired[0]["id"], "m2");
    assert_eq!(repaired[0]["is_active"], json!(true));
    assert_eq!(repaired[1]["is_active"], json!(false));
  }

  #[test]
  fn unlock_flips_next_mandatory_sibling() {
    let mut modules = vec![
      json!({ "id": "m1", "order_index": 0, "completed": true }),
      json!({ "id": "m2", "order_index": 1, "status": "optional" }),
      json!({ "id": "m3", "order_index": 2, "completed": false,
              "is_active": false, "active": "inactive" }),
    ];
    unlock_next_after(&mut modules, "m1");
    assert_eq!(modules[2]["is_active"], json!(true));
    assert_eq!(modules[2]["active"], json!("active"));
  }

  #[test]
  fn collect_module_ids_walks_every_subject_shape() {
    let courses = vec![json!({
      "subjects": [
        { "modules": [ { "id": "m1" }, { "moduleId": "m2" } ] },
        { "resources": { "modules": [ { "module_id": 3 } ] } }
      ]
    })];
    assert_eq!(collect_module_ids(&courses), vec!["3", "m1", "m2"]);
  }
}
