//! Ordering utility — best-effort `order_index` resolution and stable sort.
//!
//! Curriculum rows have historically carried their position as a number,
//! a numeric string, or nothing at all, under a handful of key spellings.
//! The tie-break rule is explicit: units with no resolvable order rank
//! after all explicitly-ordered units, and any ties keep their original
//! array position (the sort is stable).

use serde_json::Value;

/// JSON keys checked, in order, when resolving a unit's position.
const ORDER_KEYS: &[&str] =
  &["order_index", "orderIndex", "order", "orderNumber", "orderPosition"];

/// Coerce a JSON value to a finite order number. Accepts numbers and
/// non-empty numeric strings; everything else resolves to `None`.
pub fn parse_order_value(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
    Value::String(s) if !s.trim().is_empty() => {
      s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
    }
    _ => None,
  }
}

/// Resolve the order of a JSON object under any of the known key spellings.
pub fn resolve_order_index(source: &Value) -> Option<f64> {
  let obj = source.as_object()?;
  ORDER_KEYS
    .iter()
    .find_map(|key| obj.get(*key).and_then(parse_order_value))
}

/// Stable-sort `items` by the order `key` yields, missing orders last,
/// ties broken by original position.
pub fn sort_by_order<T>(
  items: Vec<T>,
  key: impl Fn(&T) -> Option<f64>,
) -> Vec<T> {
  let mut keyed: Vec<(f64, usize, T)> = items
    .into_iter()
    .enumerate()
    .map(|(index, item)| {
      let order = key(&item).unwrap_or(f64::INFINITY);
      (order, index, item)
    })
    .collect();
  keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
  keyed.into_iter().map(|(_, _, item)| item).collect()
}

/// Index of the first unit in order (lowest resolvable order wins; with
/// no resolvable orders the first array element wins). `None` only for
/// an empty slice.
pub fn first_by_order<T>(
  items: &[T],
  key: impl Fn(&T) -> Option<f64>,
) -> Option<usize> {
  let mut best: Option<(f64, usize)> = None;
  for (index, item) in items.iter().enumerate() {
    let order = key(item).unwrap_or(f64::INFINITY);
    match best {
      Some((current, _)) if order >= current => {}
      _ => best = Some((order, index)),
    }
  }
  best.map(|(_, index)| index)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn parses_numbers_and_numeric_strings() {
    assert_eq!(parse_order_value(&json!(3)), Some(3.0));
    assert_eq!(parse_order_value(&json!(2.5)), Some(2.5));
    assert_eq!(parse_order_value(&json!(" 7 ")), Some(7.0));
    assert_eq!(parse_order_value(&json!("")), None);
    assert_eq!(parse_order_value(&json!("abc")), None);
    assert_eq!(parse_order_value(&json!(null)), None);
    assert_eq!(parse_order_value(&json!([1])), None);
  }

  #[test]
  fn resolves_alternate_key_spellings() {
    assert_eq!(resolve_order_index(&json!({ "order_index": 2 })), Some(2.0));
    assert_eq!(resolve_order_index(&json!({ "orderIndex": "4" })), Some(4.0));
    assert_eq!(resolve_order_index(&json!({ "order": 1.5 })), Some(1.5));
    assert_eq!(resolve_order_index(&json!({ "title": "x" })), None);
  }

  #[test]
  fn sort_is_stable_with_missing_orders_last() {
    let items = vec![
      ("c", None),
      ("a", Some(1.0)),
      ("d", None),
      ("b", Some(1.0)),
      ("e", Some(0.0)),
    ];
    let sorted = sort_by_order(items, |(_, order)| *order);
    let names: Vec<&str> = sorted.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, vec!["e", "a", "b", "c", "d"]);
  }

  #[test]
  fn first_by_order_prefers_lowest_then_position() {
    let items = vec![(Some(2.0),), (Some(0.0),), (None,)];
    assert_eq!(first_by_order(&items, |(order,)| *order), Some(1));

    let unordered: Vec<(Option<f64>,)> = vec![(None,), (None,)];
    assert_eq!(first_by_order(&unordered, |(order,)| *order), Some(0));

    let empty: Vec<(Option<f64>,)> = vec![];
    assert_eq!(first_by_order(&empty, |(order,)| *order), None);
  }
}
