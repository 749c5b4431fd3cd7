//! Dotted-path access over a `serde_json::Value` tree.
//!
//! The event attribute tree is modeled directly as a `serde_json::Value::
//! Object` rather than a bespoke tree type. Paths are `.`-delimited strings;
//! writes create intermediate objects lazily and never clobber a non-object
//! value with one.

use serde_json::{Map, Value};

/// Reads the value at a dotted path, returning `None` if any segment is
/// missing or traverses through a non-object value.
pub fn get<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = tree;
    for segment in path.split('.') {
        cur = cur.as_object()?.get(segment)?;
    }
    Some(cur)
}

/// Like [`get`] but returns an owned clone.
pub fn get_owned(tree: &Value, path: &str) -> Option<Value> {
    get(tree, path).cloned()
}

/// Writes `value` at a dotted path, creating intermediate objects as needed.
///
/// If an intermediate segment already holds a non-object value, the write
/// is refused (the existing scalar/array is left untouched) rather than
/// silently overwriting it with a map.
pub fn set(tree: &mut Value, path: &str, value: Value) {
    if !tree.is_object() {
        *tree = Value::Object(Map::new());
    }
    let segments: Vec<&str> = path.split('.').collect();
    set_segments(tree, &segments, value);
}

fn set_segments(tree: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(obj) = tree.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        obj.insert((*head).to_string(), value);
        return;
    }
    let entry = obj
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        // Refuse to clobber a scalar/array with an intermediate map.
        return;
    }
    set_segments(entry, rest, value);
}

/// Removes and returns the value at a dotted path, if present.
pub fn remove(tree: &mut Value, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    remove_segments(tree, &segments)
}

fn remove_segments(tree: &mut Value, segments: &[&str]) -> Option<Value> {
    let (head, rest) = segments.split_first()?;
    let obj = tree.as_object_mut()?;
    if rest.is_empty() {
        return obj.remove(*head);
    }
    let entry = obj.get_mut(*head)?;
    remove_segments(entry, rest)
}

/// Returns true if `tree` is an object and has a value at `path`.
pub fn has(tree: &Value, path: &str) -> bool {
    get(tree, path).is_some()
}

/// Renders any scalar JSON value as its string form (numbers/bools without
/// quotes, strings without surrounding quotes). Used by coercion and the
/// `when` predicate language's string comparisons.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_nested() {
        let tree = json!({"a": {"b": {"c": 1}}});
        assert_eq!(get(&tree, "a.b.c"), Some(&json!(1)));
        assert_eq!(get(&tree, "a.b.x"), None);
        assert_eq!(get(&tree, "x"), None);
    }

    #[test]
    fn set_creates_intermediate_maps() {
        let mut tree = json!({});
        set(&mut tree, "event_data.ip", json!("1.2.3.4"));
        assert_eq!(get(&tree, "event_data.ip"), Some(&json!("1.2.3.4")));
    }

    #[test]
    fn set_does_not_overwrite_scalar_with_map() {
        let mut tree = json!({"a": 1});
        set(&mut tree, "a.b", json!(2));
        // "a" stays a scalar; the nested write is refused.
        assert_eq!(get(&tree, "a"), Some(&json!(1)));
        assert_eq!(get(&tree, "a.b"), None);
    }

    #[test]
    fn remove_path() {
        let mut tree = json!({"a": {"b": 1, "c": 2}});
        let removed = remove(&mut tree, "a.b");
        assert_eq!(removed, Some(json!(1)));
        assert_eq!(get(&tree, "a.b"), None);
        assert_eq!(get(&tree, "a.c"), Some(&json!(2)));
    }

    #[test]
    fn display_string_unquotes() {
        assert_eq!(to_display_string(&json!("x")), "x");
        assert_eq!(to_display_string(&json!(5)), "5");
        assert_eq!(to_display_string(&Value::Null), "");
    }
}
