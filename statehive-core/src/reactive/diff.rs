//! JSON pointer helpers and structural change detection
//!
//! Changes are reported as the deepest JSON pointers (RFC 6901) at which two
//! trees differ. Objects are compared key by key and arrays of equal length
//! index by index; anything else that differs is reported at its own pointer.

use serde_json::Value;

/// Escape a single path segment for use in a JSON pointer
pub fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Build a JSON pointer from a sequence of path segments
pub fn pointer_of<S: AsRef<str>>(path: &[S]) -> String {
    path.iter().fold(String::new(), |mut pointer, segment| {
        pointer.push('/');
        pointer.push_str(&escape(segment.as_ref()));
        pointer
    })
}

/// Append a segment to an existing pointer
pub fn child_pointer(parent: &str, segment: &str) -> String {
    format!("{}/{}", parent, escape(segment))
}

/// Whether two pointers refer to the same node or one contains the other
pub fn overlaps(a: &str, b: &str) -> bool {
    is_ancestor_or_self(a, b) || is_ancestor_or_self(b, a)
}

fn is_ancestor_or_self(ancestor: &str, pointer: &str) -> bool {
    pointer == ancestor
        || (pointer.starts_with(ancestor) && pointer.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Collect the pointers under `base` at which `before` and `after` differ
pub fn changed_pointers(base: &str, before: &Value, after: &Value, out: &mut Vec<String>) {
    if before == after {
        return;
    }

    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old {
                let pointer = child_pointer(base, key);
                match new.get(key) {
                    Some(new_value) => changed_pointers(&pointer, old_value, new_value, out),
                    None => out.push(pointer),
                }
            }
            for key in new.keys().filter(|key| !old.contains_key(*key)) {
                out.push(child_pointer(base, key));
            }
        }
        (Value::Array(old), Value::Array(new)) if old.len() == new.len() => {
            for (index, (old_item, new_item)) in old.iter().zip(new).enumerate() {
                changed_pointers(&child_pointer(base, &index.to_string()), old_item, new_item, out);
            }
        }
        _ => out.push(base.to_string()),
    }
}

/// Walk `path` down from `root`, through objects by key and arrays by index
pub fn lookup<'a, S: AsRef<str>>(root: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, key| step(value, key.as_ref()))
}

/// Mutable counterpart of [`lookup`]
pub fn lookup_mut<'a, S: AsRef<str>>(root: &'a mut Value, path: &[S]) -> Option<&'a mut Value> {
    path.iter().try_fold(root, |value, key| match value {
        Value::Object(map) => map.get_mut(key.as_ref()),
        Value::Array(items) => key.as_ref().parse::<usize>().ok().and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

pub(crate) fn step<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
