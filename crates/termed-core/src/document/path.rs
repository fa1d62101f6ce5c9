//! Flattening of JSON trees into `path → string` maps and back.
//!
//! # Path grammar
//!
//! ```text
//! path    := segment*
//! segment := "." name      (name matches [A-Za-z_]+, leading "." dropped at start)
//!          | "[" digits "]"
//!          | "[\"" escaped "\"]"    (any other key; `\` and `"` are backslash-escaped)
//! ```
//!
//! `{"a": {"b c": [{"d": "x"}]}}` flattens to `a["b c"][0].d = "x"`.
//! Scalars become strings; `null` and empty containers produce no entries.
//! [`unflatten`] inverts [`flatten`] for trees whose leaves are strings and
//! fills gaps in sparse array positions with `null`.

use super::DocumentError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One step of a flattened path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

// ---------------------------------------------------------------------------
// Flatten
// ---------------------------------------------------------------------------

pub fn flatten(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(value, &mut String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, path: &mut String, out: &mut BTreeMap<String, String>) {
    let len = path.len();
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                push_key(path, key);
                flatten_into(child, path, out);
                path.truncate(len);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                let _ = write!(path, "[{i}]");
                flatten_into(child, path, out);
                path.truncate(len);
            }
        }
        Value::String(s) => {
            out.insert(path.clone(), s.clone());
        }
        Value::Bool(b) => {
            out.insert(path.clone(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(path.clone(), n.to_string());
        }
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
}

fn push_key(path: &mut String, key: &str) {
    if is_plain_key(key) {
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(key);
    } else {
        path.push_str("[\"");
        for c in key.chars() {
            if c == '"' || c == '\\' {
                path.push('\\');
            }
            path.push(c);
        }
        path.push_str("\"]");
    }
}

// ---------------------------------------------------------------------------
// Path parsing
// ---------------------------------------------------------------------------

pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, DocumentError> {
    let fail = |reason: &'static str| DocumentError::Path { path: path.to_string(), reason };
    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                if segments.is_empty() {
                    return Err(fail("leading dot"));
                }
                let name = take_name(&mut chars);
                if name.is_empty() {
                    return Err(fail("empty key after dot"));
                }
                segments.push(PathSegment::Key(name));
            }
            '[' => {
                chars.next();
                if chars.peek() == Some(&'"') {
                    chars.next();
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some('\\') => key.push(chars.next().ok_or_else(|| fail("dangling escape"))?),
                            Some('"') => break,
                            Some(other) => key.push(other),
                            None => return Err(fail("unterminated quoted key")),
                        }
                    }
                    if chars.next() != Some(']') {
                        return Err(fail("expected ] after quoted key"));
                    }
                    segments.push(PathSegment::Key(key));
                } else {
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            _ => return Err(fail("malformed array index")),
                        }
                    }
                    let index = digits.parse().map_err(|_| fail("malformed array index"))?;
                    segments.push(PathSegment::Index(index));
                }
            }
            _ if segments.is_empty() => {
                let name = take_name(&mut chars);
                if name.is_empty() {
                    return Err(fail("unexpected character"));
                }
                segments.push(PathSegment::Key(name));
            }
            _ => return Err(fail("unexpected character")),
        }
    }

    Ok(segments)
}

fn take_name(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphabetic() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

/// Indexed field name for a stored path: keys joined by `.`, array
/// positions dropped. `properties.prefLabel[1].value` → `properties.prefLabel.value`.
pub fn field_name(path: &str) -> Result<String, DocumentError> {
    let keys: Vec<String> = parse_path(path)?
        .into_iter()
        .filter_map(|segment| match segment {
            PathSegment::Key(key) => Some(key),
            PathSegment::Index(_) => None,
        })
        .collect();
    Ok(keys.join("."))
}

// ---------------------------------------------------------------------------
// Unflatten
// ---------------------------------------------------------------------------

pub fn unflatten(flat: &BTreeMap<String, String>) -> Result<Value, DocumentError> {
    if flat.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let mut root = Value::Null;
    for (path, leaf) in flat {
        let segments = parse_path(path)?;
        insert(&mut root, &segments, leaf.clone(), path)?;
    }
    Ok(root)
}

fn insert(slot: &mut Value, segments: &[PathSegment], leaf: String, path: &str) -> Result<(), DocumentError> {
    let conflict = || DocumentError::Path { path: path.to_string(), reason: "conflicts with another path" };

    let Some((head, rest)) = segments.split_first() else {
        if !slot.is_null() {
            return Err(conflict());
        }
        *slot = Value::String(leaf);
        return Ok(());
    };

    match head {
        PathSegment::Key(key) => {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            let map = slot.as_object_mut().ok_or_else(conflict)?;
            insert(map.entry(key.clone()).or_insert(Value::Null), rest, leaf, path)
        }
        PathSegment::Index(i) => {
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot.as_array_mut().ok_or_else(conflict)?;
            if items.len() <= *i {
                items.resize(*i + 1, Value::Null);
            }
            insert(&mut items[*i], rest, leaf, path)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
