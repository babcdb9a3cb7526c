//! Response materialization validation
//!
//! Every top-level operation must hand the edge a fully materialized value:
//! no deferred-compute handles, no producer placeholders. Internally, code
//! that defers work tags the placeholder object with a reserved marker key;
//! this validator walks the serialized response tree and rejects anything
//! still carrying one. Depth is bounded so a pathological self-referential
//! payload cannot stall the envelope.

use serde_json::Value;

/// Reserved keys that mark a value as not-yet-computed
pub const DEFERRED_MARKERS: [&str; 2] = ["__deferred__", "__pending__"];

/// Maximum traversal depth before a response is considered malformed
pub const MAX_VALIDATION_DEPTH: usize = 32;

/// A materialization violation found in a response tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializationViolation {
    /// A deferred-compute marker was found at the given path
    DeferredValue { path: String, marker: String },
    /// The tree exceeded the maximum validation depth
    TooDeep { path: String },
}

impl std::fmt::Display for MaterializationViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterializationViolation::DeferredValue { path, marker } => {
                write!(f, "deferred value marker '{}' at {}", marker, path)
            }
            MaterializationViolation::TooDeep { path } => {
                write!(f, "response tree exceeds max depth at {}", path)
            }
        }
    }
}

/// Validate that a response tree contains no deferred values
///
/// Returns the first violation found, or None if the tree is fully
/// materialized.
pub fn find_violation(value: &Value) -> Option<MaterializationViolation> {
    walk(value, "root", 0)
}

/// Convenience check used by the envelope before serializing a response
pub fn is_materialized(value: &Value) -> bool {
    find_violation(value).is_none()
}

fn walk(value: &Value, path: &str, depth: usize) -> Option<MaterializationViolation> {
    if depth > MAX_VALIDATION_DEPTH {
        return Some(MaterializationViolation::TooDeep {
            path: path.to_string(),
        });
    }

    match value {
        Value::Object(map) => {
            for marker in DEFERRED_MARKERS {
                if map.contains_key(marker) {
                    return Some(MaterializationViolation::DeferredValue {
                        path: path.to_string(),
                        marker: marker.to_string(),
                    });
                }
            }
            for (key, child) in map {
                if let Some(violation) = walk(child, &format!("{}.{}", path, key), depth + 1) {
                    return Some(violation);
                }
            }
            None
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(violation) = walk(item, &format!("{}[{}]", path, i), depth + 1) {
                    return Some(violation);
                }
            }
            None
        }
        _ => None,
    }
}
