// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared lopdf helpers: inherited page attributes and box arrays.

use lopdf::{Document, Object, ObjectId};

/// How many /Parent links to follow when resolving inherited attributes.
/// Bounds the walk on malformed page trees.
const MAX_PARENT_DEPTH: usize = 10;

/// Resolve a page attribute, walking up the /Parent chain for inheritable
/// keys (/MediaBox, /Resources, /Rotate). Returns a clone of the value with
/// one level of reference indirection resolved.
pub(crate) fn resolve_inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let Ok(Object::Dictionary(dict)) = doc.get_object(current) else {
            return None;
        };
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            };
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current = *parent_id,
            _ => return None,
        }
    }
    None
}

/// The effective /MediaBox of a page as `[x1, y1, x2, y2]`, defaulting to
/// US Letter when the document does not declare one.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    resolve_inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| rect_from_object(&obj))
        .unwrap_or([0.0, 0.0, 612.0, 792.0])
}

/// The effective /Rotate of a page, normalized into `0..360`.
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> i32 {
    resolve_inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .map(|r| (r as i32).rem_euclid(360))
        .unwrap_or(0)
}

/// Interpret an Object as a 4-element rectangle array.
pub(crate) fn rect_from_object(object: &Object) -> Option<[f64; 4]> {
    let Object::Array(values) = object else {
        return None;
    };
    if values.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = match value {
            Object::Integer(i) => *i as f64,
            Object::Real(r) => f64::from(*r),
            _ => return None,
        };
    }
    Some(rect)
}

/// Build a rectangle array object from `[x1, y1, x2, y2]`.
pub(crate) fn rect_to_object(rect: [f64; 4]) -> Object {
    Object::Array(rect.iter().map(|v| Object::Real(*v as f32)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_round_trips_through_objects() {
        let rect = [10.0, 20.0, 610.0, 790.0];
        let parsed = rect_from_object(&rect_to_object(rect)).expect("parse rect");
        for (a, b) in rect.iter().zip(parsed.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn rect_rejects_wrong_arity() {
        let obj = Object::Array(vec![Object::Integer(1), Object::Integer(2)]);
        assert!(rect_from_object(&obj).is_none());
    }
}
