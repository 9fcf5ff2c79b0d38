use std::collections::BTreeMap;

use crate::firestore::error::FirestoreResult;
use crate::firestore::local::document::{MaybeDocument, SnapshotVersion};
use crate::firestore::local::mutation::{FieldTransform, Mutation, TransformOperation};
use crate::firestore::model::{DocumentKey, FieldPath, Timestamp};
use crate::firestore::value::{FirestoreValue, MapValue, ValueKind};

/// Applies a single pending mutation on top of the current overlay state,
/// implementing the four overlay rules of spec §4.4. `current` is `None` when
/// nothing is known about the key yet (no remote baseline, no prior
/// mutation); `Some(NoDocument)`/`Some(UnknownDocument)` represent a known
/// absence/unknown state that a blind `Patch` must not disturb.
pub(crate) fn apply_mutation(
    current: Option<MaybeDocument>,
    key: &DocumentKey,
    mutation: &Mutation,
) -> FirestoreResult<Option<MaybeDocument>> {
    match mutation {
        Mutation::Set { fields, .. } => Ok(Some(MaybeDocument::Document {
            key: key.clone(),
            version: SnapshotVersion::MIN,
            fields: fields.clone(),
            has_local_mutations: true,
        })),
        Mutation::Patch {
            field_mask, fields, ..
        } => Ok(apply_patch(current, key, field_mask, fields)),
        Mutation::Delete { .. } => Ok(Some(MaybeDocument::NoDocument {
            key: key.clone(),
            version: SnapshotVersion::MIN,
        })),
        Mutation::Transform { transforms, .. } => apply_transform(current, key, transforms),
    }
}

fn apply_patch(
    current: Option<MaybeDocument>,
    key: &DocumentKey,
    field_mask: &[FieldPath],
    patch_fields: &MapValue,
) -> Option<MaybeDocument> {
    let existing_fields = match &current {
        Some(MaybeDocument::Document { fields, .. }) => fields.clone(),
        // Blind patch: no materialized document to merge into. Leave the
        // overlay state untouched (spec §4.4: "a blind patch is invisible").
        _ => return current,
    };

    let mut merged = existing_fields.fields().clone();
    for path in field_mask {
        match value_for_field_path(patch_fields, path) {
            Some(value) => set_value_at_field_path(&mut merged, path, value),
            None => remove_value_at_field_path(&mut merged, path),
        }
    }

    Some(MaybeDocument::Document {
        key: key.clone(),
        version: SnapshotVersion::MIN,
        fields: MapValue::new(merged),
        has_local_mutations: true,
    })
}

fn apply_transform(
    current: Option<MaybeDocument>,
    key: &DocumentKey,
    transforms: &[FieldTransform],
) -> FirestoreResult<Option<MaybeDocument>> {
    let existing_fields = match &current {
        Some(MaybeDocument::Document { fields, .. }) => fields.clone(),
        // Transform with no materialized document anywhere in the overlay
        // chain (remote baseline or a prior mutation in this or an earlier
        // batch): skipped entirely, per spec §4.4.
        _ => return Ok(current),
    };

    let mut fields = existing_fields.fields().clone();
    apply_field_transforms(&mut fields, transforms)?;

    Ok(Some(MaybeDocument::Document {
        key: key.clone(),
        version: SnapshotVersion::MIN,
        fields: MapValue::new(fields),
        has_local_mutations: true,
    }))
}

fn apply_field_transforms(
    fields: &mut BTreeMap<String, FirestoreValue>,
    transforms: &[FieldTransform],
) -> FirestoreResult<()> {
    if transforms.is_empty() {
        return Ok(());
    }

    let base_map = MapValue::new(fields.clone());
    for transform in transforms {
        let path = transform.field_path();
        let current_value = value_for_field_path(&base_map, path);
        let new_value = match transform.operation() {
            TransformOperation::ServerTimestamp => FirestoreValue::from_timestamp(Timestamp::now()),
            TransformOperation::ArrayUnion(elements) => array_union(current_value, elements),
            TransformOperation::ArrayRemove(elements) => array_remove(current_value, elements),
            TransformOperation::NumericIncrement(operand) => {
                numeric_increment(current_value, operand)?
            }
        };
        set_value_at_field_path(fields, path, new_value);
    }

    Ok(())
}

fn array_union(existing: Option<FirestoreValue>, additions: &[FirestoreValue]) -> FirestoreValue {
    let mut values = match existing {
        Some(value) => match value.kind() {
            ValueKind::Array(array) => array.values().to_vec(),
            _ => Vec::new(),
        },
        None => Vec::new(),
    };

    for element in additions {
        if !values.iter().any(|candidate| candidate == element) {
            values.push(element.clone());
        }
    }

    FirestoreValue::from_array(values)
}

fn array_remove(existing: Option<FirestoreValue>, removals: &[FirestoreValue]) -> FirestoreValue {
    let values = match existing {
        Some(value) => match value.kind() {
            ValueKind::Array(array) => array.values().to_vec(),
            _ => Vec::new(),
        },
        None => Vec::new(),
    };

    let filtered: Vec<FirestoreValue> = values
        .into_iter()
        .filter(|candidate| !removals.iter().any(|needle| needle == candidate))
        .collect();

    FirestoreValue::from_array(filtered)
}

fn numeric_increment(
    existing: Option<FirestoreValue>,
    operand: &FirestoreValue,
) -> FirestoreResult<FirestoreValue> {
    use crate::firestore::error::invalid_argument;

    let result = match (existing, operand.kind()) {
        (Some(value), ValueKind::Integer(delta)) => match value.kind() {
            ValueKind::Integer(current) => {
                if let Some(sum) = current.checked_add(*delta) {
                    FirestoreValue::from_integer(sum)
                } else {
                    FirestoreValue::from_double(*current as f64 + *delta as f64)
                }
            }
            ValueKind::Double(current) => FirestoreValue::from_double(*current + *delta as f64),
            _ => FirestoreValue::from_integer(*delta),
        },
        (Some(value), ValueKind::Double(delta)) => match value.kind() {
            ValueKind::Integer(current) => FirestoreValue::from_double(*current as f64 + *delta),
            ValueKind::Double(current) => FirestoreValue::from_double(*current + *delta),
            _ => FirestoreValue::from_double(*delta),
        },
        (None, ValueKind::Integer(delta)) => FirestoreValue::from_integer(*delta),
        (None, ValueKind::Double(delta)) => FirestoreValue::from_double(*delta),
        (_, _) => {
            return Err(invalid_argument(
                "FieldValue.increment() requires a numeric operand",
            ))
        }
    };

    Ok(result)
}

fn value_for_field_path(map: &MapValue, path: &FieldPath) -> Option<FirestoreValue> {
    map.get(path).cloned()
}

fn set_value_at_field_path(
    fields: &mut BTreeMap<String, FirestoreValue>,
    path: &FieldPath,
    value: FirestoreValue,
) {
    set_value_at_segments(fields, path.segments(), value);
}

fn set_value_at_segments(
    fields: &mut BTreeMap<String, FirestoreValue>,
    segments: &[String],
    value: FirestoreValue,
) {
    if segments.len() == 1 {
        fields.insert(segments[0].clone(), value);
        return;
    }

    let first = &segments[0];
    let mut child_fields = match fields.get(first) {
        Some(existing) => match existing.kind() {
            ValueKind::Map(map) => map.fields().clone(),
            _ => BTreeMap::new(),
        },
        None => BTreeMap::new(),
    };
    set_value_at_segments(&mut child_fields, &segments[1..], value);
    fields.insert(first.clone(), FirestoreValue::from_map(child_fields));
}

fn remove_value_at_field_path(fields: &mut BTreeMap<String, FirestoreValue>, path: &FieldPath) {
    remove_value_at_segments(fields, path.segments());
}

fn remove_value_at_segments(fields: &mut BTreeMap<String, FirestoreValue>, segments: &[String]) {
    if segments.is_empty() {
        return;
    }

    if segments.len() == 1 {
        fields.remove(&segments[0]);
        return;
    }

    let first = &segments[0];
    if let Some(value) = fields.get(first).cloned() {
        if let ValueKind::Map(child_map) = value.kind() {
            let mut child_fields = child_map.fields().clone();
            remove_value_at_segments(&mut child_fields, &segments[1..]);
            if child_fields.is_empty() {
                fields.remove(first);
            } else {
                fields.insert(first.clone(), FirestoreValue::from_map(child_fields));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::local::mutation::Precondition;
    use std::collections::BTreeMap as StdBTreeMap;

    fn key() -> DocumentKey {
        DocumentKey::from_string("cities/sf").unwrap()
    }

    fn fields(pairs: &[(&str, i64)]) -> MapValue {
        let mut map = StdBTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), FirestoreValue::from_integer(*v));
        }
        MapValue::new(map)
    }

    #[test]
    fn set_replaces_unconditionally() {
        let mutation = Mutation::Set {
            key: key(),
            fields: fields(&[("population", 1)]),
            precondition: Precondition::None,
        };
        let result = apply_mutation(None, &key(), &mutation).unwrap().unwrap();
        assert!(result.has_local_mutations());
        assert_eq!(result.version(), SnapshotVersion::MIN);
    }

    #[test]
    fn blind_patch_is_invisible() {
        let mutation = Mutation::Patch {
            key: key(),
            field_mask: vec![FieldPath::from_dot_separated("population").unwrap()],
            fields: fields(&[("population", 2)]),
            precondition: Precondition::None,
        };
        let result = apply_mutation(None, &key(), &mutation).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn patch_merges_existing_document() {
        let base = Some(MaybeDocument::Document {
            key: key(),
            version: SnapshotVersion::MIN,
            fields: fields(&[("population", 1), ("name", 1)]),
            has_local_mutations: false,
        });
        let mutation = Mutation::Patch {
            key: key(),
            field_mask: vec![FieldPath::from_dot_separated("population").unwrap()],
            fields: fields(&[("population", 2)]),
            precondition: Precondition::None,
        };
        let result = apply_mutation(base, &key(), &mutation).unwrap().unwrap();
        match result {
            MaybeDocument::Document { fields, .. } => {
                assert_eq!(
                    fields.fields().get("population"),
                    Some(&FirestoreValue::from_integer(2))
                );
                assert_eq!(
                    fields.fields().get("name"),
                    Some(&FirestoreValue::from_integer(1))
                );
            }
            other => panic!("expected document, got {other:?}"),
        }
    }

    #[test]
    fn transform_skipped_without_materialized_document() {
        let mutation = Mutation::Transform {
            key: key(),
            transforms: vec![FieldTransform::new(
                FieldPath::from_dot_separated("views").unwrap(),
                TransformOperation::NumericIncrement(FirestoreValue::from_integer(1)),
            )],
            precondition: Precondition::None,
        };
        let result = apply_mutation(None, &key(), &mutation).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn transform_applies_after_materialized_document() {
        let base = Some(MaybeDocument::Document {
            key: key(),
            version: SnapshotVersion::MIN,
            fields: fields(&[("views", 4)]),
            has_local_mutations: true,
        });
        let mutation = Mutation::Transform {
            key: key(),
            transforms: vec![FieldTransform::new(
                FieldPath::from_dot_separated("views").unwrap(),
                TransformOperation::NumericIncrement(FirestoreValue::from_integer(1)),
            )],
            precondition: Precondition::None,
        };
        let result = apply_mutation(base, &key(), &mutation).unwrap().unwrap();
        match result {
            MaybeDocument::Document { fields, .. } => {
                assert_eq!(
                    fields.fields().get("views"),
                    Some(&FirestoreValue::from_integer(5))
                );
            }
            other => panic!("expected document, got {other:?}"),
        }
    }

    #[test]
    fn delete_produces_tombstone() {
        let mutation = Mutation::Delete {
            key: key(),
            precondition: Precondition::None,
        };
        let result = apply_mutation(None, &key(), &mutation).unwrap().unwrap();
        assert!(matches!(result, MaybeDocument::NoDocument { .. }));
    }
}
