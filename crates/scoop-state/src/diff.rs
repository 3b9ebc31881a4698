//! Field-level diff between two snapshots of one entity.
//!
//! The store compares an entity's previous and current field maps after every
//! accepted action; only a non-empty diff is forwarded to the instance.

use scoop_types::{FieldMap, StoredValue};

/// The result of comparing two snapshots of one entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SliceDiff {
    /// The list of field changes.
    pub changes: Vec<FieldChange>,
}

impl SliceDiff {
    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Names of all changed fields, in diff order.
    pub fn field_names(&self) -> Vec<&str> {
        self.changes.iter().map(FieldChange::name).collect()
    }
}

/// A single change to one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldChange {
    /// The field appeared.
    Added { name: String, value: StoredValue },
    /// The field disappeared.
    Removed { name: String, value: StoredValue },
    /// The field's value changed.
    Modified {
        name: String,
        old: StoredValue,
        new: StoredValue,
    },
}

impl FieldChange {
    /// The name of the changed field.
    pub fn name(&self) -> &str {
        match self {
            FieldChange::Added { name, .. }
            | FieldChange::Removed { name, .. }
            | FieldChange::Modified { name, .. } => name,
        }
    }
}

/// Compute the diff between two snapshots of an entity.
///
/// A missing snapshot is treated as an empty field map, so an entity that
/// comes into existence reports every field as `Added`.
pub fn diff_slices(old: Option<&FieldMap>, new: Option<&FieldMap>) -> SliceDiff {
    let empty = FieldMap::new();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);
    let mut changes = Vec::new();

    for (name, old_val) in old {
        match new.get(name) {
            Some(new_val) if new_val != old_val => changes.push(FieldChange::Modified {
                name: name.clone(),
                old: old_val.clone(),
                new: new_val.clone(),
            }),
            Some(_) => {}
            None => changes.push(FieldChange::Removed {
                name: name.clone(),
                value: old_val.clone(),
            }),
        }
    }

    for (name, new_val) in new {
        if !old.contains_key(name) {
            changes.push(FieldChange::Added {
                name: name.clone(),
                value: new_val.clone(),
            });
        }
    }

    SliceDiff { changes }
}
