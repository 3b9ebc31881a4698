//! The engine's pure transition function.

use std::collections::BTreeMap;

use tracing::warn;

use scoop_types::FieldMap;

use crate::action::EngineAction;
use crate::state::{EngineState, TypeSlice};

/// Compute the next engine state for `action`.
///
/// - CREATE without an id replaces the whole singleton slice of its type.
/// - CREATE with an id inserts or replaces one keyed entry, keeping siblings.
/// - UPDATE shallow-merges its fields into the existing singleton or keyed
///   entry; it never replaces the entity.
/// - An action whose id does not fit the kind of slice already stored for
///   its type (id-less against a collection, keyed against a singleton) is
///   ignored with a warning.
///
/// `state` is left untouched; the result shares nothing mutable with it.
pub fn reduce(state: &EngineState, action: &EngineAction) -> EngineState {
    let mut next = state.clone();
    let target = action.target();
    let types = next.types_mut();

    match (action, target.id()) {
        (EngineAction::Create { data, .. }, None) => {
            if let Some(TypeSlice::Collection(_)) = types.get(target.type_key()) {
                warn!(
                    type_key = target.type_key(),
                    "singleton create against a keyed collection; ignored"
                );
            } else {
                types.insert(
                    target.type_key().to_string(),
                    TypeSlice::Singleton(data.clone()),
                );
            }
        }
        (EngineAction::Create { data, .. }, Some(id)) => {
            with_entries(types, target.type_key(), |entries| {
                entries.insert(id.key(), data.clone());
            });
        }
        (EngineAction::Update { data, .. }, None) => {
            match types
                .entry(target.type_key().to_string())
                .or_insert_with(|| TypeSlice::Singleton(FieldMap::new()))
            {
                TypeSlice::Singleton(fields) => merge(fields, data),
                TypeSlice::Collection(_) => {
                    warn!(
                        type_key = target.type_key(),
                        "singleton update against a keyed collection; ignored"
                    );
                }
            }
        }
        (EngineAction::Update { data, .. }, Some(id)) => {
            with_entries(types, target.type_key(), |entries| {
                merge(entries.entry(id.key()).or_default(), data);
            });
        }
    }

    next
}

/// Apply `f` to the keyed entries of `type_key`, starting an empty collection
/// if the type has no slice yet. A singleton slice is left alone.
fn with_entries(
    types: &mut BTreeMap<String, TypeSlice>,
    type_key: &str,
    f: impl FnOnce(&mut BTreeMap<String, FieldMap>),
) {
    match types
        .entry(type_key.to_string())
        .or_insert_with(|| TypeSlice::Collection(BTreeMap::new()))
    {
        TypeSlice::Collection(entries) => f(entries),
        TypeSlice::Singleton(_) => {
            warn!(type_key, "keyed action against a singleton slice; ignored");
        }
    }
}

fn merge(fields: &mut FieldMap, data: &FieldMap) {
    for (name, value) in data {
        fields.insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use scoop_types::{Ref, StoredValue};

    fn fields(pairs: &[(&str, StoredValue)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn create(type_key: &str, id: Option<i64>, data: FieldMap) -> EngineAction {
        EngineAction::Create {
            target: Ref::new(type_key, id.map(Into::into)),
            data,
        }
    }

    fn update(type_key: &str, id: Option<i64>, data: FieldMap) -> EngineAction {
        EngineAction::Update {
            target: Ref::new(type_key, id.map(Into::into)),
            data,
        }
    }

    #[test]
    fn create_singleton_replaces_whole_slice() {
        let s0 = EngineState::new();
        let s1 = reduce(&s0, &create("Settings", None, fields(&[("a", 1.into()), ("b", 2.into())])));
        let s2 = reduce(&s1, &create("Settings", None, fields(&[("c", 3.into())])));

        let r = Ref::singleton("Settings");
        assert_eq!(s2.slice(&r), Some(&fields(&[("c", 3.into())])));
        // The previous snapshot is untouched.
        assert_eq!(s1.field(&r, "a"), Some(&StoredValue::from(1)));
    }

    #[test]
    fn create_keyed_preserves_siblings() {
        let s = reduce(&EngineState::new(), &create("Todo", Some(1), fields(&[("t", "a".into())])));
        let s = reduce(&s, &create("Todo", Some(2), fields(&[("t", "b".into())])));

        assert!(s.type_slice("Todo").unwrap().is_collection());
        assert_eq!(s.field(&Ref::new("Todo", Some(1.into())), "t"), Some(&StoredValue::from("a")));
        assert_eq!(s.field(&Ref::new("Todo", Some(2.into())), "t"), Some(&StoredValue::from("b")));
    }

    #[test]
    fn update_merges_into_singleton() {
        let s = reduce(&EngineState::new(), &create("Settings", None, fields(&[("a", 1.into()), ("b", 2.into())])));
        let s = reduce(&s, &update("Settings", None, fields(&[("b", 20.into())])));

        let r = Ref::singleton("Settings");
        assert_eq!(s.slice(&r), Some(&fields(&[("a", 1.into()), ("b", 20.into())])));
    }

    #[test]
    fn update_merges_into_keyed_entry() {
        let s = reduce(&EngineState::new(), &create("Todo", Some(1), fields(&[("t", "a".into()), ("done", false.into())])));
        let s = reduce(&s, &update("Todo", Some(1), fields(&[("done", true.into())])));

        let r = Ref::new("Todo", Some(1.into()));
        assert_eq!(s.field(&r, "t"), Some(&StoredValue::from("a")));
        assert_eq!(s.field(&r, "done"), Some(&StoredValue::Bool(true)));
    }

    #[test]
    fn update_of_missing_entry_creates_it() {
        let s = reduce(&EngineState::new(), &update("Todo", Some(9), fields(&[("t", "x".into())])));
        assert!(s.contains(&Ref::new("Todo", Some(9.into()))));
    }

    #[test]
    fn singleton_update_against_collection_is_ignored() {
        let s = reduce(&EngineState::new(), &create("Todo", Some(1), fields(&[("t", "a".into())])));
        let after = reduce(&s, &update("Todo", None, fields(&[("t", "b".into())])));
        assert_eq!(after, s);
    }

    #[test]
    fn singleton_create_against_collection_is_ignored() {
        let s = reduce(&EngineState::new(), &create("Todo", Some(1), fields(&[("t", "a".into())])));
        let after = reduce(&s, &create("Todo", None, fields(&[("t", "b".into())])));
        assert_eq!(after, s);
    }

    #[test]
    fn keyed_writes_against_singleton_are_ignored() {
        let s = reduce(&EngineState::new(), &create("Settings", None, fields(&[("theme", "dark".into())])));

        let created = reduce(&s, &create("Settings", Some(1), fields(&[("theme", "light".into())])));
        assert_eq!(created, s);
        let updated = reduce(&s, &update("Settings", Some(1), fields(&[("theme", "light".into())])));
        assert_eq!(updated, s);
        assert_eq!(
            updated.field(&Ref::singleton("Settings"), "theme"),
            Some(&StoredValue::from("dark"))
        );
    }

    fn arb_value() -> impl Strategy<Value = StoredValue> {
        prop_oneof![
            Just(StoredValue::Null),
            any::<bool>().prop_map(StoredValue::Bool),
            any::<i64>().prop_map(StoredValue::from),
            "[a-z]{0,6}".prop_map(StoredValue::String),
        ]
    }

    fn arb_fields() -> impl Strategy<Value = FieldMap> {
        proptest::collection::btree_map("[a-e]", arb_value(), 0..5)
    }

    proptest! {
        #[test]
        fn update_never_drops_sibling_fields(
            initial in arb_fields(),
            patch in arb_fields(),
            id in proptest::option::of(0i64..4),
        ) {
            let s = reduce(&EngineState::new(), &create("T", id, initial.clone()));
            let s = reduce(&s, &update("T", id, patch.clone()));
            let slice = s.slice(&Ref::new("T", id.map(Into::into))).unwrap();

            for (name, value) in &initial {
                if !patch.contains_key(name) {
                    prop_assert_eq!(slice.get(name), Some(value));
                }
            }
            for (name, value) in &patch {
                prop_assert_eq!(slice.get(name), Some(value));
            }
        }

        #[test]
        fn keyed_create_keeps_other_entries(
            ids in proptest::collection::btree_set(0i64..20, 1..6),
            data in arb_fields(),
        ) {
            let mut s = EngineState::new();
            for id in &ids {
                s = reduce(&s, &create("T", Some(*id), data.clone()));
            }
            prop_assert_eq!(s.entity_count(), ids.len());
            for id in &ids {
                prop_assert!(s.contains(&Ref::new("T", Some((*id).into()))));
            }
        }
    }
}
