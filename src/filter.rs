use crate::registry::{KeyRegistry, StateTag};
use bson::{doc, Binary, Bson, Document};

/// Builds the key-vault query document selecting every `EMPTY` entry.
///
/// Ordering of ids/alt-names inside the filter follows the registry's
/// insertion order, so the same registry state always produces the same
/// filter document, useful for test reproduction.
pub fn build_filter(registry: &KeyRegistry) -> Document {
    let mut ids = Vec::new();
    let mut alt_names = Vec::new();

    for entry in registry.entries() {
        if entry.state() != StateTag::Empty {
            continue;
        }
        if let Some(id) = entry.id() {
            ids.push(Bson::Binary(Binary {
                subtype: bson::spec::BinarySubtype::Uuid,
                bytes: id.as_bytes().to_vec(),
            }));
        }
        for name in entry.alt_names() {
            alt_names.push(Bson::String(name.clone()));
        }
    }

    if ids.is_empty() && alt_names.is_empty() {
        // Matches nothing: callers detect "nothing to fetch" via
        // `registry.has(StateTag::Empty)` rather than by inspecting this.
        return doc! { "_id": { "$in": [] } };
    }

    let mut clauses = Vec::new();
    if !ids.is_empty() {
        clauses.push(Bson::Document(doc! { "_id": { "$in": ids } }));
    }
    if !alt_names.is_empty() {
        clauses.push(Bson::Document(
            doc! { "keyAltNames": { "$in": alt_names } },
        ));
    }

    if clauses.len() == 1 {
        match clauses.into_iter().next() {
            Some(Bson::Document(d)) => d,
            _ => doc! { "_id": { "$in": [] } },
        }
    } else {
        doc! { "$or": clauses }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
    use super::*;
    use crate::registry::KeyRegistry;

    #[test]
    fn empty_registry_matches_nothing() {
        let reg = KeyRegistry::new();
        let f = build_filter(&reg);
        assert_eq!(f, doc! { "_id": { "$in": [] } });
    }

    #[test]
    fn filter_is_deterministic_across_calls() {
        let mut reg = KeyRegistry::new();
        reg.add_id(&[1u8; 16]).unwrap();
        reg.add_alt_name("alice").unwrap();
        assert_eq!(build_filter(&reg), build_filter(&reg));
    }

    #[test]
    fn filter_includes_ids_and_alt_names() {
        let mut reg = KeyRegistry::new();
        reg.add_id(&[1u8; 16]).unwrap();
        reg.add_alt_name("alice").unwrap();
        let f = build_filter(&reg);
        let or = f.get_array("$or").unwrap();
        assert_eq!(or.len(), 2);
    }

    #[test]
    fn filter_with_only_ids_has_no_or() {
        let mut reg = KeyRegistry::new();
        reg.add_id(&[1u8; 16]).unwrap();
        let f = build_filter(&reg);
        assert!(f.contains_key("_id"));
        assert!(!f.contains_key("$or"));
    }
}
