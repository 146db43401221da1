use crate::error::{BrokerError, BrokerResult};
use crate::kek::KekDescriptor;
use crate::registry::{EntryState, KeyRegistry, StateTag};
use tracing::{debug, warn};
use uuid::Uuid;

struct ParsedKeyDocument {
    id: Uuid,
    key_material: Vec<u8>,
    master_key: bson::Document,
    key_alt_names: Vec<String>,
}

fn parse_document(doc: &bson::Document) -> BrokerResult<ParsedKeyDocument> {
    let id = match doc.get("_id") {
        Some(bson::Bson::Binary(b)) if b.bytes.len() == 16 => {
            Uuid::from_slice(&b.bytes).map_err(|e| {
                BrokerError::MalformedKeyDocument(format!("invalid _id: {e}"))
            })?
        }
        Some(_) => {
            return Err(BrokerError::MalformedKeyDocument(
                "_id must be a 16-byte binary UUID".to_string(),
            ))
        }
        None => return Err(BrokerError::MalformedKeyDocument("missing _id".to_string())),
    };

    let key_material = doc
        .get_binary_generic("keyMaterial")
        .map_err(|_| BrokerError::MalformedKeyDocument("missing keyMaterial".to_string()))?
        .to_vec();

    let master_key = doc
        .get_document("masterKey")
        .map_err(|_| BrokerError::MalformedKeyDocument("missing masterKey".to_string()))?
        .clone();

    let key_alt_names = match doc.get_array("keyAltNames") {
        Ok(arr) => arr
            .iter()
            .filter_map(|b| b.as_str().map(str::to_string))
            .collect(),
        Err(_) => Vec::new(),
    };

    Ok(ParsedKeyDocument {
        id,
        key_material,
        master_key,
        key_alt_names,
    })
}

/// Ingest one key-vault document, matching it against pending (`EMPTY`)
/// entries and transitioning the match(es) to `ENCRYPTED` (or `ERROR`).
///
/// This is independent per call: `add_doc` may be invoked repeatedly for
/// distinct documents.
pub fn ingest_document(registry: &mut KeyRegistry, doc: &bson::Document) -> BrokerResult<()> {
    let parsed = parse_document(doc)?;

    let mut matched: Vec<usize> = Vec::new();
    if let Some(i) = registry.find_by_id(parsed.id) {
        if registry.get(i).map(|e| e.state()) == Some(StateTag::Empty) {
            matched.push(i);
        }
    }
    for name in &parsed.key_alt_names {
        if let Some(i) = registry.find_by_alt_name(name) {
            if registry.get(i).map(|e| e.state()) == Some(StateTag::Empty) && !matched.contains(&i)
            {
                matched.push(i);
            }
        }
    }

    if matched.is_empty() {
        warn!(id = %parsed.id, "key vault document matched no pending key");
        return Err(BrokerError::UnexpectedKeyDocument);
    }

    // Merge every matched entry's identity into the first (lowest index,
    // since `matched` was built id-first then in alt-name order), clearing
    // the rest. Indices stay stable — see `KeyRegistry` docs.
    let Some(&survivor) = matched.iter().min() else {
        return Err(BrokerError::Internal("matched is non-empty, checked above".to_string()));
    };
    let Some(survivor_entry) = registry.get(survivor) else {
        return Err(BrokerError::Internal("survivor index came from this registry".to_string()));
    };
    let mut merged_identity = survivor_entry.identity.clone();
    merged_identity.id = Some(parsed.id);
    for &i in &matched {
        if i == survivor {
            continue;
        }
        if let Some(other) = registry.get(i) {
            merged_identity.merge(&other.identity);
        }
        registry.clear_slot(i);
    }

    let transition = match KekDescriptor::from_bson(&parsed.master_key) {
        Ok(kek) => EntryState::Encrypted {
            kek,
            encrypted_material: parsed.key_material,
            dispensed: false,
        },
        Err(e) => {
            warn!(id = %parsed.id, error = %e, "per-entry failure parsing masterKey");
            EntryState::Error { error: e }
        }
    };

    if let Some(entry) = registry.get_mut(survivor) {
        entry.identity = merged_identity;
        entry.state = transition;
        debug!(id = %parsed.id, state = ?entry.state(), "key document ingested");
    }

    Ok(())
}
