// Scenario tests for the key broker's public API.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use bson::{doc, Binary};
use key_broker::{BrokerConfig, BrokerError, KeyBroker, StateTag};
use uuid::Uuid;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

const LOCAL_MASTER_KEY: [u8; 32] = [0x42; 32];

fn wrap_local(master_key: &[u8; 32], dek: &[u8; 96]) -> Vec<u8> {
    use aes_gcm::aead::{Aead, KeyInit, OsRng};
    use aes_gcm::{Aes256Gcm, Nonce};
    use rand::RngCore;

    let cipher = Aes256Gcm::new_from_slice(master_key).unwrap();
    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher.encrypt(nonce, dek.as_ref()).unwrap();
    let mut out = nonce_bytes.to_vec();
    out.extend_from_slice(&ciphertext);
    out
}

fn local_key_doc(id: [u8; 16], alt_names: Option<Vec<&str>>, dek: &[u8; 96]) -> bson::Document {
    let wrapped = wrap_local(&LOCAL_MASTER_KEY, dek);
    let mut d = doc! {
        "_id": Binary { subtype: bson::spec::BinarySubtype::Uuid, bytes: id.to_vec() },
        "keyMaterial": Binary { subtype: bson::spec::BinarySubtype::Generic, bytes: wrapped },
        "masterKey": { "provider": "local" },
    };
    if let Some(names) = alt_names {
        d.insert(
            "keyAltNames",
            bson::Bson::Array(names.into_iter().map(|n| bson::Bson::String(n.to_string())).collect()),
        );
    }
    d
}

fn new_broker() -> KeyBroker {
    KeyBroker::new(BrokerConfig::new().with_local(LOCAL_MASTER_KEY))
}

/// Drive every outstanding decryptor to completion against the broker.
fn drain_decryptors(broker: &mut KeyBroker) {
    let mut cursor = None;
    loop {
        let Some((next_cursor, handle)) = broker.next_key_decryptor(cursor) else {
            break;
        };
        cursor = next_cursor;
        broker.add_decrypted_key(handle).unwrap();
    }
}

// =============================================================================
// SCENARIO 1: HAPPY PATH, SINGLE KEY
// =============================================================================

#[test]
fn happy_path_single_key() {
    let id = [0x01; 16];
    let plaintext = [0xABu8; 96];

    let mut broker = new_broker();
    broker.add_id(&id).unwrap();

    let filter = broker.filter();
    assert!(!filter.contains_key("$or"), "a single clause is not wrapped in $or");
    let ids = filter.get_document("_id").unwrap().get_array("$in").unwrap();
    assert_eq!(ids.len(), 1, "only an id clause is present for an id-only request");

    broker.add_doc(&local_key_doc(id, None, &plaintext)).unwrap();
    drain_decryptors(&mut broker);

    let material = broker
        .decrypted_key_material_by_id(Uuid::from_slice(&id).unwrap())
        .unwrap();
    assert_eq!(&**material, &plaintext);
}

// =============================================================================
// SCENARIO 2: ALT-NAME RESOLUTION
// =============================================================================

#[test]
fn alt_name_resolution() {
    let doc_id = [0x02; 16];
    let plaintext = [0xCDu8; 96];

    let mut broker = new_broker();
    broker.add_alt_name("alice").unwrap();

    broker
        .add_doc(&local_key_doc(doc_id, Some(vec!["alice", "a"]), &plaintext))
        .unwrap();
    drain_decryptors(&mut broker);

    let uuid = Uuid::from_slice(&doc_id).unwrap();
    assert_eq!(&**broker.decrypted_key_material_by_id(uuid).unwrap(), &plaintext);
}

// =============================================================================
// SCENARIO 3: MERGE ON INGEST
// =============================================================================

#[test]
fn merge_on_ingest_collapses_to_one_entry() {
    let id = [0x05; 16];
    let plaintext = [0x11u8; 96];

    let mut broker = new_broker();
    broker.add_id(&id).unwrap();
    broker.add_alt_name("bob").unwrap();

    broker
        .add_doc(&local_key_doc(id, Some(vec!["bob"]), &plaintext))
        .unwrap();

    let mut seen = 0;
    let mut cursor = None;
    while let Some((next_cursor, _)) = broker.next_key_decryptor(cursor) {
        seen += 1;
        cursor = next_cursor;
    }
    assert_eq!(seen, 1, "the id and alt-name requests resolve to a single entry");
}

// =============================================================================
// SCENARIO 4: PARTIAL FAILURE
// =============================================================================

#[test]
fn partial_failure_decrypts_what_it_can() {
    let id_ok = [0x06; 16];
    let id_bad = [0x07; 16];
    let plaintext = [0x22u8; 96];

    let mut broker = new_broker();
    broker.add_id(&id_ok).unwrap();
    broker.add_id(&id_bad).unwrap();

    broker.add_doc(&local_key_doc(id_ok, None, &plaintext)).unwrap();
    // Wrapped with a different key than the broker is configured with, so
    // its decryptor will fail when driven.
    let bad_wrapped = wrap_local(&[0xFFu8; 32], &plaintext);
    let bad_doc = doc! {
        "_id": Binary { subtype: bson::spec::BinarySubtype::Uuid, bytes: id_bad.to_vec() },
        "keyMaterial": Binary { subtype: bson::spec::BinarySubtype::Generic, bytes: bad_wrapped },
        "masterKey": { "provider": "local" },
    };
    broker.add_doc(&bad_doc).unwrap();

    drain_decryptors(&mut broker);

    let uuid_ok = Uuid::from_slice(&id_ok).unwrap();
    let uuid_bad = Uuid::from_slice(&id_bad).unwrap();
    assert_eq!(&**broker.decrypted_key_material_by_id(uuid_ok).unwrap(), &plaintext);
    assert!(matches!(
        broker.decrypted_key_material_by_id(uuid_bad),
        Err(BrokerError::KeyNotDecrypted(_))
    ));
    assert_eq!(broker.errored_entries().count(), 1);
}

// =============================================================================
// SCENARIO 5: UNEXPECTED DOCUMENT
// =============================================================================

#[test]
fn unexpected_document_is_rejected() {
    let requested = [0x08; 16];
    let unrelated = [0x09; 16];

    let mut broker = new_broker();
    broker.add_id(&requested).unwrap();

    let err = broker
        .add_doc(&local_key_doc(unrelated, None, &[0u8; 96]))
        .unwrap_err();
    assert!(matches!(err, BrokerError::UnexpectedKeyDocument));
    assert!(broker.has(StateTag::Empty));
}

// =============================================================================
// SCENARIO 6: ITERATOR COMPLETENESS
// =============================================================================

#[test]
fn iterator_completeness() {
    let mut broker = new_broker();
    for b in 1..=3u8 {
        let id = [b; 16];
        broker.add_id(&id).unwrap();
        broker.add_doc(&local_key_doc(id, None, &[b; 96])).unwrap();
    }

    let mut dispensed = Vec::new();
    let mut cursor = None;
    for _ in 0..3 {
        let (next_cursor, handle) = broker.next_key_decryptor(cursor).expect("three entries pending");
        dispensed.push(handle.entry_index());
        cursor = next_cursor;
    }
    assert_eq!(dispensed, vec![0, 1, 2], "dispensed in insertion order");
    assert!(broker.next_key_decryptor(cursor).is_none(), "a fourth call returns END");
}
