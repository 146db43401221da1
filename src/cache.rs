//! Decrypted-key cache collaborator. The cache is keyed by id, so the broker
//! only consults it on `add_id` (a hit lets that entry skip straight to
//! `DECRYPTED`); an alt-name-only entry has no id to look up until it is
//! merged with an ingested document. The broker feeds the cache after every
//! successful `add_decrypted_key`. It does not own the cache's eviction
//! policy or cross-request lifetime; it only reads and writes through this
//! trait.

use crate::identity::KeyId;
use std::fmt::Debug;

/// A process-wide (or broker-external) cache of already-decrypted key
/// material, keyed by id.
pub trait DecryptedKeyCache: Debug {
    /// Look up previously decrypted material for `id`, if present.
    fn get(&self, id: &KeyId) -> Option<[u8; 96]>;

    /// Publish newly decrypted material for `id`.
    fn put(&mut self, id: KeyId, material: &[u8; 96]);
}

/// The default cache: never has a hit, discards everything it's fed. A
/// broker built with [`crate::config::BrokerConfig::default`] and no
/// explicit cache behaves exactly as if the cache did not exist.
#[derive(Debug, Default)]
pub struct NoopCache;

impl DecryptedKeyCache for NoopCache {
    fn get(&self, _id: &KeyId) -> Option<[u8; 96]> {
        None
    }

    fn put(&mut self, _id: KeyId, _material: &[u8; 96]) {}
}
