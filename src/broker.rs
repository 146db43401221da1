use crate::cache::{DecryptedKeyCache, NoopCache};
use crate::config::BrokerConfig;
use crate::decryptor::{DekMaterial, KeyDecryptor};
use crate::document;
use crate::error::{BrokerError, BrokerResult};
use crate::filter;
use crate::identity::KeyId;
use crate::kek::KekDescriptor;
use crate::registry::{KeyRegistry, StateTag};
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

/// Opaque progress marker for [`KeyBroker::next_key_decryptor`]. Wraps the
/// registry index of the last dispensed entry; `None` means "start from the
/// head".
pub type DecryptorCursor = Option<usize>;

/// One entry that ended in `ERROR`, as reported by
/// [`KeyBroker::errored_entries`].
#[derive(Debug)]
pub struct ErroredEntry {
    pub id: Option<KeyId>,
    pub alt_names: Vec<String>,
    pub error: BrokerError,
}

/// Per-request coordinator for fetching and decrypting data-encryption keys.
///
/// One broker is constructed per encrypt-or-decrypt operation; it is not
/// shared across requests and holds no locks, matching the
/// single-threaded-per-request contract of its registry.
pub struct KeyBroker {
    registry: KeyRegistry,
    config: BrokerConfig,
    cache: Box<dyn DecryptedKeyCache>,
}

impl std::fmt::Debug for KeyBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBroker")
            .field("registry", &self.registry)
            .finish()
    }
}

impl Default for KeyBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl KeyBroker {
    /// Construct an empty broker with the default (no-op) decrypted-key
    /// cache.
    pub fn new(config: BrokerConfig) -> Self {
        Self::with_cache(config, Box::new(NoopCache))
    }

    /// Construct an empty broker backed by a caller-supplied decrypted-key
    /// cache.
    pub fn with_cache(config: BrokerConfig, cache: Box<dyn DecryptedKeyCache>) -> Self {
        Self {
            registry: KeyRegistry::new(),
            config,
            cache,
        }
    }

    /// Add a key id to track. Idempotent. If the decrypted-key cache already
    /// holds material for this id, the entry is created already `DECRYPTED`.
    #[instrument(skip(self, id_bytes))]
    pub fn add_id(&mut self, id_bytes: &[u8]) -> BrokerResult<()> {
        let id = self.registry.add_id(id_bytes)?;
        if let Some(index) = self.registry.find_by_id(id) {
            self.apply_cache_hit(index);
        }
        Ok(())
    }

    /// Add a key alt name to track. Idempotent.
    #[instrument(skip(self))]
    pub fn add_alt_name(&mut self, name: &str) -> BrokerResult<()> {
        self.registry.add_alt_name(name)
    }

    /// True iff any entry is in the given state.
    pub fn has(&self, tag: StateTag) -> bool {
        self.registry.has(tag)
    }

    /// True iff the registry has no entries.
    pub fn empty(&self) -> bool {
        self.registry.empty()
    }

    /// Build the key-vault query document selecting every pending entry.
    pub fn filter(&self) -> bson::Document {
        filter::build_filter(&self.registry)
    }

    /// Ingest one key-vault document. See [`crate::document::ingest_document`].
    #[instrument(skip(self, doc))]
    pub fn add_doc(&mut self, doc: &bson::Document) -> BrokerResult<()> {
        document::ingest_document(&mut self.registry, doc)
    }

    /// Cursor-style iteration over outstanding KMS decrypt requests. Pass
    /// `None` to start from the head, or the cursor returned by a previous
    /// call to continue. Returns `None` ("END") once every `ENCRYPTED` entry
    /// has been dispensed.
    #[instrument(skip(self))]
    pub fn next_key_decryptor(
        &mut self,
        cursor: DecryptorCursor,
    ) -> Option<(DecryptorCursor, KeyDecryptor)> {
        let index = self.registry.next_undispensed_encrypted(cursor)?;
        let (kek, encrypted_material) = {
            let entry = self.registry.get_mut(index)?;
            if !entry.mark_dispensed() {
                return None;
            }
            let (kek, material) = entry.kek_and_material()?;
            (kek.clone(), material.to_vec())
        };
        let handle = self.build_decryptor(index, &kek, &encrypted_material);
        debug!(index, provider = handle.provider(), "dispensed key decryptor");
        Some((Some(index), handle))
    }

    fn build_decryptor(&self, index: usize, kek: &KekDescriptor, encrypted_material: &[u8]) -> KeyDecryptor {
        match kek {
            KekDescriptor::Local => match self.config.local_master_key() {
                Some(master_key) => KeyDecryptor::new_local(index, master_key, encrypted_material),
                None => KeyDecryptor::new_failed(
                    index,
                    kek.clone(),
                    BrokerError::KmsFailure("local KMS provider not configured".to_string()),
                ),
            },
            KekDescriptor::Aws { key_arn, region } => {
                if self.config.aws_enabled() {
                    KeyDecryptor::new_aws(index, key_arn.clone(), region.clone(), encrypted_material)
                } else {
                    KeyDecryptor::new_failed(
                        index,
                        kek.clone(),
                        BrokerError::KmsFailure("aws KMS provider not configured".to_string()),
                    )
                }
            }
        }
    }

    /// Accept the outcome of a driven decryptor handle. Fails at the call
    /// level only with [`BrokerError::KmsNotDone`]; a KMS-reported failure
    /// for this one key is recorded on the entry as `ERROR` and the call
    /// itself still returns `Ok(())` ("decrypt what we can").
    #[instrument(skip(self, handle))]
    pub fn add_decrypted_key(&mut self, handle: KeyDecryptor) -> BrokerResult<()> {
        if !handle.ready() {
            return Err(BrokerError::KmsNotDone);
        }
        let index = handle.entry_index;
        let result = handle.into_result();
        let entry = self
            .registry
            .get_mut(index)
            .ok_or_else(|| BrokerError::Internal("decryptor handle outlived its entry".to_string()))?;
        match result {
            Ok(dek) => {
                if let Some(id) = entry.id() {
                    self.cache.put(id, &dek);
                }
                entry.transition_decrypted(dek);
                debug!(index, "key decrypted");
            }
            Err(error) => {
                warn!(index, %error, "per-entry KMS failure");
                entry.transition_error(error);
            }
        }
        Ok(())
    }

    /// Retrieve the plaintext key material for `id`.
    pub fn decrypted_key_material_by_id(&self, id: KeyId) -> BrokerResult<&DekMaterial> {
        let index = self
            .registry
            .find_by_id(id)
            .ok_or(BrokerError::KeyNotFound(id))?;
        let entry = self
            .registry
            .get(index)
            .ok_or(BrokerError::KeyNotFound(id))?;
        entry
            .decrypted_material()
            .ok_or(BrokerError::KeyNotDecrypted(id))
    }

    /// Iterate over every entry currently in `ERROR`.
    pub fn errored_entries(&self) -> impl Iterator<Item = ErroredEntry> + '_ {
        self.registry.entries().filter_map(|e| {
            e.error().map(|error| ErroredEntry {
                id: e.id(),
                alt_names: e.alt_names().to_vec(),
                error: error.clone(),
            })
        })
    }

    /// Release all entries. Any outstanding decryptor handles the caller
    /// still holds are implicitly cancelled: results fed back for them after
    /// `cleanup` have no entry left to apply to, and are the caller's to
    /// discard. Idempotent.
    #[instrument(skip(self))]
    pub fn cleanup(&mut self) {
        self.registry = KeyRegistry::new();
    }

    fn apply_cache_hit(&mut self, index: usize) {
        let id = match self.registry.get(index) {
            Some(entry) if entry.state() == StateTag::Empty => entry.id(),
            _ => None,
        };
        let Some(id) = id else { return };
        if let Some(material) = self.cache.get(&id) {
            if let Some(entry) = self.registry.get_mut(index) {
                entry.transition_decrypted(Zeroizing::new(material));
                debug!(index, "entry satisfied from decrypted-key cache");
            }
        }
    }
}
