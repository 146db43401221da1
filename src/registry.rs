use crate::decryptor::DekMaterial;
use crate::error::{BrokerError, BrokerResult};
use crate::identity::{parse_key_id, validate_alt_name, KeyId, KeyIdentity};
use crate::kek::KekDescriptor;

/// The state tag of a registry entry, independent of the data it carries.
/// Used by [`KeyRegistry::has`] and by the decryptor dispatcher's filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTag {
    Empty,
    Encrypted,
    Decrypted,
    Error,
}

/// The sum-typed state of one entry. Each variant carries exactly the
/// fields that are present in that state, enforced by the compiler instead
/// of by null checks.
#[derive(Debug)]
pub(crate) enum EntryState {
    Empty,
    Encrypted {
        kek: KekDescriptor,
        encrypted_material: Vec<u8>,
        /// Set once `next_key_decryptor` has handed out this entry's
        /// handle, so a second pass over the registry does not redispense
        /// it.
        dispensed: bool,
    },
    Decrypted {
        decrypted_material: DekMaterial,
    },
    Error {
        error: BrokerError,
    },
}

impl EntryState {
    pub(crate) fn tag(&self) -> StateTag {
        match self {
            EntryState::Empty => StateTag::Empty,
            EntryState::Encrypted { .. } => StateTag::Encrypted,
            EntryState::Decrypted { .. } => StateTag::Decrypted,
            EntryState::Error { .. } => StateTag::Error,
        }
    }
}

/// One tracked key inside a broker.
#[derive(Debug)]
pub struct KeyEntry {
    pub(crate) identity: KeyIdentity,
    pub(crate) state: EntryState,
}

impl KeyEntry {
    pub fn id(&self) -> Option<KeyId> {
        self.identity.id
    }

    pub fn alt_names(&self) -> &[String] {
        &self.identity.alt_names
    }

    pub fn state(&self) -> StateTag {
        self.state.tag()
    }

    /// The recorded failure, present only when `state() == StateTag::Error`.
    pub fn error(&self) -> Option<&BrokerError> {
        match &self.state {
            EntryState::Error { error } => Some(error),
            _ => None,
        }
    }

    pub(crate) fn decrypted_material(&self) -> Option<&DekMaterial> {
        match &self.state {
            EntryState::Decrypted { decrypted_material } => Some(decrypted_material),
            _ => None,
        }
    }

    pub(crate) fn kek_and_material(&self) -> Option<(&KekDescriptor, &[u8])> {
        match &self.state {
            EntryState::Encrypted {
                kek,
                encrypted_material,
                ..
            } => Some((kek, encrypted_material)),
            _ => None,
        }
    }

    /// Marks this entry's decryptor as dispensed. Returns `false` (no-op) if
    /// it was already dispensed or is not `ENCRYPTED`.
    pub(crate) fn mark_dispensed(&mut self) -> bool {
        match &mut self.state {
            EntryState::Encrypted { dispensed, .. } if !*dispensed => {
                *dispensed = true;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn transition_decrypted(&mut self, decrypted_material: DekMaterial) {
        self.state = EntryState::Decrypted { decrypted_material };
    }

    pub(crate) fn transition_error(&mut self, error: BrokerError) {
        self.state = EntryState::Error { error };
    }
}

/// Deduplicated, insertion-ordered collection of key entries. Owned
/// exclusively by one [`crate::broker::KeyBroker`]; never shared, never
/// locked: single-threaded per request.
///
/// Entries live in stable-indexed slots rather than a plain `Vec<KeyEntry>`:
/// when the document ingester merges two entries into one, the
/// losing slot is cleared rather than removed, so indices already handed
/// out as [`crate::decryptor::KeyDecryptor`] back-references never go
/// stale. This is the "contiguous sequence with stable indices" the design
/// notes ask for, without the fragile dual-linked-list of the original.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    slots: Vec<Option<KeyEntry>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Iterate over live entries in insertion order, paired with their
    /// stable index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &KeyEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (i, e)))
    }

    /// Iterate over live entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &KeyEntry> {
        self.iter().map(|(_, e)| e)
    }

    pub fn empty(&self) -> bool {
        self.entries().next().is_none()
    }

    pub fn has(&self, tag: StateTag) -> bool {
        self.entries().any(|e| e.state.tag() == tag)
    }

    pub(crate) fn get(&self, index: usize) -> Option<&KeyEntry> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut KeyEntry> {
        self.slots.get_mut(index).and_then(|s| s.as_mut())
    }

    pub(crate) fn find_by_id(&self, id: KeyId) -> Option<usize> {
        self.iter()
            .find(|(_, e)| e.identity.id == Some(id))
            .map(|(i, _)| i)
    }

    pub(crate) fn find_by_alt_name(&self, name: &str) -> Option<usize> {
        self.iter()
            .find(|(_, e)| e.identity.has_alt_name(name))
            .map(|(i, _)| i)
    }

    pub(crate) fn push(&mut self, entry: KeyEntry) -> usize {
        self.slots.push(Some(entry));
        self.slots.len() - 1
    }

    /// Clear a slot after its entry has been folded into another one by a
    /// merge. The index is never reused.
    pub(crate) fn clear_slot(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = None;
        }
    }

    /// Add an id into the registry as `EMPTY`. Idempotent: adding the same
    /// id twice leaves exactly one entry. Returns the parsed id either way.
    pub fn add_id(&mut self, id_bytes: &[u8]) -> BrokerResult<KeyId> {
        let id = parse_key_id(id_bytes)?;
        if self.find_by_id(id).is_some() {
            return Ok(id);
        }
        self.push(KeyEntry {
            identity: KeyIdentity::from_id(id),
            state: EntryState::Empty,
        });
        Ok(id)
    }

    /// Add an alt name into the registry as `EMPTY`. Idempotent.
    pub fn add_alt_name(&mut self, name: &str) -> BrokerResult<()> {
        validate_alt_name(name)?;
        if self.find_by_alt_name(name).is_some() {
            return Ok(());
        }
        self.push(KeyEntry {
            identity: KeyIdentity::from_alt_name(name.to_string()),
            state: EntryState::Empty,
        });
        Ok(())
    }

    /// The index of the next `ENCRYPTED`, not-yet-dispensed entry strictly
    /// after `after` (or from the head if `after` is `None`), in insertion
    /// order. Used by the decryptor dispatcher's cursor.
    pub(crate) fn next_undispensed_encrypted(&self, after: Option<usize>) -> Option<usize> {
        let start = after.map(|i| i + 1).unwrap_or(0);
        self.slots
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(i, slot)| match slot {
                Some(entry) => match &entry.state {
                    EntryState::Encrypted { dispensed, .. } if !*dispensed => Some(i),
                    _ => None,
                },
                None => None,
            })
    }
}
