use crate::error::{BrokerError, BrokerResult};
use crate::kek::KekDescriptor;
use crate::kms;
use zeroize::Zeroizing;

/// Plaintext DEK material: always exactly 96 bytes.
pub type DekMaterial = Zeroizing<[u8; 96]>;

const DEK_LEN: usize = 96;

#[derive(Debug)]
enum DecryptorState {
    /// Waiting on the caller to drive a KMS request/response round trip.
    AwaitingKms,
    Ready(DekMaterial),
    Failed(BrokerError),
}

/// One outstanding KMS "unwrap this KEK-wrapped DEK" request.
///
/// For the `local` provider there is no network exchange: the broker
/// unwraps the DEK itself using the configured local master key, and the
/// handle is already [`KeyDecryptor::ready`] the moment it is constructed.
/// For `aws`, the handle exposes [`KeyDecryptor::request_bytes`] for the
/// caller's transport to send, and is driven to completion via
/// [`KeyDecryptor::feed`].
///
/// The handle carries an index back-reference to its owning registry entry
/// rather than a pointer, per the "no back-pointers" design note.
#[derive(Debug)]
pub struct KeyDecryptor {
    pub(crate) entry_index: usize,
    kek: KekDescriptor,
    request: Vec<u8>,
    state: DecryptorState,
}

impl KeyDecryptor {
    /// Build an AWS-provider handle. Takes the ARN and region directly
    /// (rather than a [`KekDescriptor`]) so that constructing one is only
    /// possible with the fields an AWS request actually needs.
    pub(crate) fn new_aws(entry_index: usize, key_arn: String, region: String, encrypted_material: &[u8]) -> Self {
        let request = kms::aws::build_decrypt_request(&key_arn, &region, encrypted_material);
        Self {
            entry_index,
            kek: KekDescriptor::Aws { key_arn, region },
            request,
            state: DecryptorState::AwaitingKms,
        }
    }

    pub(crate) fn new_local(
        entry_index: usize,
        master_key: &[u8; 32],
        encrypted_material: &[u8],
    ) -> Self {
        let state = match kms::local::unwrap(master_key, encrypted_material) {
            Ok(dek) => DecryptorState::Ready(dek),
            Err(e) => DecryptorState::Failed(e),
        };
        Self {
            entry_index,
            kek: KekDescriptor::Local,
            request: Vec::new(),
            state,
        }
    }

    /// Construct a handle that is already failed, e.g. because the broker
    /// has no credentials configured for this entry's provider.
    pub(crate) fn new_failed(entry_index: usize, kek: KekDescriptor, reason: BrokerError) -> Self {
        Self {
            entry_index,
            kek,
            request: Vec::new(),
            state: DecryptorState::Failed(reason),
        }
    }

    /// The registry index of the entry this handle belongs to, for callers
    /// that want to correlate dispensed handles with their own bookkeeping.
    pub fn entry_index(&self) -> usize {
        self.entry_index
    }

    /// The KMS provider this handle targets.
    pub fn provider(&self) -> &'static str {
        self.kek.provider_tag()
    }

    /// Bytes the transport layer should send to the KMS (empty for `local`,
    /// which never leaves the process).
    pub fn request_bytes(&self) -> &[u8] {
        &self.request
    }

    /// How many plaintext bytes the caller still needs to feed back via
    /// [`KeyDecryptor::feed`] before this handle is done. Zero once
    /// [`KeyDecryptor::ready`] is true.
    pub fn bytes_needed(&self) -> usize {
        match self.state {
            DecryptorState::AwaitingKms => DEK_LEN,
            DecryptorState::Ready(_) | DecryptorState::Failed(_) => 0,
        }
    }

    /// True once this handle has reached a terminal state (success or
    /// per-entry failure) and can be passed to
    /// [`crate::broker::KeyBroker::add_decrypted_key`].
    pub fn ready(&self) -> bool {
        !matches!(self.state, DecryptorState::AwaitingKms)
    }

    /// Feed back the plaintext bytes the KMS returned for this request.
    /// Only valid for providers that require a network round trip (`aws`);
    /// `local` handles are already ready when constructed.
    pub fn feed(&mut self, plaintext: &[u8]) -> BrokerResult<()> {
        if self.ready() {
            return Err(BrokerError::KmsNotDone);
        }
        if plaintext.len() != DEK_LEN {
            self.state = DecryptorState::Failed(BrokerError::KmsFailure(format!(
                "expected {DEK_LEN}-byte plaintext, got {}",
                plaintext.len()
            )));
            return Ok(());
        }
        let mut buf = [0u8; DEK_LEN];
        buf.copy_from_slice(plaintext);
        self.state = DecryptorState::Ready(Zeroizing::new(buf));
        Ok(())
    }

    /// Mark this handle as failed with a KMS-reported error. The entry
    /// transitions to `ERROR` but the call that reports this does not fail
    /// ("decrypt what we can" policy: per-entry failures do not fail the call).
    pub fn fail(&mut self, reason: String) {
        if !self.ready() {
            self.state = DecryptorState::Failed(BrokerError::KmsFailure(reason));
        }
    }

    pub(crate) fn into_result(self) -> BrokerResult<DekMaterial> {
        match self.state {
            DecryptorState::Ready(dek) => Ok(dek),
            DecryptorState::Failed(e) => Err(e),
            DecryptorState::AwaitingKms => Err(BrokerError::KmsNotDone),
        }
    }
}
