//! Per-request key broker for client-side field-level encryption.
//!
//! A [`KeyBroker`] tracks the set of data-encryption keys (DEKs) a single
//! encrypt-or-decrypt operation needs: it names the keys required, builds
//! the key-vault query that fetches their encrypted documents, ingests
//! those documents, dispenses KMS decrypt requests for the caller to drive,
//! and exposes the plaintext key material once decrypted.
//!
//! The broker does not perform user-payload encryption, does not talk to
//! the database, and does not manage KMS credentials beyond what
//! [`BrokerConfig`] is given; those are this crate's collaborators, not its
//! job. It is not shared between requests and holds no internal locks.
//!
//! # Example
//!
//! ```
//! use key_broker::{BrokerConfig, KeyBroker};
//!
//! let mut broker = KeyBroker::new(BrokerConfig::new().with_local([0u8; 32]));
//! broker.add_id(&[1u8; 16]).unwrap();
//! let _filter = broker.filter();
//! // feed `_filter` to the key vault, then call `broker.add_doc(..)` with
//! // each returned document, dispense decryptors via
//! // `broker.next_key_decryptor(..)`, and drive them through a KMS client.
//! ```

pub mod broker;
pub mod cache;
pub mod config;
pub mod decryptor;
pub mod document;
pub mod error;
pub mod filter;
pub mod identity;
pub mod kek;
pub(crate) mod kms;
pub mod registry;

pub use broker::{DecryptorCursor, ErroredEntry, KeyBroker};
pub use cache::{DecryptedKeyCache, NoopCache};
pub use config::BrokerConfig;
pub use decryptor::{DekMaterial, KeyDecryptor};
pub use error::{BrokerError, BrokerResult, ErrorKind};
pub use identity::{KeyId, KeyIdentity};
pub use kek::KekDescriptor;
pub use registry::{KeyEntry, KeyRegistry, StateTag};
