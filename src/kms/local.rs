use crate::decryptor::DekMaterial;
use crate::error::{BrokerError, BrokerResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use zeroize::Zeroizing;

const DEK_LEN: usize = 96;

/// Unwrap a DEK previously wrapped with the local master key.
///
/// Wire format: a 12-byte nonce followed by the AES-256-GCM ciphertext
/// (authentication tag included), matching [`wrap`].
pub(crate) fn unwrap(master_key: &[u8; 32], encrypted_material: &[u8]) -> BrokerResult<DekMaterial> {
    if encrypted_material.len() < 12 {
        return Err(BrokerError::KmsFailure(
            "local-provider ciphertext too short".to_string(),
        ));
    }
    let (nonce_bytes, ciphertext) = encrypted_material.split_at(12);
    let cipher = Aes256Gcm::new_from_slice(master_key)
        .map_err(|_| BrokerError::KmsFailure("invalid local master key".to_string()))?;
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| BrokerError::KmsFailure("local unwrap failed".to_string()))?;
    if plaintext.len() != DEK_LEN {
        return Err(BrokerError::KmsFailure(format!(
            "local unwrap produced {} bytes, expected {DEK_LEN}",
            plaintext.len()
        )));
    }
    let mut buf = [0u8; DEK_LEN];
    buf.copy_from_slice(&plaintext);
    Ok(Zeroizing::new(buf))
}

/// Wrap a DEK with a local master key. Used by tests and by whatever tool
/// populates the key vault fixture; the broker itself only unwraps.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn wrap(master_key: &[u8; 32], dek: &[u8; DEK_LEN]) -> Vec<u8> {
    use aes_gcm::aead::OsRng;
    use rand::RngCore;

    let cipher = Aes256Gcm::new_from_slice(master_key).expect("valid key length in test fixture");
    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, dek.as_ref())
        .expect("encryption cannot fail in test fixture");
    let mut out = nonce_bytes.to_vec();
    out.extend_from_slice(&ciphertext);
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [3u8; 32];
        let dek = [0x11u8; DEK_LEN];
        let wrapped = wrap(&key, &dek);
        let recovered = unwrap(&key, &wrapped).unwrap();
        assert_eq!(&*recovered, &dek);
    }

    #[test]
    fn wrong_key_fails() {
        let dek = [0x11u8; DEK_LEN];
        let wrapped = wrap(&[3u8; 32], &dek);
        assert!(unwrap(&[4u8; 32], &wrapped).is_err());
    }
}
