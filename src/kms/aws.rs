use aws_sdk_kms::primitives::Blob;
use bson::doc;

/// Shape the request bytes for an AWS KMS `Decrypt` call.
///
/// This only builds the payload; it does not send it. The ciphertext is
/// carried through [`aws_sdk_kms::primitives::Blob`] (the same wrapper the
/// SDK's own `decrypt().ciphertext_blob(..)` builder takes) so that a
/// transport layer wiring this crate to the real SDK can do so without a
/// conversion step, then flattened to bytes for callers that drive their
/// own HTTP client instead.
pub(crate) fn build_decrypt_request(key_arn: &str, region: &str, ciphertext: &[u8]) -> Vec<u8> {
    let blob = Blob::new(ciphertext.to_vec());
    let request = doc! {
        "operation": "Decrypt",
        "keyId": key_arn,
        "region": region,
        "ciphertextBlob": bson::Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: blob.into_inner(),
        },
    };
    bson::to_vec(&request).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
    use super::*;

    #[test]
    fn request_carries_key_and_ciphertext() {
        let bytes = build_decrypt_request("arn:aws:kms:us-east-1:1:key/abc", "us-east-1", b"ct");
        let doc: bson::Document = bson::from_slice(&bytes).unwrap();
        assert_eq!(doc.get_str("keyId").unwrap(), "arn:aws:kms:us-east-1:1:key/abc");
        assert_eq!(doc.get_str("region").unwrap(), "us-east-1");
    }
}
