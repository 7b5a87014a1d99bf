//! RSA-PSS signatures over the content digest.
//!
//! Signatures use PSS padding with SHA-256, MGF1(SHA-256) and a 32-byte
//! salt, applied to an already computed SHA-256 digest. The builder and
//! verifier only talk to the [`DigestSigner`] and [`DigestVerifier`]
//! traits, so key storage stays outside the format logic.

use crate::digest::DIGEST_LEN;
use crate::error::{PspfError, Result};
use crate::keys::{PublicKey, SigningKey};
use rsa::Pss;
use sha2::Sha256;

/// Produces a detached signature over a content digest.
pub trait DigestSigner {
    /// Signs a 32-byte SHA-256 digest.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::Input`] if `digest` is not 32 bytes long.
    fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>>;
}

/// Checks a detached signature over a content digest.
pub trait DigestVerifier {
    /// Verifies `signature` over a 32-byte SHA-256 digest.
    ///
    /// # Errors
    ///
    /// * [`PspfError::Input`] - `digest` is not 32 bytes long
    /// * [`PspfError::SignatureInvalid`] - the signature does not match
    fn verify_digest(&self, digest: &[u8], signature: &[u8]) -> Result<()>;

    /// Returns whether the signature is valid, folding all errors to `false`.
    fn is_valid(&self, digest: &[u8], signature: &[u8]) -> bool {
        self.verify_digest(digest, signature).is_ok()
    }
}

fn pss() -> Pss {
    Pss::new_with_salt::<Sha256>(DIGEST_LEN)
}

fn check_digest_len(digest: &[u8]) -> Result<()> {
    if digest.len() == DIGEST_LEN {
        Ok(())
    } else {
        Err(PspfError::input(format!(
            "digest must be a {DIGEST_LEN}-byte SHA-256 hash, got {} bytes",
            digest.len()
        )))
    }
}

impl DigestSigner for SigningKey {
    fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>> {
        check_digest_len(digest)?;
        self.as_rsa()
            .sign_with_rng(&mut rand::thread_rng(), pss(), digest)
            .map_err(|e| PspfError::Key {
                reason: format!("signing failed: {e}"),
            })
    }
}

impl DigestVerifier for PublicKey {
    fn verify_digest(&self, digest: &[u8], signature: &[u8]) -> Result<()> {
        check_digest_len(digest)?;
        if signature.len() != self.signature_len() {
            return Err(PspfError::SignatureInvalid {
                reason: format!(
                    "signature is {} bytes, expected {} for a {} bit key",
                    signature.len(),
                    self.signature_len(),
                    self.bits()
                ),
            });
        }
        self.as_rsa()
            .verify(pss(), digest, signature)
            .map_err(|e| PspfError::SignatureInvalid {
                reason: format!("RSA-PSS verification failed: {e}"),
            })
    }
}

/// Shared RSA keys for tests; generation is slow so each test binary does it once.
#[cfg(test)]
pub(crate) mod test_keys {
    use super::SigningKey;
    use std::sync::LazyLock;

    static PRIMARY: LazyLock<SigningKey> =
        LazyLock::new(|| SigningKey::generate(2048).expect("generate primary test key"));
    static SECONDARY: LazyLock<SigningKey> =
        LazyLock::new(|| SigningKey::generate(2048).expect("generate secondary test key"));

    pub(crate) fn primary() -> &'static SigningKey {
        &PRIMARY
    }

    pub(crate) fn secondary() -> &'static SigningKey {
        &SECONDARY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::ContentDigest;

    #[test]
    fn test_sign_verify_roundtrip() {
        let key = test_keys::primary();
        let digest = ContentDigest::of(b"launcher runtime metadata payload");

        let signature = key.sign_digest(digest.as_bytes()).unwrap();
        assert_eq!(signature.len(), 256);
        key.public_key()
            .verify_digest(digest.as_bytes(), &signature)
            .unwrap();
    }

    #[test]
    fn test_signatures_are_salted() {
        let key = test_keys::primary();
        let digest = ContentDigest::of(b"same content");
        let first = key.sign_digest(digest.as_bytes()).unwrap();
        let second = key.sign_digest(digest.as_bytes()).unwrap();
        assert_ne!(first, second);
        assert!(key.public_key().is_valid(digest.as_bytes(), &first));
        assert!(key.public_key().is_valid(digest.as_bytes(), &second));
    }

    #[test]
    fn test_other_digest_rejected() {
        let key = test_keys::primary();
        let signature = key
            .sign_digest(ContentDigest::of(b"original").as_bytes())
            .unwrap();

        let err = key
            .public_key()
            .verify_digest(ContentDigest::of(b"tampered").as_bytes(), &signature)
            .unwrap_err();
        assert!(err.is_signature_invalid());
    }

    #[test]
    fn test_wrong_size_signature_rejected() {
        let key = test_keys::primary();
        let digest = ContentDigest::of(b"content");
        let mut signature = key.sign_digest(digest.as_bytes()).unwrap();
        signature.truncate(128);

        let err = key
            .public_key()
            .verify_digest(digest.as_bytes(), &signature)
            .unwrap_err();
        assert!(err.is_signature_invalid());
        assert!(err.to_string().contains("expected 256"));
    }

    #[test]
    fn test_other_key_rejected() {
        let digest = ContentDigest::of(b"payload");
        let signature = test_keys::primary().sign_digest(digest.as_bytes()).unwrap();

        let err = test_keys::secondary()
            .public_key()
            .verify_digest(digest.as_bytes(), &signature)
            .unwrap_err();
        assert!(err.is_signature_invalid());
    }

    #[test]
    fn test_truncated_signature_rejected() {
        let key = test_keys::primary();
        let digest = ContentDigest::of(b"payload");
        let signature = key.sign_digest(digest.as_bytes()).unwrap();

        assert!(!key.public_key().is_valid(digest.as_bytes(), &signature[..128]));
        assert!(!key.public_key().is_valid(digest.as_bytes(), &[]));
    }

    #[test]
    fn test_wrong_digest_length_is_input_error() {
        let key = test_keys::primary();
        for len in [0, 31, 33, 64] {
            let err = key.sign_digest(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, PspfError::Input { .. }), "len {len}");

            let err = key.public_key().verify_digest(&vec![0u8; len], &[0u8; 256]).unwrap_err();
            assert!(matches!(err, PspfError::Input { .. }), "len {len}");
        }
    }
}
