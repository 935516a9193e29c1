//! Anonymous sealed-box encryption for the secrets host
//!
//! Values are sealed to the store's X25519 public key with the libsodium-compatible
//! `crypto_box_seal` construction, so only the host can open them and the sender stays
//! anonymous.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto_box::{PublicKey, KEY_SIZE};
use rand::rngs::OsRng;

use crate::error::{Result, RotationError};

/// Decode a base64 public key as served by the secrets host
pub fn decode_public_key(public_key_b64: &str) -> Result<PublicKey> {
    let bytes = STANDARD
        .decode(public_key_b64.trim())
        .map_err(|e| RotationError::InvalidPublicKey(e.to_string()))?;

    let bytes: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        RotationError::InvalidPublicKey(format!(
            "expected {} bytes, got {}",
            KEY_SIZE,
            bytes.len()
        ))
    })?;

    Ok(PublicKey::from(bytes))
}

/// Seal a UTF-8 value under a base64 public key, returning base64 ciphertext
pub fn seal(public_key_b64: &str, plaintext: &str) -> Result<String> {
    let public_key = decode_public_key(public_key_b64)?;

    let sealed = public_key
        .seal(&mut OsRng, plaintext.as_bytes())
        .map_err(|_| RotationError::Sealing)?;

    Ok(STANDARD.encode(sealed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_box::SecretKey;

    fn keypair() -> (SecretKey, String) {
        let secret = SecretKey::generate(&mut OsRng);
        let public_b64 = STANDARD.encode(secret.public_key().as_bytes());
        (secret, public_b64)
    }

    fn open(secret: &SecretKey, sealed_b64: &str) -> String {
        let ciphertext = STANDARD.decode(sealed_b64).unwrap();
        String::from_utf8(secret.unseal(&ciphertext).unwrap()).unwrap()
    }

    #[test]
    fn test_seal_opens_with_store_key() {
        let (secret, public_b64) = keypair();

        let sealed = seal(&public_b64, "AKIA_NEW").unwrap();
        assert_eq!(open(&secret, &sealed), "AKIA_NEW");
    }

    #[test]
    fn test_seal_differs_across_stores() {
        let (repo_secret, repo_public) = keypair();
        let (org_secret, org_public) = keypair();

        let for_repo = seal(&repo_public, "SECRET_NEW").unwrap();
        let for_org = seal(&org_public, "SECRET_NEW").unwrap();

        assert_ne!(for_repo, for_org);
        assert_eq!(open(&repo_secret, &for_repo), "SECRET_NEW");
        assert_eq!(open(&org_secret, &for_org), "SECRET_NEW");

        let foreign = STANDARD.decode(&for_repo).unwrap();
        assert!(org_secret.unseal(&foreign).is_err());
    }

    #[test]
    fn test_seal_is_randomized() {
        let (secret, public_b64) = keypair();

        let first = seal(&public_b64, "value").unwrap();
        let second = seal(&public_b64, "value").unwrap();

        assert_ne!(first, second);
        assert_eq!(open(&secret, &second), "value");
    }

    #[test]
    fn test_seal_rejects_bad_base64() {
        let err = seal("not base64!!", "value").unwrap_err();
        assert!(matches!(err, RotationError::InvalidPublicKey(_)));
    }

    #[test]
    fn test_seal_rejects_wrong_length() {
        let short = STANDARD.encode([7u8; 16]);
        let err = seal(&short, "value").unwrap_err();
        assert!(matches!(err, RotationError::InvalidPublicKey(msg) if msg.contains("16")));
    }
}
