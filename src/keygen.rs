//! Key pair generation.
//!
//! Generates the one cipher suite this library traffics in: an EdDSA
//! (legacy Ed25519) primary key for certification and signing, with a
//! single ECDH Curve25519 subkey for encryption. Generated keys carry no
//! passphrase; the label becomes the key's user ID.

use pgp::composed::{EncryptionCaps, KeyType, SecretKeyParamsBuilder, SubkeyParamsBuilder};
use pgp::crypto::ecc_curve::ECCCurve;
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::material::{PrivateMaterial, PublicMaterial};
use crate::parse::{parse_private, parse_public};

/// Generate a fresh key pair under the given identity label.
///
/// # Arguments
/// * `label` - Identity label, stored as the key's user ID
///
/// # Returns
/// The private key and its public counterpart, both armored and parsed.
///
/// # Example
///
/// ```no_run
/// use spotcrypt::generate_key_pair;
///
/// let (private, public) = generate_key_pair("Alice <alice@example.com>").unwrap();
/// assert_eq!(private.label, public.label);
/// println!("{}", public.armored);
/// ```
pub fn generate_key_pair(label: &str) -> Result<(PrivateMaterial, PublicMaterial)> {
    if label.trim().is_empty() {
        return Err(Error::InvalidInput("label must not be empty".to_string()));
    }

    let mut rng = thread_rng();

    let mut subkey_builder = SubkeyParamsBuilder::default();
    subkey_builder
        .key_type(KeyType::ECDH(ECCCurve::Curve25519))
        .can_encrypt(EncryptionCaps::All)
        .can_sign(false)
        .can_authenticate(false);
    let encryption_subkey = subkey_builder
        .build()
        .map_err(|e| Error::Crypto(e.to_string()))?;

    let mut key_params = SecretKeyParamsBuilder::default();
    key_params
        .key_type(KeyType::Ed25519Legacy)
        .can_certify(true)
        .can_sign(true)
        .can_encrypt(EncryptionCaps::None)
        .primary_user_id(label.to_string())
        .subkeys(vec![encryption_subkey]);

    let secret_key_params = key_params.build().map_err(|e| Error::Crypto(e.to_string()))?;
    let secret_key = secret_key_params.generate(&mut rng)?;

    let private_armored = secret_key.to_armored_string(None.into())?;
    let public_armored = secret_key.to_public_key().to_armored_string(None.into())?;

    // Re-parsing gives both halves the one construction path used for
    // imported keys, so a generated key behaves exactly like an imported one.
    let private = parse_private(&private_armored)?;
    let public = parse_public(&public_armored)?;

    Ok((private, public))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_labels_match() {
        let (private, public) = generate_key_pair("KeyGen <keygen@example.com>").unwrap();
        assert_eq!(private.label, "KeyGen <keygen@example.com>");
        assert_eq!(public.label, "KeyGen <keygen@example.com>");
    }

    #[test]
    fn test_generate_has_encryption_subkey() {
        let (_, public) = generate_key_pair("subkeys").unwrap();
        assert_eq!(public.encryption_key_ids().len(), 1);
    }

    #[test]
    fn test_generate_empty_label_fails() {
        assert!(generate_key_pair("   ").is_err());
    }

    #[test]
    fn test_derived_public_matches_generated() {
        let (private, public) = generate_key_pair("derive-check").unwrap();
        let derived = private.to_public().unwrap();
        assert_eq!(derived.fingerprint(), public.fingerprint());
    }
}
