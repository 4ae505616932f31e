//! Encryption and decryption of messages.
//!
//! All functions here are stateless: they take already-parsed key material
//! and operate on one message at a time. Encryption always produces a
//! single envelope readable by every recipient; decryption tries candidate
//! private keys in the order given and stops at the first success.

use std::io::{BufReader, Cursor, Read};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pgp::armor::Dearmor;
use pgp::composed::{
    Message, MessageBuilder, SignedPublicKey, SignedPublicSubKey, SignedSecretKey,
};
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::packet::{Packet, PacketParser, PublicKeyEncryptedSessionKey};
use pgp::types::{KeyDetails, Password};
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::material::{PrivateMaterial, PublicMaterial};

/// A successful decryption: the recovered text and the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// The recovered plaintext.
    pub plaintext: String,
    /// Label of the private key that decrypted the message.
    pub key_label: String,
}

/// Encrypt plaintext to one or more recipients.
///
/// Produces a single binary envelope with one session-key packet per
/// recipient encryption subkey; any one recipient can decrypt it alone.
///
/// # Arguments
/// * `plaintext` - The text to encrypt
/// * `recipients` - Public keys of all recipients
///
/// # Errors
/// [`Error::Encryption`] if `recipients` is empty, if a recipient has no
/// encryption-capable subkey, or if the primitive rejects a key.
///
/// # Example
///
/// ```no_run
/// use spotcrypt::{decrypt, encrypt, generate_key_pair};
///
/// let (alice_private, alice_public) = generate_key_pair("alice").unwrap();
/// let (bob_private, bob_public) = generate_key_pair("bob").unwrap();
///
/// let envelope = encrypt("Group message", &[&alice_public, &bob_public]).unwrap();
///
/// // Either recipient can decrypt on their own.
/// let opened = decrypt(&envelope, &[&bob_private]).unwrap();
/// assert_eq!(opened.plaintext, "Group message");
/// assert_eq!(opened.key_label, "bob");
/// ```
pub fn encrypt(plaintext: &str, recipients: &[&PublicMaterial]) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(Error::Encryption("no recipients specified".to_string()));
    }

    let mut rng = thread_rng();

    let mut encryption_keys = Vec::new();
    for material in recipients {
        let subkeys = encryption_subkeys(&material.key);
        if subkeys.is_empty() {
            return Err(Error::Encryption(format!(
                "no encryption-capable subkey for '{}'",
                material.label
            )));
        }
        encryption_keys.extend(subkeys);
    }

    log::debug!("encrypting to {} recipient key(s)", encryption_keys.len());

    let mut builder = MessageBuilder::from_bytes("", plaintext.as_bytes().to_vec())
        .seipd_v1(&mut rng, SymmetricKeyAlgorithm::AES256);

    for key in &encryption_keys {
        builder
            .encrypt_to_key(&mut rng, key)
            .map_err(|e| Error::Encryption(e.to_string()))?;
    }

    builder
        .to_vec(&mut rng)
        .map_err(|e| Error::Encryption(e.to_string()))
}

/// Encrypt plaintext and return the envelope in its text-embeddable form.
///
/// The output is the standard-alphabet base64 of the binary envelope and
/// starts with the [`ENVELOPE_MARKER`](crate::scanner::ENVELOPE_MARKER)
/// prefix the page scanner looks for.
pub fn encrypt_to_base64(plaintext: &str, recipients: &[&PublicMaterial]) -> Result<String> {
    let envelope = encrypt(plaintext, recipients)?;
    Ok(STANDARD.encode(envelope))
}

/// Decrypt an envelope by trying candidate private keys in order.
///
/// Returns as soon as one key succeeds. Failed attempts are not surfaced
/// individually: a message that none of the keys can open yields
/// [`Error::NoMatchingKey`] with no indication of why each key failed.
///
/// # Arguments
/// * `ciphertext` - The envelope, binary or armored
/// * `candidates` - Private keys to try, in order
pub fn decrypt(ciphertext: &[u8], candidates: &[&PrivateMaterial]) -> Result<Decrypted> {
    // Malformed input is a parse failure, not a key mismatch.
    parse_envelope(ciphertext)?;

    // Generated and imported keys carry no passphrase.
    let password: Password = "".into();

    for (tried, material) in candidates.iter().enumerate() {
        if let Some(plaintext) = try_decrypt_with(ciphertext, &password, &material.key) {
            log::debug!("decrypted after {} attempt(s)", tried + 1);
            return Ok(Decrypted {
                plaintext: String::from_utf8_lossy(&plaintext).into_owned(),
                key_label: material.label.clone(),
            });
        }
    }

    log::debug!("no matching key among {} candidate(s)", candidates.len());
    Err(Error::NoMatchingKey)
}

/// Decrypt a base64-encoded envelope.
///
/// # Errors
/// [`Error::Parse`] if the text is not valid base64; otherwise as
/// [`decrypt`].
pub fn decrypt_base64(text: &str, candidates: &[&PrivateMaterial]) -> Result<Decrypted> {
    let envelope = STANDARD
        .decode(text.trim())
        .map_err(|e| Error::Parse(e.to_string()))?;
    decrypt(&envelope, candidates)
}

/// List the key IDs an envelope was encrypted for.
///
/// Walks the leading session-key packets and reports each recipient key ID
/// as uppercase hex. Anonymous-recipient packets are skipped.
pub fn encrypted_for(ciphertext: &[u8]) -> Result<Vec<String>> {
    let mut key_ids = Vec::new();

    let data = if ciphertext.starts_with(b"-----BEGIN PGP") {
        let cursor = Cursor::new(ciphertext);
        let dearmor = Dearmor::new(cursor);
        let mut buf = Vec::new();
        let mut reader = BufReader::new(dearmor);
        reader.read_to_end(&mut buf)?;
        buf
    } else {
        ciphertext.to_vec()
    };

    let parser = PacketParser::new(Cursor::new(&data));

    for packet_result in parser {
        match packet_result {
            Ok(packet) => {
                if let Packet::PublicKeyEncryptedSessionKey(pkesk) = packet {
                    let key_id = match pkesk {
                        PublicKeyEncryptedSessionKey::V3 { id, .. } => {
                            format!("{}", id).to_uppercase()
                        }
                        PublicKeyEncryptedSessionKey::V6 { fingerprint, .. } => {
                            if let Some(fp) = fingerprint {
                                format!("{}", fp).to_uppercase()
                            } else {
                                continue;
                            }
                        }
                        PublicKeyEncryptedSessionKey::Other { .. } => {
                            continue;
                        }
                    };
                    key_ids.push(key_id);
                }
            }
            Err(_) => {
                // Past the session-key packets; the rest is encrypted data.
                break;
            }
        }
    }

    Ok(key_ids)
}

/// List the key IDs a base64-encoded envelope was encrypted for.
pub fn encrypted_for_base64(text: &str) -> Result<Vec<String>> {
    let envelope = STANDARD
        .decode(text.trim())
        .map_err(|e| Error::Parse(e.to_string()))?;
    encrypted_for(&envelope)
}

/// Parse an envelope (armored or binary) into a message.
fn parse_envelope(ciphertext: &[u8]) -> Result<Message<'_>> {
    match Message::from_armor(Cursor::new(ciphertext)) {
        Ok((message, _headers)) => Ok(message),
        Err(_) => Message::from_bytes(ciphertext).map_err(|e| Error::Parse(e.to_string())),
    }
}

/// Attempt decryption with one key; any failure means "not this key".
fn try_decrypt_with(
    ciphertext: &[u8],
    password: &Password,
    secret_key: &SignedSecretKey,
) -> Option<Vec<u8>> {
    let message = parse_envelope(ciphertext).ok()?;

    // Decryption consumes the message, so the legacy retry re-parses.
    let decrypted = match message.decrypt(password, secret_key) {
        Ok(message) => message,
        Err(_) => {
            let message = parse_envelope(ciphertext).ok()?;
            message.decrypt_legacy(password, secret_key).ok()?
        }
    };

    let mut decompressed = if decrypted.is_compressed() {
        decrypted.decompress().ok()?
    } else {
        decrypted
    };

    decompressed.as_data_vec().ok()
}

/// Encryption-capable subkeys of a public key.
fn encryption_subkeys(key: &SignedPublicKey) -> Vec<SignedPublicSubKey> {
    let mut valid_keys = Vec::new();

    for subkey in &key.public_subkeys {
        if !subkey.key.algorithm().can_encrypt() {
            continue;
        }

        let has_encryption_flag = subkey.signatures.iter().any(|sig| {
            let flags = sig.key_flags();
            flags.encrypt_comms() || flags.encrypt_storage()
        });

        if !has_encryption_flag {
            continue;
        }

        valid_keys.push(subkey.clone());
    }

    valid_keys
}
