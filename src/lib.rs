//! # Spotcrypt
//!
//! An OpenPGP key store and messaging engine with in-page ciphertext
//! discovery, built on [rpgp](https://docs.rs/pgp).
//!
//! The library covers the full life of a message:
//!
//! - **Key Records**: Identity-labeled records pairing a public and a private key
//! - **Key Storage**: SQLite-backed persistence with a label-ordered in-memory view
//! - **Encryption/Decryption**: Encrypt to many recipients, decrypt by trying candidate keys
//! - **Page Scanning**: Find base64 ciphertext spans in free text and substitute decryptions
//! - **Messaging Bridge**: JSON command surface for driving the scanner
//!
//! ## Quick Start
//!
//! ```
//! use spotcrypt::{decrypt_base64, encrypt_to_base64, KeyStore};
//!
//! let mut store = KeyStore::open_in_memory().unwrap();
//! store.generate("alice").unwrap();
//!
//! // Encrypt to every stored public key.
//! let ciphertext = encrypt_to_base64("Hello!", &store.public_keys()).unwrap();
//!
//! // Decrypt by trying every stored private key.
//! let opened = decrypt_base64(&ciphertext, &store.private_keys()).unwrap();
//! assert_eq!(opened.plaintext, "Hello!");
//! assert_eq!(opened.key_label, "alice");
//! ```
//!
//! ## Design
//!
//! Crypto operations are standalone functions over parsed key material;
//! the [`KeyStore`] owns persistence and hands out references that feed
//! straight into them. Nothing holds global state, so several stores can
//! coexist in one process.

// Modules
mod bridge;
mod engine;
mod error;
mod keygen;
mod material;
mod parse;
mod scanner;

pub mod store;

// Re-export error types
pub use error::{Error, Result};

// Re-export key material types
pub use material::{
    ExportedKey,
    KeyMaterial,
    KeyRecord,
    KeyRole,
    PrivateMaterial,
    PublicMaterial,
};

// Re-export parsing functions
pub use parse::{
    classify_armor,
    parse_material,
    parse_private,
    parse_public,
    PRIVATE_ARMOR_HEADER,
    PUBLIC_ARMOR_HEADER,
};

// Re-export key generation
pub use keygen::generate_key_pair;

// Re-export encryption and decryption functions
pub use engine::{
    decrypt,
    decrypt_base64,
    encrypt,
    encrypt_to_base64,
    encrypted_for,
    encrypted_for_base64,
    Decrypted,
};

// Re-export page scanning
pub use scanner::{
    decrypt_and_substitute,
    find_ciphertext_spans,
    CipherSpan,
    ScanOutcome,
    ENVELOPE_MARKER,
};

// Re-export the messaging bridge
pub use bridge::{
    command_from_json,
    handle_command,
    response_to_json,
    PageCommand,
    PageResponse,
};

// Re-export the key store
pub use store::KeyStore;
