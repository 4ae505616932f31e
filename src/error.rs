//! Error types for the spotcrypt library.
//!
//! This module provides a single error type covering key storage,
//! parsing, and messaging failure modes.

use thiserror::Error;

use crate::material::KeyRole;

/// The main error type for spotcrypt operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Cryptographic operation failed
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// Key or message parsing failed
    #[error("Parsing failed: {0}")]
    Parse(String),

    /// A key already exists under this identity label
    #[error("A key named '{0}' already exists")]
    DuplicateIdentity(String),

    /// Message encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// None of the candidate private keys could decrypt the message
    #[error("No matching private key for this message")]
    NoMatchingKey,

    /// Requested identity label was not found
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The record exists but has no key in the requested role
    #[error("No {role} key stored for '{label}'")]
    MissingRole { label: String, role: KeyRole },

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// rpgp OpenPGP error
    #[error("OpenPGP error: {0}")]
    OpenPgp(#[from] pgp::errors::Error),

    /// Command protocol (de)serialization error
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
}

/// A specialized Result type for spotcrypt operations.
pub type Result<T> = std::result::Result<T, Error>;
