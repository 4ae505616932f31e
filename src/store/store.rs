//! KeyStore implementation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::keygen::generate_key_pair;
use crate::material::{ExportedKey, KeyMaterial, KeyRecord, KeyRole, PrivateMaterial, PublicMaterial};
use crate::parse::{parse_material, parse_private, parse_public};

use super::schema::init_schema;

/// SQLite-backed store of identity-labeled key records.
///
/// Every record is keyed by its label (the key's user ID) and carries up
/// to two slots: the public half and the private half. The whole record
/// set is held in memory, ordered by label, and hydrated from the database
/// on open; every mutation writes through to the database before touching
/// the in-memory map.
///
/// # Database Schema
///
/// A single `key_records` table keyed by label, with one nullable TEXT
/// column per slot holding the ASCII-armored key.
///
/// # Thread Safety
///
/// The `KeyStore` is not `Sync` due to the underlying SQLite connection.
/// For multi-threaded access, create a separate `KeyStore` instance per
/// thread or use external synchronization.
pub struct KeyStore {
    conn: Connection,
    path: Option<PathBuf>,
    records: BTreeMap<String, KeyRecord>,
}

impl KeyStore {
    /// Open or create a key store at the given path.
    ///
    /// If the database file doesn't exist, it will be created with the
    /// appropriate schema. Parent directories must already exist. Existing
    /// records are loaded into memory immediately.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use spotcrypt::KeyStore;
    ///
    /// let store = KeyStore::open("/home/user/.myapp/keys.db").unwrap();
    /// println!("Keys in store: {}", store.count());
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;

        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        init_schema(&conn)?;

        let mut store = Self {
            conn,
            path: Some(path.to_path_buf()),
            records: BTreeMap::new(),
        };
        store.reload()?;

        Ok(store)
    }

    /// Create an in-memory key store.
    ///
    /// Creates a temporary store that exists only in memory. Useful for
    /// testing or when persistence is not needed.
    ///
    /// # Example
    ///
    /// ```
    /// use spotcrypt::KeyStore;
    ///
    /// let store = KeyStore::open_in_memory().unwrap();
    /// assert!(store.path().is_none());
    /// assert_eq!(store.count(), 0);
    /// ```
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        init_schema(&conn)?;

        Ok(Self {
            conn,
            path: None,
            records: BTreeMap::new(),
        })
    }

    /// Rebuild the in-memory map from the database.
    ///
    /// A slot whose armored text no longer parses is skipped with a
    /// warning rather than failing the whole load; a row with no readable
    /// slot at all is dropped. A slot whose key names a different user ID
    /// than the row label keeps the row label.
    pub fn reload(&mut self) -> Result<()> {
        let mut loaded = BTreeMap::new();

        {
            let mut stmt = self
                .conn
                .prepare("SELECT label, public_key, private_key FROM key_records ORDER BY label")?;

            let rows = stmt.query_map([], |row| {
                let label: String = row.get(0)?;
                let public: Option<String> = row.get(1)?;
                let private: Option<String> = row.get(2)?;
                Ok((label, public, private))
            })?;

            for row in rows {
                let (label, public, private) = row?;
                let mut record = KeyRecord::new(label.clone());

                if let Some(armored) = public {
                    match parse_public(&armored) {
                        Ok(mut material) => {
                            if material.label != label {
                                log::warn!(
                                    "public key stored under '{}' names '{}'; keeping stored label",
                                    label,
                                    material.label
                                );
                                material.label = label.clone();
                            }
                            record.public = Some(material);
                        }
                        Err(e) => {
                            log::warn!("skipping unreadable public key for '{}': {}", label, e)
                        }
                    }
                }

                if let Some(armored) = private {
                    match parse_private(&armored) {
                        Ok(mut material) => {
                            if material.label != label {
                                log::warn!(
                                    "private key stored under '{}' names '{}'; keeping stored label",
                                    label,
                                    material.label
                                );
                                material.label = label.clone();
                            }
                            record.private = Some(material);
                        }
                        Err(e) => {
                            log::warn!("skipping unreadable private key for '{}': {}", label, e)
                        }
                    }
                }

                if record.is_empty() {
                    log::warn!("dropping record '{}': no usable key material", label);
                    continue;
                }

                loaded.insert(label, record);
            }
        }

        self.records = loaded;
        Ok(())
    }

    /// Generate a fresh key pair under a new label.
    ///
    /// Creates an Ed25519 signing key with a Curve25519 encryption subkey,
    /// stores both halves, and returns the new record.
    ///
    /// # Arguments
    /// * `label` - Identity label, used as the key's user ID
    ///
    /// # Errors
    /// - [`Error::DuplicateIdentity`] if any record already uses the label
    /// - [`Error::InvalidInput`] if the label is empty
    ///
    /// # Example
    ///
    /// ```no_run
    /// use spotcrypt::KeyStore;
    ///
    /// let mut store = KeyStore::open("keys.db").unwrap();
    ///
    /// let record = store.generate("alice").unwrap();
    /// assert!(record.public.is_some());
    /// assert!(record.private.is_some());
    /// ```
    pub fn generate(&mut self, label: &str) -> Result<&KeyRecord> {
        if self.records.contains_key(label) {
            return Err(Error::DuplicateIdentity(label.to_string()));
        }

        let (private, public) = generate_key_pair(label)?;

        let record = KeyRecord {
            label: label.to_string(),
            public: Some(public),
            private: Some(private),
        };

        self.persist(&record)?;
        self.records.insert(label.to_string(), record);

        self.records
            .get(label)
            .ok_or_else(|| Error::KeyNotFound(label.to_string()))
    }

    /// Import an armored key into the store.
    ///
    /// The record label is taken from the key's first user ID. A public
    /// key fills the public slot of its record; a private key fills the
    /// private slot and, when the public slot is still empty, the derived
    /// public half as well. Importing a role a record already has is
    /// rejected, so an import can never silently replace key material.
    ///
    /// # Arguments
    /// * `armored` - ASCII-armored public or private key
    ///
    /// # Returns
    /// The record the key was merged into.
    ///
    /// # Errors
    /// - [`Error::Parse`] if the text is not a readable armored key
    /// - [`Error::DuplicateIdentity`] if the record already has this role
    ///
    /// # Example
    ///
    /// ```no_run
    /// use spotcrypt::KeyStore;
    ///
    /// let mut store = KeyStore::open("keys.db").unwrap();
    ///
    /// let armored = std::fs::read_to_string("alice.pub.asc").unwrap();
    /// let record = store.import(&armored).unwrap();
    /// println!("imported '{}'", record.label);
    /// ```
    pub fn import(&mut self, armored: &str) -> Result<&KeyRecord> {
        let material = parse_material(armored)?;
        let label = material.label().to_string();

        let mut record = self
            .records
            .get(&label)
            .cloned()
            .unwrap_or_else(|| KeyRecord::new(label.clone()));

        merge_material(&mut record, material)?;

        self.persist(&record)?;
        self.records.insert(label.clone(), record);

        self.records
            .get(&label)
            .ok_or_else(|| Error::KeyNotFound(label))
    }

    /// Import an armored key from a file.
    ///
    /// # Arguments
    /// * `path` - Path to the armored key file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use spotcrypt::KeyStore;
    ///
    /// let mut store = KeyStore::open("keys.db").unwrap();
    /// let record = store.import_file("alice.pub.asc").unwrap();
    /// println!("imported '{}'", record.label);
    /// ```
    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<&KeyRecord> {
        let armored = std::fs::read_to_string(path.as_ref())?;
        self.import(&armored)
    }

    /// Delete one role of a record.
    ///
    /// Removing a record's last remaining role removes the record itself.
    ///
    /// # Arguments
    /// * `label` - The record's label
    /// * `role` - Which half to delete
    ///
    /// # Errors
    /// - [`Error::KeyNotFound`] if no record uses the label
    /// - [`Error::MissingRole`] if the record does not hold that role
    ///
    /// # Example
    ///
    /// ```no_run
    /// use spotcrypt::{KeyRole, KeyStore};
    ///
    /// let mut store = KeyStore::open("keys.db").unwrap();
    ///
    /// // Drop the private half, keep the public one.
    /// store.delete("alice", KeyRole::Private).unwrap();
    /// assert!(store.contains("alice"));
    /// ```
    pub fn delete(&mut self, label: &str, role: KeyRole) -> Result<()> {
        let mut record = self
            .records
            .get(label)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(label.to_string()))?;

        if !record.has_role(role) {
            return Err(Error::MissingRole {
                label: label.to_string(),
                role,
            });
        }

        match role {
            KeyRole::Public => record.public = None,
            KeyRole::Private => record.private = None,
        }

        if record.is_empty() {
            let rows = self
                .conn
                .execute("DELETE FROM key_records WHERE label = ?1", [label])?;
            if rows == 0 {
                return Err(Error::KeyNotFound(label.to_string()));
            }
            self.records.remove(label);
        } else {
            self.persist(&record)?;
            self.records.insert(label.to_string(), record);
        }

        Ok(())
    }

    /// Export one role of a record as armored text.
    ///
    /// The returned [`ExportedKey`] carries the armored key exactly as
    /// stored, tagged with its role.
    ///
    /// # Arguments
    /// * `label` - The record's label
    /// * `role` - Which half to export
    ///
    /// # Errors
    /// - [`Error::KeyNotFound`] if no record uses the label
    /// - [`Error::MissingRole`] if the record does not hold that role
    ///
    /// # Example
    ///
    /// ```no_run
    /// use spotcrypt::{KeyRole, KeyStore};
    ///
    /// let store = KeyStore::open("keys.db").unwrap();
    ///
    /// let exported = store.export("alice", KeyRole::Public).unwrap();
    /// std::fs::write("alice.pub.asc", exported.armored()).unwrap();
    /// ```
    pub fn export(&self, label: &str, role: KeyRole) -> Result<ExportedKey> {
        let record = self
            .records
            .get(label)
            .ok_or_else(|| Error::KeyNotFound(label.to_string()))?;

        let exported = match role {
            KeyRole::Public => record
                .public
                .as_ref()
                .map(|material| ExportedKey::Public(material.armored.clone())),
            KeyRole::Private => record
                .private
                .as_ref()
                .map(|material| ExportedKey::Private(material.armored.clone())),
        };

        exported.ok_or_else(|| Error::MissingRole {
            label: label.to_string(),
            role,
        })
    }

    /// Check whether a record exists for a label.
    pub fn contains(&self, label: &str) -> bool {
        self.records.contains_key(label)
    }

    /// Look up a record by label.
    pub fn get(&self, label: &str) -> Option<&KeyRecord> {
        self.records.get(label)
    }

    /// Number of records in the store.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// All records, in label order.
    pub fn records(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.values()
    }

    /// All labels, in order.
    pub fn labels(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    /// Every stored public key, in label order.
    ///
    /// The slice-of-references shape feeds directly into
    /// [`encrypt`](crate::encrypt) and friends.
    pub fn public_keys(&self) -> Vec<&PublicMaterial> {
        self.records
            .values()
            .filter_map(|record| record.public.as_ref())
            .collect()
    }

    /// Every stored private key, in label order.
    pub fn private_keys(&self) -> Vec<&PrivateMaterial> {
        self.records
            .values()
            .filter_map(|record| record.private.as_ref())
            .collect()
    }

    /// Get database path.
    ///
    /// Returns the path to the SQLite database file, or `None` for
    /// in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write one record through to the database.
    fn persist(&self, record: &KeyRecord) -> Result<()> {
        let public = record.public.as_ref().map(|m| m.armored.as_str());
        let private = record.private.as_ref().map(|m| m.armored.as_str());

        self.conn.execute(
            "INSERT OR REPLACE INTO key_records (label, public_key, private_key, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)",
            params![&record.label, public, private],
        )?;

        Ok(())
    }
}

/// Merge parsed key material into a record.
///
/// Occupied slots are never overwritten; merging into one fails with
/// [`Error::DuplicateIdentity`]. A private key fills an empty public slot
/// with its derived counterpart, but only best-effort: the private key is
/// importable on its own, and a derivation failure just leaves the public
/// slot empty.
fn merge_material(record: &mut KeyRecord, material: KeyMaterial) -> Result<()> {
    match material {
        KeyMaterial::Public(public) => {
            if record.public.is_some() {
                return Err(Error::DuplicateIdentity(record.label.clone()));
            }
            record.public = Some(public);
        }
        KeyMaterial::Private(private) => {
            if record.private.is_some() {
                return Err(Error::DuplicateIdentity(record.label.clone()));
            }
            if record.public.is_none() {
                match private.to_public() {
                    Ok(public) => record.public = Some(public),
                    Err(e) => {
                        log::debug!("cannot derive public key for '{}': {}", record.label, e)
                    }
                }
            }
            record.private = Some(private);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let store = KeyStore::open_in_memory().unwrap();
        assert!(store.path().is_none());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_generate_and_lookup() {
        let mut store = KeyStore::open_in_memory().unwrap();
        store.generate("alice").unwrap();

        assert!(store.contains("alice"));
        let record = store.get("alice").unwrap();
        assert_eq!(record.label, "alice");
        assert!(record.public.is_some());
        assert!(record.private.is_some());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut store = KeyStore::open_in_memory().unwrap();
        store.generate("alice").unwrap();

        let result = store.generate("alice");
        assert!(matches!(result, Err(Error::DuplicateIdentity(_))));
    }

    #[test]
    fn test_delete_unknown_label() {
        let mut store = KeyStore::open_in_memory().unwrap();
        let result = store.delete("nobody", KeyRole::Public);
        assert!(matches!(result, Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_merge_keeps_private_when_public_underivable() {
        let (mut private, _) = generate_key_pair("merge-fallback").unwrap();
        // A userless key cannot be re-parsed into public material.
        private.key.details.users.clear();
        assert!(private.to_public().is_err());

        let mut record = KeyRecord::new("merge-fallback");
        merge_material(&mut record, KeyMaterial::Private(private)).unwrap();

        assert!(record.private.is_some());
        assert!(record.public.is_none());
    }
}
