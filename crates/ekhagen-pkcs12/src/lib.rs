#![forbid(unsafe_code)]

//! PKCS#12 (RFC 7292) container reader.
//!
//! [`load`] takes the container bytes and a password and returns a
//! [`Keystore`]. The integrity MAC is verified before anything is
//! decrypted. Legacy PKCS#12 PBE schemes and PBES2 with PBKDF2 are
//! supported, including the Chinese GM variants (HMAC-SM3, SM4-CBC).
//!
//! The lower layers are public for callers that need to inspect a container
//! without fully loading it: [`model`] decodes structure, [`algorithm`]
//! resolves encryption parameters, [`decrypt`] and [`mac`] run the
//! cryptography and [`entry`] assembles entries from bags.

pub mod algorithm;
pub mod decrypt;
pub mod entry;
pub mod keystore;
pub mod loader;
pub mod mac;
pub mod model;
pub mod password;

pub use entry::{EntryKind, KeystoreEntry, OrphanKeyPolicy, SecretKey};
pub use keystore::Keystore;
pub use loader::{load, LoadOptions};
pub use password::Password;
