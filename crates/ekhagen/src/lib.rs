#![forbid(unsafe_code)]

pub use ekhagen_asn1 as asn1;
pub use ekhagen_core as core;
pub use ekhagen_crypto as crypto;
pub use ekhagen_pkcs12 as pkcs12;

pub use ekhagen_core::{Error, Result};
pub use ekhagen_pkcs12::{load, Keystore, KeystoreEntry, LoadOptions, Password};
