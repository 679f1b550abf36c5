#![forbid(unsafe_code)]

//! Primitive selection for PKCS#12 decryption.
//!
//! Maps algorithm identifiers onto RustCrypto implementations: digests,
//! the two password-based key derivations, HMAC verification and CBC-mode
//! block ciphers. Everything secret that leaves this crate is wrapped in
//! [`zeroize::Zeroizing`].

pub mod cipher;
pub mod digest;
pub mod kdf;
pub mod mac;

pub use crate::cipher::BlockCipher;
pub use crate::digest::HashAlgorithm;
