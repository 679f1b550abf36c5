#![forbid(unsafe_code)]

//! Hash algorithms usable as PKCS#12 MAC digests and PBKDF2 PRFs.

use const_oid::ObjectIdentifier;
use ekhagen_core::oid;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha512_224,
    Sha512_256,
    Sm3,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 8] = [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha512_224,
        HashAlgorithm::Sha512_256,
        HashAlgorithm::Sm3,
    ];

    /// Look up a bare digest identifier, as found in `MacData`.
    pub fn from_oid(id: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.oid() == *id)
    }

    /// Look up an HMAC identifier, as found in a PBKDF2 `prf` field.
    pub fn from_hmac_oid(id: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.hmac_oid() == *id)
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgorithm::Sha1 => oid::SHA1,
            HashAlgorithm::Sha224 => oid::SHA224,
            HashAlgorithm::Sha256 => oid::SHA256,
            HashAlgorithm::Sha384 => oid::SHA384,
            HashAlgorithm::Sha512 => oid::SHA512,
            HashAlgorithm::Sha512_224 => oid::SHA512_224,
            HashAlgorithm::Sha512_256 => oid::SHA512_256,
            HashAlgorithm::Sm3 => oid::SM3,
        }
    }

    pub fn hmac_oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgorithm::Sha1 => oid::HMAC_SHA1,
            HashAlgorithm::Sha224 => oid::HMAC_SHA224,
            HashAlgorithm::Sha256 => oid::HMAC_SHA256,
            HashAlgorithm::Sha384 => oid::HMAC_SHA384,
            HashAlgorithm::Sha512 => oid::HMAC_SHA512,
            HashAlgorithm::Sha512_224 => oid::HMAC_SHA512_224,
            HashAlgorithm::Sha512_256 => oid::HMAC_SHA512_256,
            HashAlgorithm::Sm3 => oid::HMAC_SM3,
        }
    }

    /// Standard algorithm name, e.g. `SHA-256`.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha224 => "SHA-224",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
            HashAlgorithm::Sha512_224 => "SHA-512/224",
            HashAlgorithm::Sha512_256 => "SHA-512/256",
            HashAlgorithm::Sm3 => "SM3",
        }
    }

    /// Name without separators, as used in composite names like `HmacSHA256`.
    pub fn compact_name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha224 => "SHA224",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha384 => "SHA384",
            HashAlgorithm::Sha512 => "SHA512",
            HashAlgorithm::Sha512_224 => "SHA512/224",
            HashAlgorithm::Sha512_256 => "SHA512/256",
            HashAlgorithm::Sm3 => "SM3",
        }
    }

    /// Digest length in bytes (`u` in RFC 7292 appendix B).
    pub fn output_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 | HashAlgorithm::Sha512_224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sha512_256 | HashAlgorithm::Sm3 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Compression block length in bytes (`v` in RFC 7292 appendix B).
    pub fn block_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 | HashAlgorithm::Sha224 | HashAlgorithm::Sha256 | HashAlgorithm::Sm3 => 64,
            HashAlgorithm::Sha384
            | HashAlgorithm::Sha512
            | HashAlgorithm::Sha512_224
            | HashAlgorithm::Sha512_256 => 128,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run `$body` with `$D` bound to the RustCrypto type for `$alg`.
macro_rules! with_digest {
    ($alg:expr, $D:ident => $body:expr) => {
        match $alg {
            $crate::digest::HashAlgorithm::Sha1 => {
                type $D = sha1::Sha1;
                $body
            }
            $crate::digest::HashAlgorithm::Sha224 => {
                type $D = sha2::Sha224;
                $body
            }
            $crate::digest::HashAlgorithm::Sha256 => {
                type $D = sha2::Sha256;
                $body
            }
            $crate::digest::HashAlgorithm::Sha384 => {
                type $D = sha2::Sha384;
                $body
            }
            $crate::digest::HashAlgorithm::Sha512 => {
                type $D = sha2::Sha512;
                $body
            }
            $crate::digest::HashAlgorithm::Sha512_224 => {
                type $D = sha2::Sha512_224;
                $body
            }
            $crate::digest::HashAlgorithm::Sha512_256 => {
                type $D = sha2::Sha512_256;
                $body
            }
            $crate::digest::HashAlgorithm::Sm3 => {
                type $D = sm3::Sm3;
                $body
            }
        }
    };
}

pub(crate) use with_digest;

/// Compute a digest in one shot.
pub fn digest(alg: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    with_digest!(alg, D => <D as ::digest::Digest>::digest(data).to_vec())
}
