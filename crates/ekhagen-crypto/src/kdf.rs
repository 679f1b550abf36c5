#![forbid(unsafe_code)]

//! Password-based key derivation.
//!
//! Two derivations appear in PKCS#12 containers:
//! 1. The PKCS#12 KDF (RFC 7292 appendix B), used for the MAC key and by
//!    the legacy `pbeWithSHAAnd...` schemes. Takes a BMP-encoded password.
//! 2. PBKDF2 (RFC 8018), used inside PBES2. Takes UTF-8 password bytes.

use crate::digest::{with_digest, HashAlgorithm};
use ::digest::{core_api::BlockSizeUser, Digest, FixedOutputReset};
use zeroize::Zeroizing;

/// PKCS#12 KDF diversifier values (RFC 7292 appendix B.3).
pub const ID_KEY: u8 = 1;
pub const ID_IV: u8 = 2;
pub const ID_MAC: u8 = 3;

/// PKCS#12 KDF.
///
/// `id` selects key, IV or MAC material. `password` is already BMP
/// encoded, including the two trailing zero bytes.
pub fn pkcs12_kdf(
    hash: HashAlgorithm,
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Zeroizing<Vec<u8>> {
    with_digest!(hash, D => pkcs12_kdf_generic::<D>(id, password, salt, iterations, output_len))
}

fn pkcs12_kdf_generic<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Zeroizing<Vec<u8>>
where
    D: Digest + FixedOutputReset + BlockSizeUser,
{
    let u = <D as Digest>::output_size();
    let v = <D as BlockSizeUser>::block_size();

    let d_block = vec![id; v];
    let s = extend_to_multiple(salt, v);
    let p = extend_to_multiple(password, v);

    let mut i_block = Zeroizing::new(Vec::with_capacity(s.len() + p.len()));
    i_block.extend_from_slice(&s);
    i_block.extend_from_slice(&p);

    let num_blocks = output_len.div_ceil(u);
    let mut result = Zeroizing::new(Vec::with_capacity(num_blocks * u));

    for block_idx in 0..num_blocks {
        // A = H^c(D || I)
        let mut hasher = D::new();
        Digest::update(&mut hasher, &d_block);
        Digest::update(&mut hasher, i_block.as_slice());
        let mut a = Zeroizing::new(hasher.finalize_reset().to_vec());
        for _ in 1..iterations {
            Digest::update(&mut hasher, a.as_slice());
            a = Zeroizing::new(hasher.finalize_reset().to_vec());
        }

        result.extend_from_slice(&a);

        if block_idx + 1 < num_blocks {
            let b = extend_to_multiple(&a, v);
            for chunk in i_block.chunks_exact_mut(v) {
                add_one_plus_b(chunk, &b);
            }
        }
    }

    result.truncate(output_len);
    result
}

/// Repeat `data` until its length is the next multiple of `v`.
/// Empty input stays empty.
fn extend_to_multiple(data: &[u8], v: usize) -> Zeroizing<Vec<u8>> {
    if data.is_empty() {
        return Zeroizing::new(Vec::new());
    }
    let len = data.len().div_ceil(v) * v;
    Zeroizing::new(data.iter().copied().cycle().take(len).collect())
}

/// `block = (block + b + 1) mod 2^(8 * block.len())`, big-endian.
fn add_one_plus_b(block: &mut [u8], b: &[u8]) {
    let mut carry: u16 = 1;
    for k in (0..block.len()).rev() {
        let sum = u16::from(block[k]) + u16::from(b[k]) + carry;
        block[k] = sum as u8;
        carry = sum >> 8;
    }
}

/// PBKDF2 with HMAC over `prf`.
pub fn pbkdf2(
    prf: HashAlgorithm,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_len: usize,
) -> Zeroizing<Vec<u8>> {
    let mut derived = Zeroizing::new(vec![0u8; key_len]);
    with_digest!(prf, D => ::pbkdf2::pbkdf2_hmac::<D>(password, salt, iterations, &mut derived));
    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bmp(password: &str) -> Vec<u8> {
        let mut out: Vec<u8> = password.encode_utf16().flat_map(u16::to_be_bytes).collect();
        out.extend_from_slice(&[0, 0]);
        out
    }

    #[test]
    fn test_pkcs12_kdf_known_vector() {
        // OpenSSL test vector: password "smeg", SHA-1, 1 iteration.
        let salt = hex::decode("0a58cf64530d823f").unwrap();
        let key = pkcs12_kdf(HashAlgorithm::Sha1, ID_KEY, &bmp("smeg"), &salt, 1, 24);
        assert_eq!(
            hex::encode(key.as_slice()),
            "8aaae6297b6cb04642ab5b077851284eb7128f1a2a7fbca3"
        );
        let iv = pkcs12_kdf(HashAlgorithm::Sha1, ID_IV, &bmp("smeg"), &salt, 1, 8);
        assert_eq!(hex::encode(iv.as_slice()), "79993dfe048d3b76");
    }

    #[test]
    fn test_pkcs12_kdf_iterated_vector() {
        let salt = hex::decode("1682c0fc5b3f7ec5").unwrap();
        let key = pkcs12_kdf(HashAlgorithm::Sha1, ID_KEY, &bmp("queeg"), &salt, 1000, 24);
        assert_eq!(
            hex::encode(key.as_slice()),
            "483dd6e919d7de2e8e648ba8f862f3fbfbdc2bcb2c02957f"
        );
    }

    #[test]
    fn test_pkcs12_kdf_lengths() {
        let password = bmp("test");
        for hash in HashAlgorithm::ALL {
            let out = pkcs12_kdf(hash, ID_MAC, &password, b"saltsalt", 3, hash.output_size());
            assert_eq!(out.len(), hash.output_size(), "{hash}");
            let long = pkcs12_kdf(hash, ID_KEY, &password, b"saltsalt", 3, 100);
            assert_eq!(long.len(), 100);
        }
    }

    #[test]
    fn test_pkcs12_kdf_diversifiers_differ() {
        let password = bmp("test");
        let key = pkcs12_kdf(HashAlgorithm::Sha256, ID_KEY, &password, b"saltsalt", 2048, 32);
        let key2 = pkcs12_kdf(HashAlgorithm::Sha256, ID_KEY, &password, b"saltsalt", 2048, 32);
        let mac = pkcs12_kdf(HashAlgorithm::Sha256, ID_MAC, &password, b"saltsalt", 2048, 32);
        assert_eq!(key, key2);
        assert_ne!(key, mac);
    }

    #[test]
    fn test_pbkdf2_rfc6070() {
        let out = pbkdf2(HashAlgorithm::Sha1, b"password", b"salt", 2, 20);
        assert_eq!(
            hex::encode(out.as_slice()),
            "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957"
        );
    }

    #[test]
    fn test_pbkdf2_sha256() {
        let out = pbkdf2(HashAlgorithm::Sha256, b"password", b"salt", 1, 32);
        assert_eq!(
            hex::encode(out.as_slice()),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_extend_to_multiple() {
        assert!(extend_to_multiple(&[], 64).is_empty());
        let out = extend_to_multiple(&[1, 2, 3], 4);
        assert_eq!(out.as_slice(), &[1, 2, 3, 1]);
        let out = extend_to_multiple(&[1, 2], 2);
        assert_eq!(out.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_add_one_plus_b() {
        let mut block = [0x00, 0xff];
        add_one_plus_b(&mut block, &[0x00, 0x00]);
        assert_eq!(block, [0x01, 0x00]);
        let mut block = [0xff, 0xff];
        add_one_plus_b(&mut block, &[0x00, 0x00]);
        assert_eq!(block, [0x00, 0x00]);
    }
}
