#![forbid(unsafe_code)]

//! Key derivation and decryption of encrypted blobs.

use crate::algorithm::{AlgorithmParams, Resolver};
use crate::model::{parse_safe_contents, EncryptedBlob, SafeBag};
use crate::password::Password;
use ekhagen_asn1::parse;
use ekhagen_core::{Error, Stage};
use ekhagen_crypto::kdf::{self, ID_IV, ID_KEY};
use zeroize::Zeroizing;

/// Derive the key (and IV, for legacy schemes) and decrypt `ciphertext`.
///
/// Legacy schemes feed the BMP-encoded password to the PKCS#12 KDF; PBES2
/// feeds UTF-8 bytes to PBKDF2 and takes the IV from the parameters.
/// Padding is checked strictly and reported as [`Error::BadPadding`].
pub fn derive_and_decrypt(
    params: &AlgorithmParams,
    password: &Password,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, Error> {
    match params {
        AlgorithmParams::LegacyPbe(pbe) => {
            let cipher = pbe.scheme.cipher();
            let hash = pbe.scheme.hash();
            let bmp = password.bmp();
            let key = kdf::pkcs12_kdf(hash, ID_KEY, &bmp, &pbe.salt, pbe.iterations, cipher.key_size());
            let iv = kdf::pkcs12_kdf(hash, ID_IV, &bmp, &pbe.salt, pbe.iterations, cipher.block_size());
            cipher.decrypt(&key, &iv, ciphertext)
        }
        AlgorithmParams::Pbes2(pbes2) => {
            let cipher = pbes2.cipher.cipher;
            let key = kdf::pbkdf2(
                pbes2.kdf.prf,
                password.utf8(),
                &pbes2.kdf.salt,
                pbes2.kdf.iterations,
                cipher.key_size(),
            );
            cipher.decrypt(&key, &pbes2.cipher.iv, ciphertext)
        }
    }
}

/// Decrypt an encrypted `SafeContents` segment and decode its bags.
///
/// Failing the padding check, or producing plaintext that is not a
/// `SafeContents`, means the password does not open this segment.
pub fn decrypt_safe_contents(
    blob: &EncryptedBlob,
    password: &Password,
    resolver: &Resolver<'_>,
) -> Result<Vec<SafeBag>, Error> {
    let plaintext = derive_and_decrypt(&blob.algorithm, password, &blob.ciphertext)
        .map_err(|e| wrong_password(e, "encrypted SafeContents"))?;
    let node = parse(&plaintext)
        .ok()
        .filter(|n| n.expect_sequence("SafeContents").is_ok())
        .ok_or_else(|| Error::BadPassword("decrypted SafeContents is not well formed".into()))?;
    parse_safe_contents(&node, resolver).map_err(|e| match e.stage() {
        Stage::Parse | Stage::Format => {
            Error::BadPassword(format!("decrypted SafeContents does not decode: {e}"))
        }
        _ => e,
    })
}

/// Decrypt an `EncryptedPrivateKeyInfo` to PKCS#8 `PrivateKeyInfo` DER.
pub fn decrypt_private_key(
    blob: &EncryptedBlob,
    password: &Password,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let plaintext = derive_and_decrypt(&blob.algorithm, password, &blob.ciphertext)
        .map_err(|e| wrong_password(e, "private key"))?;
    check_private_key_info(&plaintext)
        .map_err(|_| Error::BadPassword("decrypted private key is not PKCS#8".into()))?;
    Ok(plaintext)
}

/// `PrivateKeyInfo ::= SEQUENCE { version INTEGER, privateKeyAlgorithm AlgorithmIdentifier, privateKey OCTET STRING, ... }`
pub(crate) fn check_private_key_info(der: &[u8]) -> Result<(), Error> {
    let node = parse(der)?;
    node.expect_sequence("PrivateKeyInfo")?;
    node.child(0, "version")?.as_u32("version")?;
    node.child(1, "privateKeyAlgorithm")?
        .expect_sequence("privateKeyAlgorithm")?;
    node.child(2, "privateKey")?.octets("privateKey")?;
    Ok(())
}

fn wrong_password(err: Error, what: &str) -> Error {
    match err {
        Error::BadPadding(_) => Error::BadPassword(format!("{what}: padding check failed")),
        other => other,
    }
}
