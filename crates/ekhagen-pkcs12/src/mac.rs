#![forbid(unsafe_code)]

//! Integrity verification of the authenticated safe.

use crate::algorithm::Resolver;
use crate::model::IntegrityTag;
use crate::password::Password;
use ekhagen_core::Error;
use ekhagen_crypto::kdf::{pkcs12_kdf, ID_MAC};
use ekhagen_crypto::mac::verify_hmac;

/// Check the container MAC over the raw authenticated-safe octets.
///
/// The HMAC key comes from the PKCS#12 KDF with the MAC diversifier and is
/// as long as the digest output. A mismatch means either the password is
/// wrong or the container was modified; the two cannot be told apart, so
/// both are [`Error::IntegrityCheckFailed`].
pub fn verify(
    auth_safe: &[u8],
    tag: &IntegrityTag,
    password: &Password,
    resolver: &Resolver<'_>,
) -> Result<(), Error> {
    let hash = resolver.resolve_mac(&tag.digest_algorithm)?;
    let iterations = resolver.check_iterations(tag.iterations, "MAC")?;

    if tag.digest.len() != hash.output_size() {
        return Err(Error::IntegrityCheckFailed(format!(
            "stored {hash} MAC is {} bytes, expected {}",
            tag.digest.len(),
            hash.output_size()
        )));
    }

    let key = pkcs12_kdf(
        hash,
        ID_MAC,
        &password.bmp(),
        &tag.salt,
        iterations,
        hash.output_size(),
    );
    if !verify_hmac(hash, &key, auth_safe, &tag.digest)? {
        return Err(Error::IntegrityCheckFailed(format!(
            "{hash} MAC mismatch: wrong password or modified container"
        )));
    }

    tracing::debug!("{hash} MAC verified ({iterations} iterations)");
    Ok(())
}
