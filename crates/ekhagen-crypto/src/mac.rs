#![forbid(unsafe_code)]

//! HMAC verification.

use crate::digest::{with_digest, HashAlgorithm};
use ekhagen_core::Error;
use hmac::{Hmac, Mac};

/// Check `expected` against HMAC(`key`, `data`) in constant time.
///
/// Returns `Ok(false)` on mismatch, including a tag of the wrong length.
pub fn verify_hmac(
    hash: HashAlgorithm,
    key: &[u8],
    data: &[u8],
    expected: &[u8],
) -> Result<bool, Error> {
    with_digest!(hash, D => {
        let mut mac = Hmac::<D>::new_from_slice(key)
            .map_err(|e| Error::Crypto(format!("HMAC-{hash} init: {e}")))?;
        mac.update(data);
        Ok(mac.verify_slice(expected).is_ok())
    })
}
