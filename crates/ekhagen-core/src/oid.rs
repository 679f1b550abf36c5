#![forbid(unsafe_code)]

//! Object identifier constants for PKCS#12 and the algorithms it carries.
//!
//! Grouped the way they appear in a container: content types, bag types,
//! attributes, encryption schemes, then the primitives those schemes name.

use const_oid::ObjectIdentifier;

const fn oid(s: &str) -> ObjectIdentifier {
    ObjectIdentifier::new_unwrap(s)
}

// ── PKCS#7 content types ─────────────────────────────────────────────

pub const DATA: ObjectIdentifier = oid("1.2.840.113549.1.7.1");
pub const SIGNED_DATA: ObjectIdentifier = oid("1.2.840.113549.1.7.2");
pub const ENVELOPED_DATA: ObjectIdentifier = oid("1.2.840.113549.1.7.3");
pub const ENCRYPTED_DATA: ObjectIdentifier = oid("1.2.840.113549.1.7.6");

// ── PKCS#12 bag types ────────────────────────────────────────────────

pub const KEY_BAG: ObjectIdentifier = oid("1.2.840.113549.1.12.10.1.1");
pub const PKCS8_SHROUDED_KEY_BAG: ObjectIdentifier = oid("1.2.840.113549.1.12.10.1.2");
pub const CERT_BAG: ObjectIdentifier = oid("1.2.840.113549.1.12.10.1.3");
pub const CRL_BAG: ObjectIdentifier = oid("1.2.840.113549.1.12.10.1.4");
pub const SECRET_BAG: ObjectIdentifier = oid("1.2.840.113549.1.12.10.1.5");
pub const SAFE_CONTENTS_BAG: ObjectIdentifier = oid("1.2.840.113549.1.12.10.1.6");

/// certBag certId for DER X.509 certificates.
pub const X509_CERTIFICATE: ObjectIdentifier = oid("1.2.840.113549.1.9.22.1");
pub const SDSI_CERTIFICATE: ObjectIdentifier = oid("1.2.840.113549.1.9.22.2");

// ── Bag attributes ───────────────────────────────────────────────────

pub const FRIENDLY_NAME: ObjectIdentifier = oid("1.2.840.113549.1.9.20");
pub const LOCAL_KEY_ID: ObjectIdentifier = oid("1.2.840.113549.1.9.21");

// ── Password-based encryption schemes ────────────────────────────────

pub const PBE_SHA1_RC4_128: ObjectIdentifier = oid("1.2.840.113549.1.12.1.1");
pub const PBE_SHA1_RC4_40: ObjectIdentifier = oid("1.2.840.113549.1.12.1.2");
pub const PBE_SHA1_3DES: ObjectIdentifier = oid("1.2.840.113549.1.12.1.3");
pub const PBE_SHA1_2DES: ObjectIdentifier = oid("1.2.840.113549.1.12.1.4");
pub const PBE_SHA1_RC2_128: ObjectIdentifier = oid("1.2.840.113549.1.12.1.5");
pub const PBE_SHA1_RC2_40: ObjectIdentifier = oid("1.2.840.113549.1.12.1.6");

pub const PBES2: ObjectIdentifier = oid("1.2.840.113549.1.5.13");
pub const PBKDF2: ObjectIdentifier = oid("1.2.840.113549.1.5.12");

/// GM/T 0010 aliases for PBES2 and PBKDF2.
pub const GM_PBES2: ObjectIdentifier = oid("1.2.156.10197.6.1.4.1.5.2");
pub const GM_PBKDF2: ObjectIdentifier = oid("1.2.156.10197.6.1.4.1.5.1");

// ── PBKDF2 pseudo-random functions ───────────────────────────────────

pub const HMAC_SHA1: ObjectIdentifier = oid("1.2.840.113549.2.7");
pub const HMAC_SHA224: ObjectIdentifier = oid("1.2.840.113549.2.8");
pub const HMAC_SHA256: ObjectIdentifier = oid("1.2.840.113549.2.9");
pub const HMAC_SHA384: ObjectIdentifier = oid("1.2.840.113549.2.10");
pub const HMAC_SHA512: ObjectIdentifier = oid("1.2.840.113549.2.11");
pub const HMAC_SHA512_224: ObjectIdentifier = oid("1.2.840.113549.2.12");
pub const HMAC_SHA512_256: ObjectIdentifier = oid("1.2.840.113549.2.13");
pub const HMAC_SM3: ObjectIdentifier = oid("1.2.156.10197.1.401.3.1");

// ── Digests ──────────────────────────────────────────────────────────

pub const SHA1: ObjectIdentifier = oid("1.3.14.3.2.26");
pub const SHA224: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.4");
pub const SHA256: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.1");
pub const SHA384: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.2");
pub const SHA512: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.3");
pub const SHA512_224: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.5");
pub const SHA512_256: ObjectIdentifier = oid("2.16.840.1.101.3.4.2.6");
pub const SM3: ObjectIdentifier = oid("1.2.156.10197.1.401");

// ── Block ciphers (CBC mode) ─────────────────────────────────────────

pub const AES128_CBC: ObjectIdentifier = oid("2.16.840.1.101.3.4.1.2");
pub const AES192_CBC: ObjectIdentifier = oid("2.16.840.1.101.3.4.1.22");
pub const AES256_CBC: ObjectIdentifier = oid("2.16.840.1.101.3.4.1.42");
pub const DES_EDE3_CBC: ObjectIdentifier = oid("1.2.840.113549.3.7");
pub const SM4_CBC: ObjectIdentifier = oid("1.2.156.10197.1.104.2");
pub const GM_SM4_CBC: ObjectIdentifier = oid("1.2.156.10197.6.1.4.1.12.1.1");

/// Short human-readable name for an identifier this crate knows about.
///
/// Used in log lines and error messages; unknown identifiers fall back to
/// their dotted form at the call site.
pub fn name(oid: &ObjectIdentifier) -> Option<&'static str> {
    let known: &[(ObjectIdentifier, &str)] = &[
        (DATA, "data"),
        (SIGNED_DATA, "signedData"),
        (ENVELOPED_DATA, "envelopedData"),
        (ENCRYPTED_DATA, "encryptedData"),
        (KEY_BAG, "keyBag"),
        (PKCS8_SHROUDED_KEY_BAG, "pkcs8ShroudedKeyBag"),
        (CERT_BAG, "certBag"),
        (CRL_BAG, "crlBag"),
        (SECRET_BAG, "secretBag"),
        (SAFE_CONTENTS_BAG, "safeContentsBag"),
        (PBE_SHA1_RC4_128, "pbeWithSHAAnd128BitRC4"),
        (PBE_SHA1_RC4_40, "pbeWithSHAAnd40BitRC4"),
        (PBE_SHA1_3DES, "pbeWithSHAAnd3-KeyTripleDES-CBC"),
        (PBE_SHA1_2DES, "pbeWithSHAAnd2-KeyTripleDES-CBC"),
        (PBE_SHA1_RC2_128, "pbeWithSHAAnd128BitRC2-CBC"),
        (PBE_SHA1_RC2_40, "pbewithSHAAnd40BitRC2-CBC"),
        (PBES2, "PBES2"),
        (GM_PBES2, "PBES2"),
        (PBKDF2, "PBKDF2"),
        (GM_PBKDF2, "PBKDF2"),
        (AES128_CBC, "aes128-CBC"),
        (AES192_CBC, "aes192-CBC"),
        (AES256_CBC, "aes256-CBC"),
        (DES_EDE3_CBC, "des-ede3-cbc"),
        (SM4_CBC, "sm4-CBC"),
        (GM_SM4_CBC, "sm4-CBC"),
    ];
    known.iter().find(|(o, _)| o == oid).map(|(_, n)| *n)
}

/// `name` or the dotted decimal form.
pub fn describe(oid: &ObjectIdentifier) -> String {
    match name(oid) {
        Some(n) => format!("{n} ({oid})"),
        None => oid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe(&PBES2), "PBES2 (1.2.840.113549.1.5.13)");
        assert_eq!(describe(&SHA256), "2.16.840.1.101.3.4.2.1");
    }

    #[test]
    fn test_gm_aliases_are_distinct() {
        assert_ne!(PBES2, GM_PBES2);
        assert_ne!(SM4_CBC, GM_SM4_CBC);
    }
}
