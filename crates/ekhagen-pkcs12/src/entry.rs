#![forbid(unsafe_code)]

//! Entry materialization: from decoded bags to keystore entries.
//!
//! Keys and certificates are paired through `localKeyId`. A paired
//! certificate becomes the leaf of the key's chain and the rest of the
//! chain is found by matching issuer to subject among the remaining
//! certificates. Certificates that belong to no key are trusted
//! certificate entries.

use crate::decrypt::{check_private_key_info, decrypt_private_key};
use crate::model::{Attributes, BagKind, SafeBag, SecretValue};
use crate::password::Password;
use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use ekhagen_asn1::parse;
use ekhagen_core::Error;
use ekhagen_crypto::{digest, HashAlgorithm};
use std::collections::HashSet;
use std::fmt;
use x509_cert::Certificate;
use zeroize::Zeroizing;

/// Longest certificate chain assembled for one key.
pub const MAX_CHAIN_LENGTH: usize = 10;

/// What to do with a private key that has no matching certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanKeyPolicy {
    /// Surface it as a key entry with an empty chain.
    #[default]
    Keep,
    /// Leave it out of the result.
    Drop,
}

#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    pub orphan_keys: OrphanKeyPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    PrivateKey,
    SecretKey,
    TrustedCertificate,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryKind::PrivateKey => "PrivateKeyEntry",
            EntryKind::SecretKey => "SecretKeyEntry",
            EntryKind::TrustedCertificate => "trustedCertEntry",
        })
    }
}

/// A symmetric key recovered from a secret bag.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    /// Algorithm from the wrapping `PrivateKeyInfo`, e.g. AES.
    pub algorithm: ObjectIdentifier,
    pub key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("algorithm", &self.algorithm)
            .field("key", &format_args!("<{} bytes redacted>", self.key.len()))
            .finish()
    }
}

/// One logical entry of the container.
#[derive(Clone, PartialEq, Eq)]
pub struct KeystoreEntry {
    pub alias: String,
    pub friendly_name: Option<String>,
    pub local_key_id: Option<Vec<u8>>,
    /// DER certificates, leaf first.
    pub certificate_chain: Vec<Vec<u8>>,
    /// PKCS#8 `PrivateKeyInfo` DER.
    pub private_key: Option<Zeroizing<Vec<u8>>>,
    pub secret_key: Option<SecretKey>,
}

impl KeystoreEntry {
    pub fn kind(&self) -> EntryKind {
        if self.private_key.is_some() {
            EntryKind::PrivateKey
        } else if self.secret_key.is_some() {
            EntryKind::SecretKey
        } else {
            EntryKind::TrustedCertificate
        }
    }

    /// The leaf certificate, if any.
    pub fn certificate(&self) -> Option<&[u8]> {
        self.certificate_chain.first().map(Vec::as_slice)
    }

    /// Subject of the leaf certificate in RFC 4514 form.
    pub fn subject(&self) -> Option<String> {
        let cert = Certificate::from_der(self.certificate()?).ok()?;
        Some(cert.tbs_certificate.subject.to_string())
    }
}

impl fmt::Debug for KeystoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreEntry")
            .field("alias", &self.alias)
            .field("kind", &self.kind())
            .field("local_key_id", &self.local_key_id.as_ref().map(hex::encode))
            .field("chain_len", &self.certificate_chain.len())
            .field(
                "private_key",
                &self.private_key.as_ref().map(|k| format!("<{} bytes redacted>", k.len())),
            )
            .field("secret_key", &self.secret_key)
            .finish()
    }
}

struct CertRecord<'b> {
    der: &'b [u8],
    attributes: &'b Attributes,
    position: usize,
    subject: Vec<u8>,
    issuer: Vec<u8>,
}

impl<'b> CertRecord<'b> {
    fn new(position: usize, der: &'b [u8], attributes: &'b Attributes) -> Result<Self, Error> {
        let cert = Certificate::from_der(der).map_err(|e| {
            Error::Materialize(format!("certificate in bag {position} does not parse: {e}"))
        })?;
        let encode = |name: &x509_cert::name::Name| {
            name.to_der().map_err(|e| {
                Error::Materialize(format!("certificate in bag {position}: {e}"))
            })
        };
        Ok(Self {
            der,
            attributes,
            position,
            subject: encode(&cert.tbs_certificate.subject)?,
            issuer: encode(&cert.tbs_certificate.issuer)?,
        })
    }

    fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    fn fingerprint(&self) -> String {
        hex::encode(digest::digest(HashAlgorithm::Sha1, self.der))
    }
}

/// Build entries from decoded bags.
///
/// Shrouded keys and secrets are opened with `entry_password`. The result
/// is ordered by the position of the bag each entry is anchored on.
pub fn materialize(
    bags: &[SafeBag],
    entry_password: &Password,
    options: &MaterializeOptions,
) -> Result<Vec<KeystoreEntry>, Error> {
    let certs = bags
        .iter()
        .enumerate()
        .filter_map(|(i, bag)| match &bag.kind {
            BagKind::Certificate(der) => Some(CertRecord::new(i, der, &bag.attributes)),
            _ => None,
        })
        .collect::<Result<Vec<_>, _>>()?;
    let mut owned = vec![false; certs.len()];
    let mut linked = vec![false; certs.len()];
    let mut entries: Vec<(usize, KeystoreEntry)> = Vec::new();

    for (position, bag) in bags.iter().enumerate() {
        let attrs = &bag.attributes;
        match &bag.kind {
            BagKind::Key(der) => {
                check_private_key_info(der)?;
                if let Some(entry) =
                    key_entry(position, attrs, der.clone(), &certs, &mut owned, &mut linked, options)
                {
                    entries.push((position, entry));
                }
            }
            BagKind::ShroudedKey(blob) => {
                let key = decrypt_private_key(blob, entry_password)?;
                if let Some(entry) =
                    key_entry(position, attrs, key, &certs, &mut owned, &mut linked, options)
                {
                    entries.push((position, entry));
                }
            }
            BagKind::Secret(value) => {
                let pkcs8 = match value {
                    SecretValue::Plain(der) => {
                        check_private_key_info(der)?;
                        der.clone()
                    }
                    SecretValue::Shrouded(blob) => decrypt_private_key(blob, entry_password)?,
                };
                let secret = secret_key(&pkcs8)?;
                let alias = attrs
                    .friendly_name()
                    .map(str::to_owned)
                    .or_else(|| attrs.local_key_id().map(hex::encode))
                    .unwrap_or_else(|| format!("entry-{position}"));
                entries.push((
                    position,
                    KeystoreEntry {
                        alias,
                        friendly_name: attrs.friendly_name().map(str::to_owned),
                        local_key_id: attrs.local_key_id().map(<[u8]>::to_vec),
                        certificate_chain: Vec::new(),
                        private_key: None,
                        secret_key: Some(secret),
                    },
                ));
            }
            BagKind::Certificate(_) | BagKind::Unsupported(_) => {}
        }
    }

    for (i, cert) in certs.iter().enumerate() {
        if owned[i] {
            continue;
        }
        let name = cert.attributes.friendly_name();
        if linked[i] && name.is_none() {
            continue;
        }
        let alias = name
            .map(str::to_owned)
            .or_else(|| cert.attributes.local_key_id().map(hex::encode))
            .unwrap_or_else(|| cert.fingerprint());
        entries.push((
            cert.position,
            KeystoreEntry {
                alias,
                friendly_name: name.map(str::to_owned),
                local_key_id: cert.attributes.local_key_id().map(<[u8]>::to_vec),
                certificate_chain: vec![cert.der.to_vec()],
                private_key: None,
                secret_key: None,
            },
        ));
    }

    entries.sort_by_key(|(position, _)| *position);
    let entries: Vec<KeystoreEntry> = entries.into_iter().map(|(_, e)| e).collect();

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.alias.to_ascii_lowercase()) {
            return Err(Error::Materialize(format!(
                "duplicate alias {:?}",
                entry.alias
            )));
        }
        tracing::debug!(
            "entry {:?}: {}, {} certificate(s)",
            entry.alias,
            entry.kind(),
            entry.certificate_chain.len()
        );
    }
    Ok(entries)
}

fn key_entry(
    position: usize,
    attrs: &Attributes,
    key: Zeroizing<Vec<u8>>,
    certs: &[CertRecord<'_>],
    owned: &mut [bool],
    linked: &mut [bool],
    options: &MaterializeOptions,
) -> Option<KeystoreEntry> {
    let local_key_id = attrs.local_key_id();
    let leaf = local_key_id.and_then(|id| {
        certs
            .iter()
            .position(|c| c.attributes.local_key_id() == Some(id))
    });

    let chain = match leaf {
        Some(leaf) => {
            owned[leaf] = true;
            build_chain(leaf, certs, linked)
        }
        None => {
            if options.orphan_keys == OrphanKeyPolicy::Drop {
                tracing::warn!("dropping private key in bag {position}: no matching certificate");
                return None;
            }
            tracing::debug!("private key in bag {position} has no matching certificate");
            Vec::new()
        }
    };

    let friendly_name = attrs
        .friendly_name()
        .or_else(|| leaf.and_then(|l| certs[l].attributes.friendly_name()))
        .map(str::to_owned);
    let alias = friendly_name
        .clone()
        .or_else(|| local_key_id.map(hex::encode))
        .or_else(|| leaf.map(|l| certs[l].fingerprint()))
        .unwrap_or_else(|| format!("entry-{position}"));

    Some(KeystoreEntry {
        alias,
        friendly_name,
        local_key_id: local_key_id.map(<[u8]>::to_vec),
        certificate_chain: chain,
        private_key: Some(key),
        secret_key: None,
    })
}

/// Follow issuer links from `leaf` until a self-issued certificate, a
/// missing issuer, or [`MAX_CHAIN_LENGTH`].
fn build_chain(leaf: usize, certs: &[CertRecord<'_>], linked: &mut [bool]) -> Vec<Vec<u8>> {
    let mut chain = vec![leaf];
    let mut current = leaf;
    while chain.len() < MAX_CHAIN_LENGTH && !certs[current].is_self_issued() {
        let issuer = &certs[current].issuer;
        let Some(next) = (0..certs.len()).find(|j| !chain.contains(j) && certs[*j].subject == *issuer)
        else {
            break;
        };
        linked[next] = true;
        chain.push(next);
        current = next;
    }
    chain.into_iter().map(|i| certs[i].der.to_vec()).collect()
}

/// Unwrap the raw key from a `PrivateKeyInfo` holding a secret key.
fn secret_key(pkcs8: &[u8]) -> Result<SecretKey, Error> {
    let node = parse(pkcs8)?;
    node.expect_sequence("PrivateKeyInfo")?;
    let algorithm = node
        .child(1, "privateKeyAlgorithm")?
        .child(0, "algorithm")?
        .as_oid("secret key algorithm")?;
    let key = Zeroizing::new(node.child(2, "privateKey")?.octets("privateKey")?);
    Ok(SecretKey { algorithm, key })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF: &[u8] = include_bytes!("../../../test-data/pkcs12/leaf.der");
    const CA: &[u8] = include_bytes!("../../../test-data/pkcs12/ca.der");

    fn cert_bag(der: &[u8], attributes: Attributes) -> SafeBag {
        SafeBag {
            kind: BagKind::Certificate(der.to_vec()),
            attributes,
        }
    }

    #[test]
    fn test_chain_from_unordered_certs() {
        let bags = vec![cert_bag(CA, Attributes::default()), cert_bag(LEAF, Attributes::default())];
        let certs: Vec<CertRecord<'_>> = bags
            .iter()
            .enumerate()
            .map(|(i, b)| match &b.kind {
                BagKind::Certificate(der) => CertRecord::new(i, der, &b.attributes).unwrap(),
                _ => unreachable!(),
            })
            .collect();
        assert!(certs[0].is_self_issued());
        assert!(!certs[1].is_self_issued());

        let mut linked = vec![false; 2];
        let chain = build_chain(1, &certs, &mut linked);
        assert_eq!(chain, vec![LEAF.to_vec(), CA.to_vec()]);
        assert_eq!(linked, vec![true, false]);
    }

    #[test]
    fn test_unrelated_certs_become_trusted_entries() {
        let bags = vec![cert_bag(LEAF, Attributes::default()), cert_bag(CA, Attributes::default())];
        let entries = materialize(&bags, &Password::from(""), &MaterializeOptions::default()).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.kind() == EntryKind::TrustedCertificate));
        assert_eq!(entries[1].alias, "976d166677fb9851e26a382c3f1adaaba9c4ae69");
        assert_eq!(entries[0].subject().as_deref(), Some("CN=leaf"));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let bags = vec![cert_bag(CA, Attributes::default()), cert_bag(CA, Attributes::default())];
        let err = materialize(&bags, &Password::from(""), &MaterializeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Materialize(_)));
    }

    #[test]
    fn test_garbage_certificate() {
        let bags = vec![cert_bag(b"\x30\x03\x02\x01\x00", Attributes::default())];
        let err = materialize(&bags, &Password::from(""), &MaterializeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Materialize(_)));
    }

    #[test]
    fn test_secret_key_from_pkcs8() {
        // PrivateKeyInfo { 0, { aes128-CBC }, OCTET STRING 00..0f }
        let mut der = vec![
            0x30, 0x22, 0x02, 0x01, 0x00, 0x30, 0x0b, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65,
            0x03, 0x04, 0x01, 0x02, 0x04, 0x10,
        ];
        der.extend(0u8..16);
        let secret = secret_key(&der).unwrap();
        assert_eq!(secret.algorithm, ekhagen_core::oid::AES128_CBC);
        assert_eq!(secret.key.as_slice(), &(0u8..16).collect::<Vec<_>>()[..]);
        assert!(!format!("{secret:?}").contains("0102"));
    }

    #[test]
    fn test_entry_kind_display() {
        assert_eq!(EntryKind::PrivateKey.to_string(), "PrivateKeyEntry");
        assert_eq!(EntryKind::TrustedCertificate.to_string(), "trustedCertEntry");
    }
}
