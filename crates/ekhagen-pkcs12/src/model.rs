#![forbid(unsafe_code)]

//! The PKCS#12 container model (RFC 7292 section 4).
//!
//! ```text
//! PFX ::= SEQUENCE {
//!     version     INTEGER {v3(3)},
//!     authSafe    ContentInfo,
//!     macData     MacData OPTIONAL }
//! ```
//!
//! The authenticated safe is kept as raw octets until the MAC over them has
//! been checked; only then is it decoded into [`AuthenticatedSafe`].

use crate::algorithm::{split_algorithm_identifier, AlgorithmParams, Resolver};
use const_oid::ObjectIdentifier;
use ekhagen_asn1::{parse, universal, StructureNode};
use ekhagen_core::{oid, Error};
use std::fmt;
use zeroize::Zeroizing;

// ── PFX ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pfx {
    pub version: u32,
    /// Content octets of the outer `data` ContentInfo; the MAC input.
    pub auth_safe: Vec<u8>,
    pub mac_data: Option<IntegrityTag>,
}

impl Pfx {
    /// Decode a container from its raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        Self::from_node(&parse(data)?)
    }

    pub fn from_node(node: &StructureNode) -> Result<Self, Error> {
        let seq = node.expect_sequence("PFX")?;
        let version = node.child(0, "PFX version")?.as_u32("PFX version")?;
        if version != 3 {
            return Err(Error::UnsupportedVersion(version));
        }

        let auth_safe_ci = node.child(1, "authSafe")?;
        let ci = auth_safe_ci.expect_sequence("authSafe ContentInfo")?;
        let content_type = auth_safe_ci.child(0, "authSafe contentType")?.as_oid("contentType")?;
        if content_type != oid::DATA {
            let detail = if content_type == oid::SIGNED_DATA {
                " (public-key integrity mode)"
            } else {
                ""
            };
            return Err(Error::UnexpectedContentType(format!(
                "authSafe is {}{detail}, expected data",
                oid::describe(&content_type)
            )));
        }
        let auth_safe = ci
            .get(1)
            .ok_or_else(|| Error::UnexpectedStructure("authSafe: missing content".into()))?
            .explicit(0, "authSafe content")?
            .octets("authSafe content")?;

        let mac_data = seq
            .get(2)
            .map(IntegrityTag::from_node)
            .transpose()?;
        if seq.len() > 3 {
            return Err(Error::UnexpectedStructure(format!(
                "PFX: {} elements, expected at most 3",
                seq.len()
            )));
        }

        Ok(Self {
            version,
            auth_safe,
            mac_data,
        })
    }
}

/// `MacData`: the keyed digest protecting the authenticated safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityTag {
    pub digest_algorithm: ObjectIdentifier,
    pub digest: Vec<u8>,
    pub salt: Vec<u8>,
    /// `iterations INTEGER DEFAULT 1`.
    pub iterations: u32,
}

impl IntegrityTag {
    pub fn from_node(node: &StructureNode) -> Result<Self, Error> {
        let seq = node.expect_sequence("MacData")?;
        let digest_info = node.child(0, "MacData mac")?;
        digest_info.expect_sequence("DigestInfo")?;
        let (digest_algorithm, _) =
            split_algorithm_identifier(digest_info.child(0, "digestAlgorithm")?, "digestAlgorithm")?;
        let digest = digest_info.child(1, "digest")?.octets("digest")?;
        let salt = node.child(1, "macSalt")?.octets("macSalt")?;
        let iterations = match seq.get(2) {
            Some(n) => n.as_u32("MAC iterations")?,
            None => 1,
        };
        Ok(Self {
            digest_algorithm,
            digest,
            salt,
            iterations,
        })
    }
}

// ── AuthenticatedSafe ────────────────────────────────────────────────

/// `AuthenticatedSafe ::= SEQUENCE OF ContentInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSafe {
    pub contents: Vec<ContentInfo>,
}

/// One segment of the authenticated safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentInfo {
    /// Plaintext `SafeContents` octets.
    Data(Vec<u8>),
    /// `EncryptedData` whose plaintext is a `SafeContents`.
    Encrypted(EncryptedBlob),
}

/// Ciphertext together with the resolved scheme that protects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub algorithm: AlgorithmParams,
    pub ciphertext: Vec<u8>,
}

impl AuthenticatedSafe {
    pub fn parse(data: &[u8], resolver: &Resolver<'_>) -> Result<Self, Error> {
        let node = parse(data)?;
        let contents = node
            .expect_sequence("AuthenticatedSafe")?
            .iter()
            .enumerate()
            .map(|(i, ci)| ContentInfo::from_node(ci, resolver).map_err(|e| context(e, i)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { contents })
    }
}

fn context(err: Error, index: usize) -> Error {
    match err {
        Error::UnexpectedStructure(msg) => {
            Error::UnexpectedStructure(format!("AuthenticatedSafe[{index}]: {msg}"))
        }
        other => other,
    }
}

impl ContentInfo {
    pub fn from_node(node: &StructureNode, resolver: &Resolver<'_>) -> Result<Self, Error> {
        node.expect_sequence("ContentInfo")?;
        let content_type = node.child(0, "contentType")?.as_oid("contentType")?;
        let content = node.child(1, "content")?.explicit(0, "content")?;

        if content_type == oid::DATA {
            return Ok(ContentInfo::Data(content.octets("data content")?));
        }
        if content_type != oid::ENCRYPTED_DATA {
            return Err(Error::UnexpectedContentType(format!(
                "AuthenticatedSafe segment is {}",
                oid::describe(&content_type)
            )));
        }

        // EncryptedData ::= SEQUENCE { version, encryptedContentInfo, [1] unprotectedAttrs OPTIONAL }
        content.expect_sequence("EncryptedData")?;
        let eci = content.child(1, "EncryptedContentInfo")?;
        eci.expect_sequence("EncryptedContentInfo")?;
        let inner_type = eci.child(0, "contentType")?.as_oid("contentType")?;
        if inner_type != oid::DATA {
            return Err(Error::UnexpectedContentType(format!(
                "encrypted segment holds {}",
                oid::describe(&inner_type)
            )));
        }
        let algorithm =
            resolver.resolve_identifier(eci.child(1, "contentEncryptionAlgorithm")?, "contentEncryptionAlgorithm")?;
        let encrypted = eci.child(2, "encryptedContent")?;
        if !encrypted.tag().is_context(0) {
            return Err(Error::UnexpectedStructure(format!(
                "encryptedContent: expected [0], found {}",
                encrypted.tag()
            )));
        }
        Ok(ContentInfo::Encrypted(EncryptedBlob {
            algorithm,
            ciphertext: encrypted.octets("encryptedContent")?,
        }))
    }
}

// ── SafeBag ──────────────────────────────────────────────────────────

/// A bag from a `SafeContents`, with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeBag {
    pub kind: BagKind,
    pub attributes: Attributes,
}

#[derive(Clone, PartialEq, Eq)]
pub enum BagKind {
    /// `keyBag`: a plaintext PKCS#8 `PrivateKeyInfo`.
    Key(Zeroizing<Vec<u8>>),
    /// `pkcs8ShroudedKeyBag`: an `EncryptedPrivateKeyInfo`.
    ShroudedKey(EncryptedBlob),
    /// `certBag` holding a DER X.509 certificate.
    Certificate(Vec<u8>),
    /// `secretBag` wrapping a key bag or shrouded key bag.
    Secret(SecretValue),
    /// CRL bags, unknown bag types and non-X.509 certificates. Kept so
    /// callers can see they were present; never materialized.
    Unsupported(ObjectIdentifier),
}

#[derive(Clone, PartialEq, Eq)]
pub enum SecretValue {
    Plain(Zeroizing<Vec<u8>>),
    Shrouded(EncryptedBlob),
}

impl fmt::Debug for BagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BagKind::Key(_) => f.write_str("Key(<redacted>)"),
            BagKind::ShroudedKey(blob) => write!(f, "ShroudedKey({})", blob.algorithm),
            BagKind::Certificate(der) => write!(f, "Certificate({} bytes)", der.len()),
            BagKind::Secret(SecretValue::Plain(_)) => f.write_str("Secret(<redacted>)"),
            BagKind::Secret(SecretValue::Shrouded(blob)) => {
                write!(f, "Secret(shrouded, {})", blob.algorithm)
            }
            BagKind::Unsupported(id) => write!(f, "Unsupported({})", oid::describe(id)),
        }
    }
}

/// `SafeContents ::= SEQUENCE OF SafeBag`.
///
/// Nested `safeContentsBag`s are flattened in place, so the result is every
/// bag in document order.
pub fn parse_safe_contents(
    node: &StructureNode,
    resolver: &Resolver<'_>,
) -> Result<Vec<SafeBag>, Error> {
    let mut bags = Vec::new();
    collect_bags(node, resolver, &mut bags, 0)?;
    Ok(bags)
}

/// Nesting of `safeContentsBag`s followed before giving up.
const MAX_SAFE_CONTENTS_DEPTH: usize = 8;

fn collect_bags(
    node: &StructureNode,
    resolver: &Resolver<'_>,
    out: &mut Vec<SafeBag>,
    depth: usize,
) -> Result<(), Error> {
    if depth > MAX_SAFE_CONTENTS_DEPTH {
        return Err(Error::UnexpectedStructure(
            "safeContentsBag nested too deeply".into(),
        ));
    }
    for bag in node.expect_sequence("SafeContents")? {
        bag.expect_sequence("SafeBag")?;
        let bag_id = bag.child(0, "bagId")?.as_oid("bagId")?;
        let value = bag.child(1, "bagValue")?.explicit(0, "bagValue")?;
        let attributes = match bag.children().get(2) {
            Some(set) => Attributes::from_node(set)?,
            None => Attributes::default(),
        };

        let kind = if bag_id == oid::KEY_BAG {
            BagKind::Key(Zeroizing::new(value.encoding().to_vec()))
        } else if bag_id == oid::PKCS8_SHROUDED_KEY_BAG {
            BagKind::ShroudedKey(encrypted_private_key_info(value, resolver)?)
        } else if bag_id == oid::CERT_BAG {
            cert_bag(value)?
        } else if bag_id == oid::SECRET_BAG {
            secret_bag(value, resolver)?
        } else if bag_id == oid::SAFE_CONTENTS_BAG {
            collect_bags(value, resolver, out, depth + 1)?;
            continue;
        } else {
            tracing::warn!("skipping {} bag", oid::describe(&bag_id));
            BagKind::Unsupported(bag_id)
        };
        out.push(SafeBag { kind, attributes });
    }
    Ok(())
}

/// `EncryptedPrivateKeyInfo ::= SEQUENCE { encryptionAlgorithm, encryptedData OCTET STRING }`.
pub fn encrypted_private_key_info(
    node: &StructureNode,
    resolver: &Resolver<'_>,
) -> Result<EncryptedBlob, Error> {
    node.expect_sequence("EncryptedPrivateKeyInfo")?;
    let algorithm = resolver.resolve_identifier(
        node.child(0, "encryptionAlgorithm")?,
        "encryptionAlgorithm",
    )?;
    let ciphertext = node.child(1, "encryptedData")?.octets("encryptedData")?;
    Ok(EncryptedBlob {
        algorithm,
        ciphertext,
    })
}

/// `CertBag ::= SEQUENCE { certId OID, certValue [0] EXPLICIT ANY }`.
fn cert_bag(node: &StructureNode) -> Result<BagKind, Error> {
    node.expect_sequence("CertBag")?;
    let cert_id = node.child(0, "certId")?.as_oid("certId")?;
    if cert_id != oid::X509_CERTIFICATE {
        tracing::warn!("skipping certificate of type {}", oid::describe(&cert_id));
        return Ok(BagKind::Unsupported(cert_id));
    }
    let der = node
        .child(1, "certValue")?
        .explicit(0, "certValue")?
        .octets("x509Certificate")?;
    Ok(BagKind::Certificate(der))
}

/// `SecretBag ::= SEQUENCE { secretTypeId OID, secretValue [0] EXPLICIT ANY }`.
///
/// Java keystores store secret keys as an OCTET STRING holding a DER
/// `EncryptedPrivateKeyInfo` (type `pkcs8ShroudedKeyBag`) or plain
/// `PrivateKeyInfo` (type `keyBag`).
fn secret_bag(node: &StructureNode, resolver: &Resolver<'_>) -> Result<BagKind, Error> {
    node.expect_sequence("SecretBag")?;
    let type_id = node.child(0, "secretTypeId")?.as_oid("secretTypeId")?;
    let value = node.child(1, "secretValue")?.explicit(0, "secretValue")?;

    let inner = if value.tag().is_universal(universal::OCTET_STRING) {
        parse(&value.octets("secretValue")?)?
    } else {
        value.clone()
    };

    if type_id == oid::PKCS8_SHROUDED_KEY_BAG {
        Ok(BagKind::Secret(SecretValue::Shrouded(
            encrypted_private_key_info(&inner, resolver)?,
        )))
    } else if type_id == oid::KEY_BAG {
        Ok(BagKind::Secret(SecretValue::Plain(Zeroizing::new(
            inner.encoding().to_vec(),
        ))))
    } else {
        tracing::warn!("skipping secret of type {}", oid::describe(&type_id));
        Ok(BagKind::Unsupported(type_id))
    }
}

// ── Attributes ───────────────────────────────────────────────────────

/// Bag attributes keyed by attribute type, in first-seen order.
///
/// `friendlyName` and `localKeyId` are decoded up front; everything else is
/// retained as raw nodes. Repeated attribute types are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    values: Vec<(ObjectIdentifier, Vec<StructureNode>)>,
    friendly_name: Option<String>,
    local_key_id: Option<Vec<u8>>,
}

impl Attributes {
    /// `SET OF SEQUENCE { attrId OID, attrValues SET OF ANY }`.
    pub fn from_node(node: &StructureNode) -> Result<Self, Error> {
        let mut attrs = Attributes::default();
        for attr in node.expect_set("bagAttributes")? {
            attr.expect_sequence("PKCS12Attribute")?;
            let id = attr.child(0, "attrId")?.as_oid("attrId")?;
            let values = attr.child(1, "attrValues")?.expect_set("attrValues")?;

            if id == oid::FRIENDLY_NAME {
                if let Some(v) = values.first() {
                    attrs.friendly_name = Some(v.as_string("friendlyName")?);
                }
            } else if id == oid::LOCAL_KEY_ID {
                if let Some(v) = values.first() {
                    attrs.local_key_id = Some(v.octets("localKeyId")?);
                }
            }
            match attrs.values.iter_mut().find(|(known, _)| *known == id) {
                Some((_, existing)) => existing.extend(values.iter().cloned()),
                None => attrs.values.push((id, values.to_vec())),
            }
        }
        Ok(attrs)
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }

    pub fn local_key_id(&self) -> Option<&[u8]> {
        self.local_key_id.as_deref()
    }

    /// Raw values of any attribute.
    pub fn get(&self, id: &ObjectIdentifier) -> Option<&[StructureNode]> {
        self.values
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, v)| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekhagen_core::PermitAll;

    fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        if content.len() < 128 {
            out.push(content.len() as u8);
        } else {
            out.push(0x82);
            out.extend_from_slice(&(content.len() as u16).to_be_bytes());
        }
        out.extend_from_slice(content);
        out
    }

    fn oid_der(id: &ObjectIdentifier) -> Vec<u8> {
        tlv(0x06, id.as_bytes())
    }

    fn data_ci(inner: &[u8]) -> Vec<u8> {
        tlv(0x30, &[oid_der(&oid::DATA), tlv(0xa0, &tlv(0x04, inner))].concat())
    }

    fn pfx(version: u8, auth_safe_ci: &[u8]) -> Vec<u8> {
        tlv(0x30, &[tlv(0x02, &[version]), auth_safe_ci.to_vec()].concat())
    }

    #[test]
    fn test_pfx_without_mac() {
        let der = pfx(3, &data_ci(b"\x30\x00"));
        let pfx = Pfx::parse(&der).unwrap();
        assert_eq!(pfx.version, 3);
        assert_eq!(pfx.auth_safe, b"\x30\x00");
        assert!(pfx.mac_data.is_none());
    }

    #[test]
    fn test_unsupported_version() {
        let der = pfx(2, &data_ci(b"\x30\x00"));
        assert!(matches!(Pfx::parse(&der), Err(Error::UnsupportedVersion(2))));
    }

    #[test]
    fn test_signed_data_rejected() {
        let ci = tlv(0x30, &[oid_der(&oid::SIGNED_DATA), tlv(0xa0, &tlv(0x30, &[]))].concat());
        let err = Pfx::parse(&pfx(3, &ci)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedContentType(_)));
        assert!(err.to_string().contains("public-key integrity"));
    }

    #[test]
    fn test_mac_data_default_iterations() {
        let digest_info = tlv(
            0x30,
            &[tlv(0x30, &oid_der(&oid::SHA1)), tlv(0x04, &[0u8; 20])].concat(),
        );
        let mac = tlv(0x30, &[digest_info, tlv(0x04, b"saltsalt")].concat());
        let node = parse(&mac).unwrap();
        let tag = IntegrityTag::from_node(&node).unwrap();
        assert_eq!(tag.digest_algorithm, oid::SHA1);
        assert_eq!(tag.iterations, 1);
        assert_eq!(tag.salt, b"saltsalt");
    }

    #[test]
    fn test_enveloped_segment_rejected() {
        let ci = tlv(0x30, &[oid_der(&oid::ENVELOPED_DATA), tlv(0xa0, &tlv(0x30, &[]))].concat());
        let auth = tlv(0x30, &ci);
        let err = AuthenticatedSafe::parse(&auth, &Resolver::new(&PermitAll)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedContentType(_)));
    }

    #[test]
    fn test_nested_safe_contents_flattened() {
        let name = tlv(0x1e, &[0, b'x']);
        let attrs = tlv(
            0x31,
            &tlv(0x30, &[oid_der(&oid::FRIENDLY_NAME), tlv(0x31, &name)].concat()),
        );
        let cert = tlv(
            0x30,
            &[oid_der(&oid::X509_CERTIFICATE), tlv(0xa0, &tlv(0x04, b"DER"))].concat(),
        );
        let cert_bag = tlv(
            0x30,
            &[oid_der(&oid::CERT_BAG), tlv(0xa0, &cert), attrs].concat(),
        );
        let crl_bag = tlv(
            0x30,
            &[oid_der(&oid::CRL_BAG), tlv(0xa0, &tlv(0x30, &[]))].concat(),
        );
        let nested = tlv(
            0x30,
            &[
                oid_der(&oid::SAFE_CONTENTS_BAG),
                tlv(0xa0, &tlv(0x30, &cert_bag)),
            ]
            .concat(),
        );
        let contents = tlv(0x30, &[crl_bag, nested].concat());

        let bags = parse_safe_contents(&parse(&contents).unwrap(), &Resolver::new(&PermitAll)).unwrap();
        assert_eq!(bags.len(), 2);
        assert_eq!(bags[0].kind, BagKind::Unsupported(oid::CRL_BAG));
        assert_eq!(bags[1].kind, BagKind::Certificate(b"DER".to_vec()));
        assert_eq!(bags[1].attributes.friendly_name(), Some("x"));
        assert_eq!(bags[1].attributes.local_key_id(), None);
        assert_eq!(bags[1].attributes.len(), 1);
    }

    #[test]
    fn test_attributes_keep_unknown() {
        let unknown = ObjectIdentifier::new_unwrap("2.16.840.1.113894.746875.1.1");
        let attrs = tlv(
            0x31,
            &[
                tlv(0x30, &[oid_der(&oid::LOCAL_KEY_ID), tlv(0x31, &tlv(0x04, &[1, 2]))].concat()),
                tlv(0x30, &[oid_der(&unknown), tlv(0x31, &oid_der(&oid::DATA))].concat()),
            ]
            .concat(),
        );
        let attrs = Attributes::from_node(&parse(&attrs).unwrap()).unwrap();
        assert_eq!(attrs.local_key_id(), Some(&[1u8, 2][..]));
        assert_eq!(attrs.get(&unknown).map(<[_]>::len), Some(1));
    }
}
