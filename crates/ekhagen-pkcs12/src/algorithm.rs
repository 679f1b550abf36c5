#![forbid(unsafe_code)]

//! Algorithm identifier resolution.
//!
//! Turns an `AlgorithmIdentifier` into [`AlgorithmParams`], a fully typed
//! description of how to derive a key and decrypt. Nothing is guessed: an
//! unrecognized identifier at any nesting level, or any primitive the
//! [`AlgorithmPolicy`] refuses, rejects the identifier outright.

use const_oid::ObjectIdentifier;
use ekhagen_asn1::{universal, StructureNode};
use ekhagen_core::{oid, AlgorithmPolicy, Error};
use ekhagen_crypto::{BlockCipher, HashAlgorithm};
use std::fmt;

/// Iteration ceiling applied when the caller does not set one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5_000_000;

/// How to turn a password into a key and IV for one encrypted blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlgorithmParams {
    /// PKCS#12 appendix C scheme; hash and cipher are fixed by the scheme.
    LegacyPbe(LegacyPbe),
    /// PBES2 with PBKDF2.
    Pbes2(Pbes2Params),
}

impl AlgorithmParams {
    pub fn cipher(&self) -> BlockCipher {
        match self {
            AlgorithmParams::LegacyPbe(p) => p.scheme.cipher(),
            AlgorithmParams::Pbes2(p) => p.cipher.cipher,
        }
    }

    pub fn iterations(&self) -> u32 {
        match self {
            AlgorithmParams::LegacyPbe(p) => p.iterations,
            AlgorithmParams::Pbes2(p) => p.kdf.iterations,
        }
    }
}

impl fmt::Display for AlgorithmParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmParams::LegacyPbe(p) => {
                write!(f, "{} ({} iterations)", p.scheme.name(), p.iterations)
            }
            AlgorithmParams::Pbes2(p) => write!(
                f,
                "PBES2 (PBKDF2WithHmac{}, {}, {} iterations)",
                p.kdf.prf.compact_name(),
                p.cipher.cipher,
                p.kdf.iterations
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPbe {
    pub scheme: LegacyScheme,
    pub salt: Vec<u8>,
    pub iterations: u32,
}

/// The `pbeWithSHAAnd...` family from PKCS#12 appendix C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyScheme {
    Sha1And3KeyTripleDes,
    Sha1And2KeyTripleDes,
    Sha1And128BitRc2,
    Sha1And40BitRc2,
}

impl LegacyScheme {
    pub fn from_oid(id: &ObjectIdentifier) -> Option<Self> {
        let known = [
            (oid::PBE_SHA1_3DES, LegacyScheme::Sha1And3KeyTripleDes),
            (oid::PBE_SHA1_2DES, LegacyScheme::Sha1And2KeyTripleDes),
            (oid::PBE_SHA1_RC2_128, LegacyScheme::Sha1And128BitRc2),
            (oid::PBE_SHA1_RC2_40, LegacyScheme::Sha1And40BitRc2),
        ];
        known.into_iter().find(|(o, _)| o == id).map(|(_, s)| s)
    }

    pub fn cipher(&self) -> BlockCipher {
        match self {
            LegacyScheme::Sha1And3KeyTripleDes => BlockCipher::DesEde3,
            LegacyScheme::Sha1And2KeyTripleDes => BlockCipher::DesEde2,
            LegacyScheme::Sha1And128BitRc2 => BlockCipher::Rc2_128,
            LegacyScheme::Sha1And40BitRc2 => BlockCipher::Rc2_40,
        }
    }

    /// Every scheme in the family derives with SHA-1.
    pub fn hash(&self) -> HashAlgorithm {
        HashAlgorithm::Sha1
    }

    pub fn name(&self) -> &'static str {
        match self {
            LegacyScheme::Sha1And3KeyTripleDes => "PBEWithSHA1AndDESede",
            LegacyScheme::Sha1And2KeyTripleDes => "PBEWithSHA1AndDESede2Key",
            LegacyScheme::Sha1And128BitRc2 => "PBEWithSHA1AndRC2_128",
            LegacyScheme::Sha1And40BitRc2 => "PBEWithSHA1AndRC2_40",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pbes2Params {
    pub kdf: KdfParams,
    pub cipher: CipherParams,
}

/// PBKDF2 parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub salt: Vec<u8>,
    pub iterations: u32,
    /// Explicit key length, when the encoder wrote one. Always equal to the
    /// cipher key size once resolved.
    pub key_length: Option<u32>,
    pub prf: HashAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherParams {
    pub cipher: BlockCipher,
    pub iv: Vec<u8>,
}

/// Resolves algorithm identifiers under an [`AlgorithmPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    policy: &'a dyn AlgorithmPolicy,
    max_iterations: u32,
}

impl<'a> Resolver<'a> {
    pub fn new(policy: &'a dyn AlgorithmPolicy) -> Self {
        Self {
            policy,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Resolve an `AlgorithmIdentifier` SEQUENCE.
    pub fn resolve_identifier(
        &self,
        node: &StructureNode,
        what: &str,
    ) -> Result<AlgorithmParams, Error> {
        let (id, params) = split_algorithm_identifier(node, what)?;
        self.resolve(&id, params)
    }

    /// Resolve an encryption scheme from its identifier and parameters.
    pub fn resolve(
        &self,
        id: &ObjectIdentifier,
        params: Option<&StructureNode>,
    ) -> Result<AlgorithmParams, Error> {
        let resolved = if let Some(scheme) = LegacyScheme::from_oid(id) {
            self.resolve_legacy(scheme, params)?
        } else if *id == oid::PBES2 || *id == oid::GM_PBES2 {
            self.resolve_pbes2(params)?
        } else if *id == oid::PBE_SHA1_RC4_128 || *id == oid::PBE_SHA1_RC4_40 {
            return Err(Error::UnknownAlgorithm(format!(
                "{}: RC4 stream ciphers are not supported",
                oid::describe(id)
            )));
        } else {
            return Err(Error::UnknownAlgorithm(format!(
                "encryption scheme {}",
                oid::describe(id)
            )));
        };
        tracing::trace!("resolved {} to {resolved}", oid::describe(id));
        Ok(resolved)
    }

    /// Resolve the digest named in `MacData`.
    pub fn resolve_mac(&self, id: &ObjectIdentifier) -> Result<HashAlgorithm, Error> {
        let hash = HashAlgorithm::from_oid(id).ok_or_else(|| {
            Error::UnknownAlgorithm(format!("MAC digest {}", oid::describe(id)))
        })?;
        self.permit(&format!("HmacPBE{}", hash.compact_name()))?;
        self.permit(&format!("Hmac{}", hash.compact_name()))?;
        self.permit(hash.name())?;
        Ok(hash)
    }

    /// Reject iteration counts of zero or above the ceiling.
    pub fn check_iterations(&self, iterations: u32, what: &str) -> Result<u32, Error> {
        if iterations == 0 {
            return Err(Error::InvalidParameters(format!("{what}: iteration count is zero")));
        }
        if iterations > self.max_iterations {
            return Err(Error::InvalidParameters(format!(
                "{what}: iteration count {iterations} exceeds limit {}",
                self.max_iterations
            )));
        }
        Ok(iterations)
    }

    fn permit(&self, name: &str) -> Result<(), Error> {
        if self.policy.is_algorithm_permitted(name) {
            Ok(())
        } else {
            Err(Error::UnknownAlgorithm(format!("{name} is disabled")))
        }
    }

    fn permit_cipher(&self, cipher: BlockCipher) -> Result<(), Error> {
        self.permit(cipher.family())?;
        self.permit(cipher.name())
    }

    fn resolve_legacy(
        &self,
        scheme: LegacyScheme,
        params: Option<&StructureNode>,
    ) -> Result<AlgorithmParams, Error> {
        self.permit(scheme.name())?;
        self.permit(scheme.hash().name())?;
        self.permit_cipher(scheme.cipher())?;

        let what = scheme.name();
        let params = params.ok_or_else(|| {
            Error::InvalidParameters(format!("{what}: missing parameters"))
        })?;
        let seq = params.expect_sequence(what)?;
        let salt = seq
            .first()
            .ok_or_else(|| Error::InvalidParameters(format!("{what}: missing salt")))?
            .octets("PBE salt")?;
        let iterations = seq
            .get(1)
            .ok_or_else(|| Error::InvalidParameters(format!("{what}: missing iteration count")))?
            .as_u32("PBE iteration count")?;
        let iterations = self.check_iterations(iterations, what)?;

        Ok(AlgorithmParams::LegacyPbe(LegacyPbe {
            scheme,
            salt,
            iterations,
        }))
    }

    fn resolve_pbes2(&self, params: Option<&StructureNode>) -> Result<AlgorithmParams, Error> {
        self.permit("PBES2")?;
        let params =
            params.ok_or_else(|| Error::InvalidParameters("PBES2: missing parameters".into()))?;
        let seq = params.expect_sequence("PBES2-params")?;
        let [kdf_node, scheme_node] = seq else {
            return Err(Error::UnexpectedStructure(format!(
                "PBES2-params: expected 2 elements, found {}",
                seq.len()
            )));
        };

        // The cipher decides the key length, so resolve it first.
        let (cipher_id, cipher_params) = split_algorithm_identifier(scheme_node, "encryptionScheme")?;
        let cipher = BlockCipher::from_pbes2_oid(&cipher_id).ok_or_else(|| {
            Error::UnknownAlgorithm(format!("PBES2 cipher {}", oid::describe(&cipher_id)))
        })?;
        self.permit_cipher(cipher)?;
        let iv = match cipher_params {
            Some(node) if node.tag().is_universal(universal::OCTET_STRING) => node.octets("IV")?,
            _ => {
                return Err(Error::InvalidParameters(format!(
                    "{cipher}: IV parameter missing"
                )))
            }
        };
        if iv.len() != cipher.block_size() {
            return Err(Error::InvalidParameters(format!(
                "{cipher}: IV is {} bytes, expected {}",
                iv.len(),
                cipher.block_size()
            )));
        }

        let (kdf_id, kdf_params) = split_algorithm_identifier(kdf_node, "keyDerivationFunc")?;
        if kdf_id != oid::PBKDF2 && kdf_id != oid::GM_PBKDF2 {
            return Err(Error::UnknownAlgorithm(format!(
                "PBES2 key derivation {}",
                oid::describe(&kdf_id)
            )));
        }
        let kdf = self.resolve_pbkdf2(kdf_params, cipher)?;

        Ok(AlgorithmParams::Pbes2(Pbes2Params {
            kdf,
            cipher: CipherParams { cipher, iv },
        }))
    }

    fn resolve_pbkdf2(
        &self,
        params: Option<&StructureNode>,
        cipher: BlockCipher,
    ) -> Result<KdfParams, Error> {
        let params =
            params.ok_or_else(|| Error::InvalidParameters("PBKDF2: missing parameters".into()))?;
        let seq = params.expect_sequence("PBKDF2-params")?;
        let mut fields = seq.iter();

        let salt_node = fields
            .next()
            .ok_or_else(|| Error::InvalidParameters("PBKDF2: missing salt".into()))?;
        if !salt_node.tag().is_universal(universal::OCTET_STRING) {
            return Err(Error::InvalidParameters(
                "PBKDF2: only the specified salt form is supported".into(),
            ));
        }
        let salt = salt_node.octets("PBKDF2 salt")?;

        let iterations = fields
            .next()
            .ok_or_else(|| Error::InvalidParameters("PBKDF2: missing iteration count".into()))?
            .as_u32("PBKDF2 iteration count")?;
        let iterations = self.check_iterations(iterations, "PBKDF2")?;

        let mut next = fields.next();
        let mut key_length = None;
        if let Some(node) = next.filter(|n| n.tag().is_universal(universal::INTEGER)) {
            let len = node.as_u32("PBKDF2 keyLength")?;
            if len as usize != cipher.key_size() {
                return Err(Error::InvalidParameters(format!(
                    "PBKDF2 keyLength {len} does not match {cipher} key size {}",
                    cipher.key_size()
                )));
            }
            key_length = Some(len);
            next = fields.next();
        }

        let prf = match next {
            None => HashAlgorithm::Sha1,
            Some(node) => {
                let (prf_id, _) = split_algorithm_identifier(node, "PBKDF2 prf")?;
                HashAlgorithm::from_hmac_oid(&prf_id).ok_or_else(|| {
                    Error::UnknownAlgorithm(format!("PBKDF2 PRF {}", oid::describe(&prf_id)))
                })?
            }
        };
        if let Some(extra) = fields.next() {
            return Err(Error::UnexpectedStructure(format!(
                "PBKDF2-params: unexpected trailing {}",
                extra.tag()
            )));
        }

        self.permit("PBKDF2")?;
        self.permit(&format!("PBKDF2WithHmac{}", prf.compact_name()))?;
        self.permit(&format!("Hmac{}", prf.compact_name()))?;
        self.permit(prf.name())?;

        Ok(KdfParams {
            salt,
            iterations,
            key_length,
            prf,
        })
    }
}

/// Split `AlgorithmIdentifier ::= SEQUENCE { algorithm OID, parameters ANY OPTIONAL }`.
///
/// An explicit NULL parameter is reported as absent.
pub(crate) fn split_algorithm_identifier<'n>(
    node: &'n StructureNode,
    what: &str,
) -> Result<(ObjectIdentifier, Option<&'n StructureNode>), Error> {
    let seq = node.expect_sequence(what)?;
    let id = node.child(0, what)?.as_oid(what)?;
    let params = match seq.get(1) {
        Some(p) if p.is_null() => None,
        other => other,
    };
    if seq.len() > 2 {
        return Err(Error::UnexpectedStructure(format!(
            "{what}: AlgorithmIdentifier has {} elements",
            seq.len()
        )));
    }
    Ok((id, params))
}
