#![forbid(unsafe_code)]

//! Top-level loading: structure, integrity, decryption, entries.

use crate::algorithm::{Resolver, DEFAULT_MAX_ITERATIONS};
use crate::decrypt::decrypt_safe_contents;
use crate::entry::{materialize, MaterializeOptions, OrphanKeyPolicy};
use crate::keystore::Keystore;
use crate::mac;
use crate::model::{parse_safe_contents, AuthenticatedSafe, ContentInfo, Pfx};
use crate::password::Password;
use ekhagen_asn1::parse;
use ekhagen_core::{AlgorithmPolicy, Error, PermitAll};
use std::sync::Arc;

/// Options for [`load`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    entry_password: Option<Password>,
    orphan_keys: OrphanKeyPolicy,
    allow_missing_mac: bool,
    max_iterations: u32,
    policy: Arc<dyn AlgorithmPolicy>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            entry_password: None,
            orphan_keys: OrphanKeyPolicy::Keep,
            allow_missing_mac: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            policy: Arc::new(PermitAll),
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Password for shrouded keys and secrets when it differs from the
    /// store password.
    pub fn entry_password(mut self, password: Password) -> Self {
        self.entry_password = Some(password);
        self
    }

    pub fn orphan_keys(mut self, policy: OrphanKeyPolicy) -> Self {
        self.orphan_keys = policy;
        self
    }

    /// Accept containers without MacData. Off by default.
    pub fn allow_missing_mac(mut self, allow: bool) -> Self {
        self.allow_missing_mac = allow;
        self
    }

    /// Ceiling for any iteration count in the container.
    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn policy(mut self, policy: Arc<dyn AlgorithmPolicy>) -> Self {
        self.policy = policy;
        self
    }
}

/// Decode, verify and decrypt a PKCS#12 container.
///
/// The MAC is checked before anything inside the authenticated safe is
/// decrypted. Every failure aborts the whole load.
pub fn load(data: &[u8], password: &Password, options: &LoadOptions) -> Result<Keystore, Error> {
    let resolver =
        Resolver::new(options.policy.as_ref()).with_max_iterations(options.max_iterations);

    let pfx = Pfx::parse(data)?;
    tracing::debug!("PFX v{}, {} byte authenticated safe", pfx.version, pfx.auth_safe.len());

    match &pfx.mac_data {
        Some(tag) => mac::verify(&pfx.auth_safe, tag, password, &resolver)?,
        None if options.allow_missing_mac => {
            tracing::warn!("container has no MacData; integrity not verified");
        }
        None => {
            return Err(Error::IntegrityCheckFailed(
                "container has no MacData".into(),
            ))
        }
    }

    let safe = AuthenticatedSafe::parse(&pfx.auth_safe, &resolver)?;
    tracing::debug!("{} authenticated safe segment(s)", safe.contents.len());

    let mut bags = Vec::new();
    for (i, content) in safe.contents.iter().enumerate() {
        let segment = match content {
            ContentInfo::Data(octets) => parse_safe_contents(&parse(octets)?, &resolver)?,
            ContentInfo::Encrypted(blob) => {
                tracing::debug!("segment {i}: decrypting with {}", blob.algorithm);
                decrypt_safe_contents(blob, password, &resolver)?
            }
        };
        tracing::debug!("segment {i}: {} bag(s)", segment.len());
        bags.extend(segment);
    }

    let entry_password = options.entry_password.as_ref().unwrap_or(password);
    let entries = materialize(
        &bags,
        entry_password,
        &MaterializeOptions {
            orphan_keys: options.orphan_keys,
        },
    )?;
    tracing::debug!("loaded {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
    Ok(Keystore::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ekhagen_core::DisabledAlgorithms;

    #[test]
    fn test_options_builder() {
        let options = LoadOptions::new()
            .entry_password(Password::from("inner"))
            .orphan_keys(OrphanKeyPolicy::Drop)
            .allow_missing_mac(true)
            .max_iterations(10)
            .policy(Arc::new(DisabledAlgorithms::from_property("RC2")));
        assert_eq!(options.entry_password, Some(Password::from("inner")));
        assert_eq!(options.orphan_keys, OrphanKeyPolicy::Drop);
        assert!(options.allow_missing_mac);
        assert_eq!(options.max_iterations, 10);
        assert!(!options.policy.is_algorithm_permitted("rc2"));
    }

    #[test]
    fn test_defaults() {
        let options = LoadOptions::default();
        assert!(options.entry_password.is_none());
        assert_eq!(options.orphan_keys, OrphanKeyPolicy::Keep);
        assert!(!options.allow_missing_mac);
        assert_eq!(options.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_garbage_fails_in_parse_stage() {
        let err = load(b"\x04\x02ab", &Password::from("x"), &LoadOptions::default()).unwrap_err();
        assert_eq!(err.stage(), ekhagen_core::Stage::Parse);
    }
}
