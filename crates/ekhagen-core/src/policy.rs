#![forbid(unsafe_code)]

//! Algorithm policy: which primitives a load is allowed to use.
//!
//! The resolver asks the policy about every primitive a scheme needs (the
//! scheme itself, its KDF, PRF, cipher, and digest) by name. A refusal for
//! any of them rejects the whole identifier.

use std::collections::BTreeSet;
use std::fmt;

/// Consulted before any algorithm is accepted.
pub trait AlgorithmPolicy: Send + Sync + fmt::Debug {
    /// `true` if the named algorithm may be used.
    fn is_algorithm_permitted(&self, name: &str) -> bool;
}

/// Policy that accepts every algorithm the crate implements.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl AlgorithmPolicy for PermitAll {
    fn is_algorithm_permitted(&self, _name: &str) -> bool {
        true
    }
}

/// Deny-list policy built from a comma-separated property value such as
/// `"SHA1, RC2, DESede"`.
///
/// Matching ignores ASCII case and the separators `-`, `_` and `/`, so
/// `SHA1` also disables `SHA-1` and `HmacSHA1`-style names are matched
/// whole. Constrained entries (`"SHA1 jdkCA & usage TLSServer"`) contribute
/// only their first word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisabledAlgorithms {
    names: BTreeSet<String>,
}

impl DisabledAlgorithms {
    /// Parse a property value.
    pub fn from_property(value: &str) -> Self {
        let names = value
            .split(',')
            .filter_map(|entry| entry.split_whitespace().next())
            .map(normalize)
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Add one algorithm name to the deny list.
    pub fn disable(&mut self, name: &str) {
        let n = normalize(name);
        if !n.is_empty() {
            self.names.insert(n);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Normalized names on the deny list.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl AlgorithmPolicy for DisabledAlgorithms {
    fn is_algorithm_permitted(&self, name: &str) -> bool {
        let permitted = !self.names.contains(&normalize(name));
        if !permitted {
            tracing::debug!("algorithm {name} disabled by policy");
        }
        permitted
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | '/'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
