#![forbid(unsafe_code)]

//! Loaded keystore with alias lookup.

use crate::entry::{EntryKind, KeystoreEntry};

/// The entries of one decoded container, in container order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keystore {
    entries: Vec<KeystoreEntry>,
}

impl Keystore {
    pub fn new(entries: Vec<KeystoreEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[KeystoreEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<KeystoreEntry> {
        self.entries
    }

    /// Find an entry by alias. Aliases compare case-insensitively.
    pub fn get(&self, alias: &str) -> Option<&KeystoreEntry> {
        self.entries
            .iter()
            .find(|e| e.alias.eq_ignore_ascii_case(alias))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.alias.as_str())
    }

    /// Entries of one kind, e.g. all trusted certificates.
    pub fn by_kind(&self, kind: EntryKind) -> impl Iterator<Item = &KeystoreEntry> {
        self.entries.iter().filter(move |e| e.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeystoreEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for Keystore {
    type Item = KeystoreEntry;
    type IntoIter = std::vec::IntoIter<KeystoreEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Keystore {
    type Item = &'a KeystoreEntry;
    type IntoIter = std::slice::Iter<'a, KeystoreEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
