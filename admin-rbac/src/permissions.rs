//! # Permission Sets
//!
//! The effective permissions of a user, as a set of permission key strings.
//! Keys are stored verbatim so custom permissions defined in the store work
//! the same way as the built-in catalog.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::catalog::PermissionKey;

/// A set of permission keys.
///
/// # Example
///
/// ```
/// use admin_rbac::catalog::PermissionKey;
/// use admin_rbac::permissions::PermissionSet;
///
/// let mut set = PermissionSet::new();
/// set.add(PermissionKey::StatsRead);
/// set.add("a.read");
///
/// assert!(set.has(PermissionKey::StatsRead));
/// assert!(set.has("a.read"));
/// assert!(!set.has("a.write"));
/// assert_eq!(set.sorted(), vec!["a.read", "admin.stats.read"]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionSet {
    permissions: HashSet<String>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self {
            permissions: HashSet::new(),
        }
    }

    /// Create a set from catalog keys.
    pub fn from_keys(keys: &[PermissionKey]) -> Self {
        keys.iter().map(|k| k.as_str().to_string()).collect()
    }

    /// Add a permission key. Returns `true` if it was not already present.
    pub fn add(&mut self, key: impl AsRef<str>) -> bool {
        self.permissions.insert(key.as_ref().to_string())
    }

    /// Remove a permission key. Returns `true` if it was present.
    pub fn remove(&mut self, key: impl AsRef<str>) -> bool {
        self.permissions.remove(key.as_ref())
    }

    /// Check if the set contains a key.
    pub fn has(&self, key: impl AsRef<str>) -> bool {
        self.permissions.contains(key.as_ref())
    }

    /// Check if the set contains at least one of `keys`.
    ///
    /// An empty list never matches.
    pub fn has_any<I, K>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter().any(|k| self.has(k))
    }

    /// Check if the set contains every one of `keys`.
    ///
    /// An empty list always matches.
    pub fn has_all<I, K>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter().all(|k| self.has(k))
    }

    /// Return the first of `keys` missing from the set, if any.
    pub fn first_missing<I, K>(&self, keys: I) -> Option<String>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .find(|k| !self.has(k.as_ref()))
            .map(|k| k.as_ref().to_string())
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: &PermissionSet) {
        for key in &other.permissions {
            self.permissions.insert(key.clone());
        }
    }

    /// Keys in lexicographic order.
    pub fn sorted(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.permissions.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Iterate over the keys in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }

    /// Get the count of permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Check if this set contains every key from another set.
    pub fn contains_all(&self, other: &PermissionSet) -> bool {
        other.permissions.is_subset(&self.permissions)
    }
}

impl FromIterator<String> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}

impl Extend<String> for PermissionSet {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.permissions.extend(iter);
    }
}
