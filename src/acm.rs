//! Allowed collision matrix.
//!
//! A symmetric table over pairs of names (links, attached bodies, world
//! objects). `true` means the pair is allowed to collide and is skipped by the
//! checkers; `false` means it is checked. Pairs of known names without an
//! entry use the matrix default. Pairs with an unknown name are checked.

use std::collections::{BTreeSet, HashMap};

/// Symmetric allow/check table with a default for unlisted pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct AllowedCollisionMatrix {
    names: BTreeSet<String>,
    entries: HashMap<(String, String), bool>,
    default_entry: bool,
}

impl AllowedCollisionMatrix {
    /// Create a matrix over `names`. `default_entry = true` ignores every
    /// unlisted pair of these names, `false` checks them.
    pub fn new<I, S>(names: I, default_entry: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            entries: HashMap::new(),
            default_entry,
        }
    }

    /// Set the entry for an unordered pair. Does not register the names, so
    /// the default keeps covering only known names.
    pub fn set_entry(&mut self, a: &str, b: &str, allowed: bool) {
        self.entries.insert(pair_key(a, b), allowed);
    }

    /// Set the entry between `name` and every other known name.
    pub fn set_entries_for(&mut self, name: &str, allowed: bool) {
        self.add_name(name);
        let others: Vec<String> = self.names.iter().filter(|n| *n != name).cloned().collect();
        for other in others {
            self.entries.insert(pair_key(name, &other), allowed);
        }
    }

    /// Entry for the pair. Without an explicit entry the default applies when
    /// both names are known; otherwise the pair is checked.
    #[inline]
    pub fn get_entry(&self, a: &str, b: &str) -> bool {
        match self.get_explicit_entry(a, b) {
            Some(allowed) => allowed,
            None if self.names.contains(a) && self.names.contains(b) => self.default_entry,
            None => false,
        }
    }

    /// Entry for the pair only if one was set.
    pub fn get_explicit_entry(&self, a: &str, b: &str) -> Option<bool> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get(&pair_key(a, b)).copied()
    }

    /// Remove the explicit entry for the pair. Returns the removed value.
    pub fn remove_entry(&mut self, a: &str, b: &str) -> Option<bool> {
        self.entries.remove(&pair_key(a, b))
    }

    pub fn add_name(&mut self, name: &str) {
        if !self.names.contains(name) {
            self.names.insert(name.to_string());
        }
    }

    /// Known names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn default_entry(&self) -> bool {
        self.default_entry
    }

    pub fn set_default_entry(&mut self, allowed: bool) {
        self.default_entry = allowed;
    }

    /// Number of explicit entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical pair key (smaller name first).
pub(crate) fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_applies_to_unlisted_pairs() {
        let acm = AllowedCollisionMatrix::new(["a", "b"], true);
        assert!(acm.get_entry("a", "b"));
        assert_eq!(acm.get_explicit_entry("a", "b"), None);

        let acm = AllowedCollisionMatrix::new(["a", "b"], false);
        assert!(!acm.get_entry("a", "b"));
    }

    #[test]
    fn test_entries_are_symmetric() {
        let mut acm = AllowedCollisionMatrix::new(["a", "b", "c"], true);
        acm.set_entry("b", "a", false);
        assert!(!acm.get_entry("a", "b"));
        assert!(!acm.get_entry("b", "a"));
        assert_eq!(acm.get_explicit_entry("a", "b"), Some(false));

        acm.set_entry("a", "b", true);
        assert!(acm.get_entry("b", "a"));
        assert_eq!(acm.len(), 1);

        assert_eq!(acm.remove_entry("b", "a"), Some(true));
        assert!(acm.is_empty());
    }

    #[test]
    fn test_set_entries_for_covers_known_names() {
        let mut acm = AllowedCollisionMatrix::new(["a", "b", "c"], true);
        acm.set_entries_for("box", false);
        for other in ["a", "b", "c"] {
            assert_eq!(acm.get_explicit_entry("box", other), Some(false));
        }
        assert_eq!(acm.get_explicit_entry("box", "box"), None);
        assert_eq!(acm.names().collect::<Vec<_>>(), vec!["a", "b", "box", "c"]);
    }

    #[test]
    fn test_default_can_change() {
        let mut acm = AllowedCollisionMatrix::new(Vec::<String>::new(), false);
        acm.set_entry("a", "b", false);
        acm.add_name("a");
        acm.add_name("c");
        acm.set_default_entry(true);
        assert!(acm.default_entry());
        assert!(acm.get_entry("a", "c"));
        assert!(!acm.get_entry("a", "b"));
    }

    #[test]
    fn test_unknown_names_are_checked() {
        let mut acm = AllowedCollisionMatrix::new(["a", "b"], true);
        assert!(!acm.get_entry("a", "unknown"));
        assert!(!acm.get_entry("unknown", "other"));

        acm.set_entry("a", "tool", true);
        assert!(acm.get_entry("tool", "a"));
        assert!(!acm.get_entry("tool", "b"));

        acm.add_name("tool");
        assert!(acm.get_entry("tool", "b"));
        assert!(!acm.get_entry("tool", "unknown"));
    }
}
