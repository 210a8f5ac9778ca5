//! Locale-aware string ordering for text sort keys.
use std::fmt;

/// A precomputed sort key. Comparing two keys orders their source strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollationKey(Vec<u32>);

impl CollationKey {
    pub fn from_weights(weights: Vec<u32>) -> Self {
        CollationKey(weights)
    }

    pub fn weights(&self) -> &[u32] {
        &self.0
    }
}

/// Produces collation keys for a language.
pub trait Collator: Send + Sync + fmt::Debug {
    /// `lang` is the sort key's language tag, when one was given.
    fn collation_key(&self, text: &str, lang: Option<&str>) -> CollationKey;
}

/// Language-independent ordering: strings compare case-insensitively first, and
/// strings equal under that comparison are ordered lowercase before uppercase.
#[derive(Debug, Default, Clone, Copy)]
pub struct RootCollator;

impl Collator for RootCollator {
    fn collation_key(&self, text: &str, _lang: Option<&str>) -> CollationKey {
        let mut weights: Vec<u32> = text
            .chars()
            .flat_map(char::to_lowercase)
            .map(|c| c as u32 + 1)
            .collect();
        weights.push(0);
        weights.extend(text.chars().map(|c| if c.is_uppercase() { 2 } else { 1 }));
        CollationKey(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CollationKey {
        RootCollator.collation_key(s, None)
    }

    #[test]
    fn test_case_insensitive_primary_order() {
        assert!(key("apple") < key("Banana"));
        assert!(key("Apple") < key("banana"));
        assert!(key("ab") < key("abc"));
    }

    #[test]
    fn test_lowercase_first_on_ties() {
        assert!(key("a") < key("A"));
        assert!(key("abc") < key("aBc"));
        assert_eq!(key("same"), key("same"));
    }
}
