//! Allow-lists of tool names.
//!
//! Rules:
//! - a name matches if it is present literally
//! - a list containing `"*"` matches every name
//! - an empty list matches nothing (secure by default)

use serde::{Deserialize, Serialize};

/// Whether `name` is permitted by `patterns`.
pub fn matches(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| p == "*" || p == name)
}

/// An ordered set of name patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList(Vec<String>);

impl AllowList {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut list = Vec::new();
        for pattern in patterns {
            let pattern = pattern.into();
            if !list.contains(&pattern) {
                list.push(pattern);
            }
        }
        Self(list)
    }

    pub fn allows(&self, name: &str) -> bool {
        matches(name, &self.0)
    }

}

impl From<&[String]> for AllowList {
    fn from(patterns: &[String]) -> Self {
        Self::new(patterns.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowlist_denies_all() {
        assert!(!matches("ls", &[]));
        assert!(!AllowList::default().allows("ls"));
    }

    #[test]
    fn wildcard_allows_all() {
        let patterns = vec!["git".to_string(), "*".to_string()];
        assert!(matches("anything", &patterns));
    }

    #[test]
    fn literal_match_only() {
        let list = AllowList::new(["search", "fetch"]);
        assert!(list.allows("search"));
        assert!(!list.allows("search_all"));
        assert!(!list.allows("sear"));
    }

    #[test]
    fn duplicates_collapse_preserving_order() {
        let list = AllowList::new(["a", "b", "a"]);
        assert_eq!(list.0, vec!["a", "b"]);
    }
}
