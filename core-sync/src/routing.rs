//! # Destination Router
//!
//! Routes a job to one of three destination folders by the first character
//! of its identifier:
//!
//! | Leading digit | Category |
//! |---------------|----------|
//! | `2` `3` `4` `5` | A |
//! | `7` `8` | B |
//! | `6` `9` | C |
//! | anything else | unrouted |
//!
//! Unrouted jobs are skipped on purpose and are not errors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One of the three destination folder classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationCategory {
    A,
    B,
    C,
}

impl DestinationCategory {
    pub const ALL: [DestinationCategory; 3] = [
        DestinationCategory::A,
        DestinationCategory::B,
        DestinationCategory::C,
    ];

    /// Category for an identifier, `None` if its prefix is unmapped.
    pub fn for_identifier(identifier: &str) -> Option<Self> {
        match identifier.chars().next()? {
            '2'..='5' => Some(DestinationCategory::A),
            '7' | '8' => Some(DestinationCategory::B),
            '6' | '9' => Some(DestinationCategory::C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationCategory::A => "A",
            DestinationCategory::B => "B",
            DestinationCategory::C => "C",
        }
    }
}

impl fmt::Display for DestinationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved destination parent folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationFolder {
    /// Folder name as displayed by the storage service
    pub label: String,
    /// Full path under the namespace root
    pub path: String,
}

impl DestinationFolder {
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

/// Category to folder mapping, built once at startup and read-only after.
///
/// Categories that failed to resolve are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationMap {
    folders: HashMap<DestinationCategory, DestinationFolder>,
}

impl DestinationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: DestinationCategory, folder: DestinationFolder) {
        self.folders.insert(category, folder);
    }

    pub fn with(mut self, category: DestinationCategory, folder: DestinationFolder) -> Self {
        self.insert(category, folder);
        self
    }

    pub fn get(&self, category: DestinationCategory) -> Option<&DestinationFolder> {
        self.folders.get(&category)
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    /// Categories with no resolved folder, in `A, B, C` order
    pub fn missing(&self) -> Vec<DestinationCategory> {
        DestinationCategory::ALL
            .into_iter()
            .filter(|category| !self.folders.contains_key(category))
            .collect()
    }

    /// Destination folder for `identifier`.
    ///
    /// `None` when the prefix is unmapped or its category never resolved.
    pub fn select_destination(&self, identifier: &str) -> Option<&DestinationFolder> {
        DestinationCategory::for_identifier(identifier).and_then(|category| self.get(category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_map() -> DestinationMap {
        DestinationMap::new()
            .with(DestinationCategory::A, DestinationFolder::new("Residential", "/Residential"))
            .with(DestinationCategory::B, DestinationFolder::new("Commercial", "/Commercial"))
            .with(DestinationCategory::C, DestinationFolder::new("Civil", "/Civil"))
    }

    #[test]
    fn test_every_leading_character() {
        let map = full_map();
        let path = |id: &str| map.select_destination(id).map(|f| f.path.as_str());

        for id in ["2xx", "3xx", "4xx", "5xx"] {
            assert_eq!(path(id), Some("/Residential"), "{}", id);
        }
        for id in ["7xx", "8xx"] {
            assert_eq!(path(id), Some("/Commercial"), "{}", id);
        }
        for id in ["6xx", "9xx"] {
            assert_eq!(path(id), Some("/Civil"), "{}", id);
        }
        for id in ["0xx", "1xx", "", "J100", "-2", " 2"] {
            assert_eq!(path(id), None, "{:?}", id);
        }
    }

    #[test]
    fn test_unresolved_category_is_unrouted() {
        let map = DestinationMap::new()
            .with(DestinationCategory::B, DestinationFolder::new("Commercial", "/Commercial"));

        assert!(map.select_destination("2001").is_none());
        assert!(map.select_destination("7001").is_some());
        assert_eq!(
            map.missing(),
            vec![DestinationCategory::A, DestinationCategory::C]
        );
    }

    #[test]
    fn test_empty_map() {
        let map = DestinationMap::new();
        assert!(map.is_empty());
        assert_eq!(map.missing().len(), 3);
        assert_eq!(full_map().len(), 3);
    }
}
