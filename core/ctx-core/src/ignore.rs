//! Path components that never produce file-change records.

use std::collections::HashSet;
use std::path::{Component, Path};

/// Version control metadata, dependency and build directories, caches,
/// editor swap files and compiled artifacts.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    "venv",
    ".venv",
    "dist",
    "build",
    "target",
    "*.pyc",
    "*.pyo",
    "*.egg-info",
    ".DS_Store",
    "*.swp",
    "*.swo",
];

/// Patterns are either an exact component name or `*suffix`.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    exact: HashSet<String>,
    suffixes: Vec<String>,
}

impl IgnoreSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        set.extend(patterns);
        set
    }

    /// The built-in patterns plus `extra`.
    pub fn with_defaults<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new(DEFAULT_IGNORE_PATTERNS);
        set.extend(extra);
        set
    }

    fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            match pattern.strip_prefix('*') {
                Some(suffix) if !suffix.is_empty() => self.suffixes.push(suffix.to_string()),
                Some(_) => {}
                None => {
                    self.exact.insert(pattern.to_string());
                }
            }
        }
    }

    /// True if any normal component of `path` matches.
    pub fn is_ignored(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                self.exact.contains(part.as_ref())
                    || self.suffixes.iter().any(|suffix| part.ends_with(suffix.as_str()))
            }
            _ => false,
        })
    }
}
