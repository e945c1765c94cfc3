//! String keys as referenced by simulations at runtime.
//!
//! A runtime key looks like `ACID_BASE_SOLUTIONS/screen.name`: the prefix is the
//! SCREAMING_SNAKE form of the owning repository and the remainder is the key
//! within that repository's string file. Keys travel through the crate as
//! [`StringKey`] values and are only flattened back to text at the edges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SimtransError};

/// Leading path segment of keys that are never offered for translation.
pub const ACCESSIBILITY_SEGMENT: &str = "a11y";

/// Separator between the repository prefix and the key path.
const REPO_SEPARATOR: char = '/';

/// Separator between key path segments.
pub const PATH_SEPARATOR: char = '.';

/// Key within a single repository's string file, e.g. `screen.name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_accessibility(&self) -> bool {
        self.segments
            .first()
            .is_some_and(|segment| segment == ACCESSIBILITY_SEGMENT)
    }
}

impl From<&str> for KeyPath {
    fn from(flat: &str) -> Self {
        Self {
            segments: flat.split(PATH_SEPARATOR).map(str::to_string).collect(),
        }
    }
}

impl From<String> for KeyPath {
    fn from(flat: String) -> Self {
        Self::from(flat.as_str())
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{}", PATH_SEPARATOR)?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}

/// A string key qualified by its owning repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StringKey {
    /// Owning repository in kebab case, e.g. `acid-base-solutions`
    pub repo: String,
    /// Key within that repository's string file
    pub path: KeyPath,
}

impl StringKey {
    pub fn new(repo: impl Into<String>, path: impl Into<KeyPath>) -> Self {
        Self {
            repo: repo.into(),
            path: path.into(),
        }
    }

    /// Parse a runtime key of the form `REPO_PREFIX/path`
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| SimtransError::InvalidKey {
            key: raw.to_string(),
            reason: reason.to_string(),
        };

        let (prefix, path) = raw
            .split_once(REPO_SEPARATOR)
            .ok_or_else(|| invalid("missing repository prefix"))?;

        if prefix.is_empty() {
            return Err(invalid("empty repository prefix"));
        }
        if !prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid("repository prefix must be SCREAMING_SNAKE_CASE"));
        }
        if path.is_empty() {
            return Err(invalid("empty key path"));
        }

        Ok(Self {
            repo: repo_from_prefix(prefix),
            path: KeyPath::from(path),
        })
    }

    pub fn is_accessibility(&self) -> bool {
        self.path.is_accessibility()
    }
}

impl FromStr for StringKey {
    type Err = SimtransError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StringKey {
    type Error = SimtransError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<StringKey> for String {
    fn from(key: StringKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for StringKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", prefix_from_repo(&self.repo), REPO_SEPARATOR, self.path)
    }
}

/// `ACID_BASE_SOLUTIONS` -> `acid-base-solutions`
pub fn repo_from_prefix(prefix: &str) -> String {
    prefix.to_ascii_lowercase().replace('_', "-")
}

/// `acid-base-solutions` -> `ACID_BASE_SOLUTIONS`
pub fn prefix_from_repo(repo: &str) -> String {
    repo.to_ascii_uppercase().replace('-', "_")
}
