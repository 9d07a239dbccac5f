use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The name of a node or property.
///
/// Names are opaque, non-empty strings. Namespaced names use the
/// `prefix:local` convention (e.g. `trellis:uuid`) but the prefix is not
/// interpreted here.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    /// Create a name, rejecting empty strings and path delimiters.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() || value.contains(['/', '[', ']']) {
            return Err(TypeError::InvalidName(value));
        }
        Ok(Self(value))
    }

    /// Wrap a string already known to be a valid name.
    pub(crate) fn new_unchecked(value: &str) -> Self {
        Self(value.to_string())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace prefix, if the name has one.
    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once(':').map(|(prefix, _)| prefix)
    }

    /// The local part of the name (everything after the prefix).
    pub fn local_name(&self) -> &str {
        self.0.split_once(':').map_or(&self.0, |(_, local)| local)
    }
}

impl FromStr for Name {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Name {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Name {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_delimiters() {
        assert!(Name::new("").is_err());
        assert!(Name::new("a/b").is_err());
        assert!(Name::new("a[1]").is_err());
        assert!(Name::new("valid").is_ok());
    }

    #[test]
    fn prefix_and_local_name() {
        let name = Name::new("trellis:uuid").unwrap();
        assert_eq!(name.prefix(), Some("trellis"));
        assert_eq!(name.local_name(), "uuid");

        let plain = Name::new("title").unwrap();
        assert_eq!(plain.prefix(), None);
        assert_eq!(plain.local_name(), "title");
    }

    #[test]
    fn serde_rejects_invalid_names() {
        let ok: Name = serde_json::from_str("\"title\"").unwrap();
        assert_eq!(ok.as_str(), "title");
        assert!(serde_json::from_str::<Name>("\"\"").is_err());
    }
}
