//! Namespaced resource identifiers.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;

/// Namespace used when an identifier is written without one.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// A namespaced identifier such as `minecraft:water`.
///
/// Identifiers are the identity of a resource kind: two resources with the
/// same identifier are the same resource, regardless of where they came from.
///
/// # Example
///
/// ```
/// use machina_storage::resource::Identifier;
///
/// let water: Identifier = "minecraft:water".parse().unwrap();
/// assert_eq!(water.namespace(), "minecraft");
/// assert_eq!(water.path(), "water");
///
/// // The namespace defaults to `minecraft`.
/// assert_eq!(Identifier::parse("water").unwrap(), water);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    namespace: String,
    path: String,
}

impl Identifier {
    /// Creates an identifier from its two parts.
    ///
    /// # Errors
    ///
    /// Returns an error if either part contains a disallowed character or the
    /// path is empty.
    pub fn new(namespace: &str, path: &str) -> Result<Self, IdentifierError> {
        let full = || format!("{namespace}:{path}");
        if path.is_empty() {
            return Err(IdentifierError::EmptyPath(full()));
        }
        if let Some(character) = namespace.chars().find(|c| !is_namespace_char(*c)) {
            return Err(IdentifierError::InvalidNamespace {
                identifier: full(),
                character,
            });
        }
        if let Some(character) = path.chars().find(|c| !is_path_char(*c)) {
            return Err(IdentifierError::InvalidPath {
                identifier: full(),
                character,
            });
        }
        let namespace = if namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            namespace
        };
        Ok(Self {
            namespace: namespace.to_owned(),
            path: path.to_owned(),
        })
    }

    /// Parses `namespace:path`, or `path` in the default namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is malformed.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        match value.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Self::new(DEFAULT_NAMESPACE, value),
        }
    }

    /// Returns the namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn is_namespace_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-')
}

fn is_path_char(c: char) -> bool {
    is_namespace_char(c) || c == '/'
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_and_bare_ids() {
        let id = Identifier::parse("galacticraft:oxygen").unwrap();
        assert_eq!(id.namespace(), "galacticraft");
        assert_eq!(id.path(), "oxygen");
        assert_eq!(id.to_string(), "galacticraft:oxygen");

        let bare = Identifier::parse("block/stone").unwrap();
        assert_eq!(bare.namespace(), DEFAULT_NAMESPACE);
        assert_eq!(bare.path(), "block/stone");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(matches!(
            Identifier::parse("minecraft:"),
            Err(IdentifierError::EmptyPath(_))
        ));
        assert!(matches!(
            Identifier::parse("Mine:water"),
            Err(IdentifierError::InvalidNamespace { character: 'M', .. })
        ));
        assert!(matches!(
            Identifier::parse("minecraft:wat er"),
            Err(IdentifierError::InvalidPath { character: ' ', .. })
        ));
        assert!(Identifier::parse("a/b:c").is_err());
    }

    #[test]
    fn serializes_as_string() {
        let id = Identifier::parse("minecraft:lava").unwrap();
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json, serde_json::json!("minecraft:lava"));
        let back: Identifier = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<Identifier>(serde_json::json!("Bad:Id")).is_err());
    }
}
