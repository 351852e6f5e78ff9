//! Auxiliary tag data attached to resources.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PacketError;
use crate::packet::PacketBuf;

/// Structured data that distinguishes otherwise identical resources, such as
/// enchantments on an item or the temperature of a fluid.
///
/// Two stacks of the same resource with different tags never merge. An empty
/// tag carries no data and is equivalent to no tag at all; see [`tags_equal`].
///
/// # Example
///
/// ```
/// use machina_storage::resource::{Tag, tags_equal};
/// use serde_json::json;
///
/// let hot = Tag::new().with("temperature", json!(1300));
/// assert_eq!(hot.get("temperature"), Some(&json!(1300)));
///
/// assert!(tags_equal(None, Some(&Tag::new())));
/// assert!(!tags_equal(None, Some(&hot)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Map<String, Value>);

impl Tag {
    /// Creates an empty tag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this tag with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns `true` if the tag holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Drops empty tags so that "no data" has a single representation.
    #[must_use]
    pub fn normalize(tag: Option<Tag>) -> Option<Tag> {
        tag.filter(|tag| !tag.is_empty())
    }

    /// Builds a tag from a JSON value. Anything other than an object yields
    /// `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Tag> {
        value.as_object().map(|map| Tag(map.clone()))
    }

    /// Writes an optional tag as a presence flag followed by its JSON text.
    pub fn write_optional(tag: Option<&Tag>, buf: &mut PacketBuf) {
        match tag.filter(|tag| !tag.is_empty()) {
            Some(tag) => {
                buf.write_bool(true);
                buf.write_str(&Value::Object(tag.0.clone()).to_string());
            }
            None => buf.write_bool(false),
        }
    }

    /// Reads a tag written by [`Tag::write_optional`].
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated or the payload is not a
    /// JSON object.
    pub fn read_optional(buf: &mut PacketBuf) -> Result<Option<Tag>, PacketError> {
        if !buf.read_bool()? {
            return Ok(None);
        }
        let text = buf.read_str()?;
        let map: Map<String, Value> = serde_json::from_str(&text)
            .map_err(|err| PacketError::InvalidData(format!("invalid tag: {err}")))?;
        Ok(Tag::normalize(Some(Tag(map))))
    }
}

impl From<Map<String, Value>> for Tag {
    fn from(map: Map<String, Value>) -> Self {
        Tag(map)
    }
}

/// Compares two optional tags, treating an empty tag as absent.
#[must_use]
pub fn tags_equal(a: Option<&Tag>, b: Option<&Tag>) -> bool {
    let a = a.filter(|tag| !tag.is_empty());
    let b = b.filter(|tag| !tag.is_empty());
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_and_absent_tags_are_equal() {
        let empty = Tag::new();
        assert!(tags_equal(None, None));
        assert!(tags_equal(Some(&empty), None));
        assert!(tags_equal(None, Some(&empty)));
        assert_eq!(Tag::normalize(Some(empty)), None);
    }

    #[test]
    fn tags_with_different_data_differ() {
        let a = Tag::new().with("level", json!(1));
        let b = Tag::new().with("level", json!(2));
        assert!(!tags_equal(Some(&a), Some(&b)));
        assert!(tags_equal(Some(&a), Some(&a.clone())));
    }

    #[test]
    fn packet_round_trip() {
        let tag = Tag::new().with("name", json!("Excalibur")).with("damage", json!(3));
        let mut buf = PacketBuf::new();
        Tag::write_optional(Some(&tag), &mut buf);
        Tag::write_optional(None, &mut buf);
        Tag::write_optional(Some(&Tag::new()), &mut buf);

        assert_eq!(Tag::read_optional(&mut buf).unwrap(), Some(tag));
        assert_eq!(Tag::read_optional(&mut buf).unwrap(), None);
        assert_eq!(Tag::read_optional(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn float_values_survive_packets_exactly() {
        for value in [3.153_827_444_590_713e-297, 0.1 + 0.2, -1.0e300, f64::MIN_POSITIVE] {
            let tag = Tag::new().with("t", json!(value));
            let mut buf = PacketBuf::new();
            Tag::write_optional(Some(&tag), &mut buf);
            let read = Tag::read_optional(&mut buf).unwrap().unwrap();
            assert_eq!(read.as_map()["t"].as_f64(), Some(value));
        }
    }

    #[test]
    fn non_object_tag_payload_is_rejected() {
        let mut buf = PacketBuf::new();
        buf.write_bool(true);
        buf.write_str("[1, 2]");
        assert!(matches!(
            Tag::read_optional(&mut buf),
            Err(PacketError::InvalidData(_))
        ));
    }
}
