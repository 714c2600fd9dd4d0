//! Duplicate-preserving representation of one array element.
//!
//! `serde_json::Value` stores objects in a map, so an element containing the
//! same key twice would lose all but the last entry when copied. Elements
//! are instead carried as a [`JsonNode`] tree whose objects are plain entry
//! lists: duplicate keys and entry order survive the copy, and numbers keep
//! their original text through `serde_json`'s arbitrary-precision support.

use std::fmt;

use serde::de::{Deserialize, Deserializer, Error as DeError, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Number;

/// Key under which `serde_json` surfaces an arbitrary-precision number when
/// a value is deserialized through `deserialize_any`.
const NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// One JSON value with object entries kept as an ordered, duplicate-
/// preserving list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JsonNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<JsonNode>),
    Object(Vec<(String, JsonNode)>),
}

impl JsonNode {
    /// True when the node is a JSON object.
    pub(crate) fn is_object(&self) -> bool {
        matches!(self, JsonNode::Object(_))
    }

    /// First value stored under `key` for an object node.
    pub(crate) fn get(&self, key: &str) -> Option<&JsonNode> {
        match self {
            JsonNode::Object(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}

impl Serialize for JsonNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            JsonNode::Null => serializer.serialize_unit(),
            JsonNode::Bool(b) => serializer.serialize_bool(*b),
            JsonNode::Number(n) => n.serialize(serializer),
            JsonNode::String(s) => serializer.serialize_str(s),
            JsonNode::Array(items) => serializer.collect_seq(items),
            JsonNode::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for JsonNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = JsonNode;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<JsonNode, E>
    where
        E: DeError,
    {
        Ok(JsonNode::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<JsonNode, E>
    where
        E: DeError,
    {
        Ok(JsonNode::Number(Number::from(v)))
    }

    fn visit_u64<E>(self, v: u64) -> Result<JsonNode, E>
    where
        E: DeError,
    {
        Ok(JsonNode::Number(Number::from(v)))
    }

    fn visit_f64<E>(self, v: f64) -> Result<JsonNode, E>
    where
        E: DeError,
    {
        Number::from_f64(v)
            .map(JsonNode::Number)
            .ok_or_else(|| DeError::custom("number is not finite"))
    }

    fn visit_str<E>(self, v: &str) -> Result<JsonNode, E>
    where
        E: DeError,
    {
        Ok(JsonNode::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<JsonNode, E>
    where
        E: DeError,
    {
        Ok(JsonNode::String(v))
    }

    fn visit_unit<E>(self) -> Result<JsonNode, E>
    where
        E: DeError,
    {
        Ok(JsonNode::Null)
    }

    fn visit_none<E>(self) -> Result<JsonNode, E>
    where
        E: DeError,
    {
        Ok(JsonNode::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<JsonNode, D::Error>
    where
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<JsonNode, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(JsonNode::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<JsonNode, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries: Vec<(String, JsonNode)> = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            if entries.is_empty() && key == NUMBER_TOKEN {
                let text: String = map.next_value()?;
                let number = text
                    .parse::<Number>()
                    .map_err(|_| DeError::custom("invalid number literal"))?;
                return Ok(JsonNode::Number(number));
            }
            let value: JsonNode = map.next_value()?;
            entries.push((key, value));
        }
        Ok(JsonNode::Object(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parses and re-serializes one JSON value.
    fn roundtrip(input: &str) -> String {
        let node: JsonNode = serde_json::from_str(input).expect("parse failed");
        serde_json::to_string(&node).expect("serialize failed")
    }

    #[test]
    fn test_duplicate_keys_survive_roundtrip() {
        assert_eq!(roundtrip(r#"{"a":1,"a":2}"#), r#"{"a":1,"a":2}"#);
    }

    #[test]
    fn test_entry_order_survives_roundtrip() {
        assert_eq!(roundtrip(r#"{"z":1,"a":2,"m":3}"#), r#"{"z":1,"a":2,"m":3}"#);
    }

    #[test]
    fn test_scalars_and_nesting_roundtrip() {
        let input = r#"{"s":"v","n":-1.5,"b":true,"x":null,"arr":[1,{"k":[]}],"o":{}}"#;
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_large_number_text_preserved() {
        // Exceeds both u64 and f64 precision; only the original text
        // survives a faithful copy.
        let input = r#"{"n":123456789012345678901234567890}"#;
        assert_eq!(roundtrip(input), input);
    }

    #[test]
    fn test_get_returns_first_occurrence() {
        let node: JsonNode = serde_json::from_str(r#"{"a":1,"a":2}"#).unwrap();
        assert_eq!(node.get("a"), Some(&JsonNode::Number(Number::from(1))));
        assert_eq!(node.get("missing"), None);
    }

    #[test]
    fn test_get_on_non_object_is_none() {
        let node: JsonNode = serde_json::from_str("[1,2]").unwrap();
        assert!(!node.is_object());
        assert_eq!(node.get("a"), None);
    }
}
