//! JSON decoding that rejects object keys the target type does not declare.
//!
//! Derived `Deserialize` impls announce their field names through
//! `deserialize_struct`. [`StrictValue`] wraps a parsed [`Value`] and checks
//! every object handed to a struct visitor against that list, recursing into
//! nested structs, sequences, options, map values and enum variants.

use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, VariantAccess,
    Visitor,
};
use serde_json::{Map, Value};

/// Decode `bytes` into `T`, failing on unknown object keys.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    let value: Value = serde_json::from_slice(bytes)?;
    T::deserialize(StrictValue(value))
}

struct StrictValue(Value);

macro_rules! forward_to_value {
    ($($method:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            de::Deserializer::$method(self.0, visitor)
        }
    )*};
}

impl<'de> de::Deserializer<'de> for StrictValue {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Array(items) => visitor.visit_seq(StrictSeq(items.into_iter())),
            Value::Object(map) => visitor.visit_map(StrictMap::new(map)),
            other => de::Deserializer::deserialize_any(other, visitor),
        }
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Object(map) => visitor.visit_map(StrictMap::new(map)),
            other => de::Deserializer::deserialize_map(other, visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(StrictValue(other)),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Array(items) => visitor.visit_seq(StrictSeq(items.into_iter())),
            other => de::Deserializer::deserialize_seq(other, visitor),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Object(map) => {
                if let Some(unknown) = map.keys().find(|key| !fields.contains(&key.as_str())) {
                    return Err(de::Error::unknown_field(unknown, fields));
                }
                visitor.visit_map(StrictMap::new(map))
            }
            other => de::Deserializer::deserialize_struct(other, name, fields, visitor),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Array(items) => visitor.visit_seq(StrictSeq(items.into_iter())),
            other => de::Deserializer::deserialize_tuple(other, len, visitor),
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Array(items) => visitor.visit_seq(StrictSeq(items.into_iter())),
            other => de::Deserializer::deserialize_tuple_struct(other, name, len, visitor),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_unit_struct(self.0, name, visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.0 {
            // Externally tagged: `{"Variant": content}`.
            Value::Object(map) if map.len() == 1 => {
                let mut entries = map.into_iter();
                match entries.next() {
                    Some((variant, content)) => visitor.visit_enum(StrictEnum { variant, content }),
                    None => Err(de::Error::invalid_length(0, &"map with a single key")),
                }
            }
            other => de::Deserializer::deserialize_enum(other, name, variants, visitor),
        }
    }

    forward_to_value! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char deserialize_str
        deserialize_string deserialize_bytes deserialize_byte_buf deserialize_unit
        deserialize_identifier deserialize_ignored_any
    }
}

struct StrictSeq(std::vec::IntoIter<Value>);

impl<'de> SeqAccess<'de> for StrictSeq {
    type Error = serde_json::Error;

    fn next_element_seed<S: DeserializeSeed<'de>>(
        &mut self,
        seed: S,
    ) -> Result<Option<S::Value>, Self::Error> {
        self.0
            .next()
            .map(|value| seed.deserialize(StrictValue(value)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.0.len())
    }
}

struct StrictMap {
    entries: serde_json::map::IntoIter,
    pending: Option<Value>,
}

impl StrictMap {
    fn new(map: Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter(),
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for StrictMap {
    type Error = serde_json::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error> {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(key.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<S: DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value, Self::Error> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| de::Error::custom("value requested before key"))?;
        seed.deserialize(StrictValue(value))
    }
}

struct StrictEnum {
    variant: String,
    content: Value,
}

impl<'de> EnumAccess<'de> for StrictEnum {
    type Error = serde_json::Error;
    type Variant = StrictValue;

    fn variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<(S::Value, Self::Variant), Self::Error> {
        let variant = seed.deserialize(self.variant.into_deserializer())?;
        Ok((variant, StrictValue(self.content)))
    }
}

impl<'de> VariantAccess<'de> for StrictValue {
    type Error = serde_json::Error;

    fn unit_variant(self) -> Result<(), Self::Error> {
        de::Deserialize::deserialize(self)
    }

    fn newtype_variant_seed<S: DeserializeSeed<'de>>(self, seed: S) -> Result<S::Value, Self::Error> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_tuple(self, len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Media {
        id: String,
        #[serde(default)]
        file_size: Option<u64>,
        owner: Owner,
        tags: Vec<Tag>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Owner {
        name: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tag {
        label: String,
    }

    #[test]
    fn test_accepts_known_fields() {
        let media: Media = from_slice(
            br#"{"id":"1","file_size":null,"owner":{"name":"a"},"tags":[{"label":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(media.id, "1");
        assert_eq!(media.file_size, None);
        assert_eq!(media.tags, vec![Tag { label: "x".into() }]);
    }

    #[test]
    fn test_rejects_top_level_unknown_field() {
        let err = from_slice::<Media>(br#"{"id":"1","owner":{"name":"a"},"tags":[],"extra":1}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown field `extra`"));
    }

    #[test]
    fn test_rejects_nested_unknown_fields() {
        assert!(from_slice::<Media>(br#"{"id":"1","owner":{"name":"a","age":3},"tags":[]}"#).is_err());
        assert!(
            from_slice::<Media>(br#"{"id":"1","owner":{"name":"a"},"tags":[{"label":"x","color":"red"}]}"#)
                .is_err()
        );
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Directory {
        by_id: HashMap<String, Owner>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Attachment {
        Sticker,
        Media(Owner),
        Pair(Owner, Tag),
        Location { latitude: f64, longitude: f64 },
    }

    #[test]
    fn test_rejects_unknown_fields_inside_map_values() {
        let directory: Directory = from_slice(br#"{"by_id":{"a":{"name":"x"}}}"#).unwrap();
        assert_eq!(directory.by_id["a"].name, "x");

        let err = from_slice::<Directory>(br#"{"by_id":{"a":{"name":"x","extra":1}}}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field `extra`"));
    }

    #[test]
    fn test_rejects_unknown_fields_inside_enum_variants() {
        assert_eq!(from_slice::<Attachment>(br#""Sticker""#).unwrap(), Attachment::Sticker);
        assert_eq!(
            from_slice::<Attachment>(br#"{"Media":{"name":"x"}}"#).unwrap(),
            Attachment::Media(Owner { name: "x".into() })
        );
        assert_eq!(
            from_slice::<Attachment>(br#"{"Location":{"latitude":1.5,"longitude":2.0}}"#).unwrap(),
            Attachment::Location { latitude: 1.5, longitude: 2.0 }
        );

        assert!(from_slice::<Attachment>(br#"{"Media":{"name":"x","extra":1}}"#).is_err());
        assert!(from_slice::<Attachment>(br#"{"Pair":[{"name":"x"},{"label":"y","color":"red"}]}"#).is_err());
        assert!(from_slice::<Attachment>(br#"{"Location":{"latitude":1.5,"longitude":2.0,"zoom":3}}"#).is_err());
    }

    #[test]
    fn test_free_form_maps_are_not_restricted() {
        let map: HashMap<String, serde_json::Value> = from_slice(br#"{"anything":1,"goes":[1,2]}"#).unwrap();
        assert_eq!(map.len(), 2);
    }
}
