// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Radius field codec: written as a number, read from a number or a decimal
//! string (older documents store `"20"`).

use std::fmt;

use serde::{de, Deserializer, Serializer};

/// Parse a positive whole number of meters from user or document text.
pub fn parse_radius(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|r| *r > 0)
}

struct RadiusVisitor;

impl de::Visitor<'_> for RadiusVisitor {
    type Value = u32;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a positive radius in meters (number or decimal string)")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u32, E> {
        u32::try_from(v)
            .ok()
            .filter(|r| *r > 0)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u32, E> {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::invalid_value(de::Unexpected::Signed(v), &self)),
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u32, E> {
        parse_radius(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

/// Serialize a radius as a plain number.
pub fn serialize<S: Serializer>(value: &u32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u32(*value)
}

/// Deserialize a radius from a number or decimal string.
pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    d.deserialize_any(RadiusVisitor)
}

/// Same codec for optional radius fields (patches).
pub mod optional {
    use serde::{Deserializer, Serializer};

    /// Serialize a present radius as a number.
    pub fn serialize<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_some(v),
            None => s.serialize_none(),
        }
    }

    /// Deserialize a present radius from a number or decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        super::deserialize(d).map(Some)
    }
}
