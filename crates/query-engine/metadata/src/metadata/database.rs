//! The column types a response can advertise.

use std::fmt;

use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};

/// The type tags a result column can be reported under.
///
/// On the wire a tag is the PostgreSQL type OID, which is what the client's
/// value parsers dispatch on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Sequence, Serialize, Deserialize,
)]
#[serde(into = "u32", try_from = "u32")]
pub enum TypeTag {
    Boolean,
    Integer,
    Text,
    DoublePrecision,
    BooleanArray,
    IntegerArray,
    TextArray,
    FloatArray,
    TimestampWithoutTimeZone,
    TimestampWithTimeZone,
    Jsonb,
}

impl TypeTag {
    /// The PostgreSQL type OID of the tag.
    pub fn oid(self) -> u32 {
        match self {
            TypeTag::Boolean => 16,
            TypeTag::Integer => 23,
            TypeTag::Text => 25,
            TypeTag::DoublePrecision => 701,
            TypeTag::BooleanArray => 1000,
            TypeTag::IntegerArray => 1007,
            TypeTag::TextArray => 1009,
            TypeTag::FloatArray => 1022,
            TypeTag::TimestampWithoutTimeZone => 1114,
            TypeTag::TimestampWithTimeZone => 1184,
            TypeTag::Jsonb => 3802,
        }
    }

    pub fn from_oid(oid: u32) -> Option<TypeTag> {
        enum_iterator::all::<TypeTag>().find(|tag| tag.oid() == oid)
    }

    /// The type of a single element, for array tags.
    pub fn element_type(self) -> Option<TypeTag> {
        match self {
            TypeTag::BooleanArray => Some(TypeTag::Boolean),
            TypeTag::IntegerArray => Some(TypeTag::Integer),
            TypeTag::TextArray => Some(TypeTag::Text),
            TypeTag::FloatArray => Some(TypeTag::DoublePrecision),
            _ => None,
        }
    }

    pub fn is_array(self) -> bool {
        self.element_type().is_some()
    }

    /// The SQL name of the type.
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Text => "text",
            TypeTag::DoublePrecision => "double precision",
            TypeTag::BooleanArray => "boolean[]",
            TypeTag::IntegerArray => "integer[]",
            TypeTag::TextArray => "text[]",
            TypeTag::FloatArray => "double precision[]",
            TypeTag::TimestampWithoutTimeZone => "timestamp without time zone",
            TypeTag::TimestampWithTimeZone => "timestamp with time zone",
            TypeTag::Jsonb => "jsonb",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<TypeTag> for u32 {
    fn from(tag: TypeTag) -> u32 {
        tag.oid()
    }
}

/// An OID that does not correspond to any tag we report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownTypeOid(pub u32);

impl fmt::Display for UnknownTypeOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown type oid {}", self.0)
    }
}

impl TryFrom<u32> for TypeTag {
    type Error = UnknownTypeOid;

    fn try_from(oid: u32) -> Result<Self, Self::Error> {
        TypeTag::from_oid(oid).ok_or(UnknownTypeOid(oid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oids_are_unique() {
        for tag in enum_iterator::all::<TypeTag>() {
            assert_eq!(TypeTag::from_oid(tag.oid()), Some(tag), "{tag:?}");
        }
    }

    #[test]
    fn array_tags_have_scalar_elements() {
        for tag in enum_iterator::all::<TypeTag>().filter(|tag| tag.is_array()) {
            let element = tag.element_type().unwrap();
            assert!(!element.is_array(), "{tag:?} has an array element type");
        }
    }

    #[test]
    fn serializes_as_oid() {
        assert_eq!(
            serde_json::to_value(TypeTag::TimestampWithTimeZone).unwrap(),
            serde_json::json!(1184)
        );
        assert_eq!(
            serde_json::from_value::<TypeTag>(serde_json::json!(16)).unwrap(),
            TypeTag::Boolean
        );
        assert!(serde_json::from_value::<TypeTag>(serde_json::json!(17)).is_err());
    }
}
