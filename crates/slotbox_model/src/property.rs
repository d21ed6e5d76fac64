//! Entity properties.

use crate::error::{ModelError, ModelResult};
use crate::id::IdUid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Storage type of a property.
///
/// Discriminants are part of the persisted snapshot and the binary model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum PropertyType {
    /// Boolean, one byte.
    Bool = 1,
    /// 8-bit integer.
    Byte = 2,
    /// 16-bit integer.
    Short = 3,
    /// 32-bit character code point.
    Char = 4,
    /// 32-bit integer.
    Int = 5,
    /// 64-bit integer. Required for the ID property.
    Long = 6,
    /// 32-bit float.
    Float = 7,
    /// 64-bit float.
    Double = 8,
    /// UTF-8 string.
    String = 9,
    /// Milliseconds since the epoch, 64-bit.
    Date = 10,
    /// ID of a related object, 64-bit.
    Relation = 11,
    /// Nanoseconds since the epoch, 64-bit.
    DateNano = 12,
    /// Raw bytes.
    ByteVector = 23,
    /// List of UTF-8 strings.
    StringVector = 30,
}

impl PropertyType {
    /// Returns true for types stored as integers.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Byte
                | Self::Short
                | Self::Char
                | Self::Int
                | Self::Long
                | Self::Date
                | Self::Relation
                | Self::DateNano
        )
    }

    /// Returns true for `Float` and `Double`.
    #[must_use]
    pub const fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Returns true for types stored behind an offset.
    #[must_use]
    pub const fn is_variable_length(self) -> bool {
        matches!(self, Self::String | Self::ByteVector | Self::StringVector)
    }
}

impl TryFrom<u16> for PropertyType {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Bool,
            2 => Self::Byte,
            3 => Self::Short,
            4 => Self::Char,
            5 => Self::Int,
            6 => Self::Long,
            7 => Self::Float,
            8 => Self::Double,
            9 => Self::String,
            10 => Self::Date,
            11 => Self::Relation,
            12 => Self::DateNano,
            23 => Self::ByteVector,
            30 => Self::StringVector,
            other => return Err(format!("unknown property type {other}")),
        })
    }
}

impl From<PropertyType> for u16 {
    fn from(value: PropertyType) -> Self {
        value as u16
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Property flags as a bit set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyFlags(u32);

impl PropertyFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The object's primary ID.
    pub const ID: Self = Self(1);
    /// Value may not be null.
    pub const NOT_NULL: Self = Self(4);
    /// Backed by a value index.
    pub const INDEXED: Self = Self(8);
    /// The application may assign IDs itself.
    pub const ID_SELF_ASSIGNABLE: Self = Self(128);
    /// Values are unique; implies an index.
    pub const UNIQUE: Self = Self(32);
    /// Backed by a hash index.
    pub const INDEX_HASH: Self = Self(2048);
    /// Integer values are unsigned.
    pub const UNSIGNED: Self = Self(8192);

    /// Creates flags from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if no flag is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if a property with these flags owns an index.
    #[must_use]
    pub const fn needs_index(self) -> bool {
        self.0 & (Self::INDEXED.0 | Self::UNIQUE.0 | Self::INDEX_HASH.0) != 0
    }
}

impl BitOr for PropertyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A named, typed field of an entity.
///
/// A property's slot in a stored record is its ID minus one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// ID within the owning entity, plus UID.
    pub id: IdUid,
    /// Property name, unique within the entity.
    pub name: String,
    /// Storage type.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Flags.
    #[serde(default, skip_serializing_if = "PropertyFlags::is_empty")]
    pub flags: PropertyFlags,
    /// Index identity, present iff the flags ask for an index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<IdUid>,
}

impl Property {
    /// Record slot holding this property's value.
    #[must_use]
    pub fn slot(&self) -> u16 {
        u16::try_from(self.id.id().saturating_sub(1)).unwrap_or(u16::MAX)
    }

    /// Returns true for the primary ID property.
    #[must_use]
    pub fn is_id(&self) -> bool {
        self.flags.contains(PropertyFlags::ID)
    }

    /// Checks the property's own invariants.
    pub fn validate(&self) -> ModelResult<()> {
        let context = format!("property '{}'", self.name);
        self.id.validate().map_err(|e| e.within(&context))?;

        if self.name.is_empty() {
            return Err(ModelError::invalid(context, "name is undefined"));
        }

        match (self.flags.needs_index(), self.index_id) {
            (true, None) => {
                return Err(ModelError::invalid(context, "index id is undefined"));
            }
            (true, Some(index_id)) => {
                index_id.validate().map_err(|e| e.within(&context))?;
            }
            (false, Some(_)) => {
                return Err(ModelError::invalid(
                    context,
                    "index id set on a property without an index",
                ));
            }
            (false, None) => {}
        }

        if self.is_id() && self.property_type != PropertyType::Long {
            return Err(ModelError::invalid(
                context,
                format!("ID property must be Long, not {}", self.property_type),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(id: IdUid, name: &str) -> Property {
        Property {
            id,
            name: name.to_string(),
            property_type: PropertyType::String,
            flags: PropertyFlags::NONE,
            index_id: None,
        }
    }

    #[test]
    fn slot_is_id_minus_one() {
        assert_eq!(property(IdUid::new(1, 10), "a").slot(), 0);
        assert_eq!(property(IdUid::new(3, 10), "a").slot(), 2);
    }

    #[test]
    fn valid_property() {
        assert!(property(IdUid::new(1, 10), "device").validate().is_ok());
    }

    #[test]
    fn missing_name() {
        let err = property(IdUid::new(1, 10), "").validate().unwrap_err();
        assert!(err.to_string().contains("name is undefined"));
    }

    #[test]
    fn missing_uid_names_the_property() {
        let err = property(IdUid::new(1, 0), "device").validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid property 'device' > id: uid is undefined"
        );
    }

    #[test]
    fn index_consistency() {
        let mut p = property(IdUid::new(1, 10), "device");
        p.flags = PropertyFlags::INDEXED;
        assert!(p.validate().is_err());

        p.index_id = Some(IdUid::new(1, 11));
        assert!(p.validate().is_ok());

        p.flags = PropertyFlags::NONE;
        assert!(p.validate().is_err());
    }

    #[test]
    fn id_property_must_be_long() {
        let mut p = property(IdUid::new(1, 10), "id");
        p.flags = PropertyFlags::ID;
        assert!(p.validate().is_err());
        p.property_type = PropertyType::Long;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn flags() {
        let flags = PropertyFlags::ID | PropertyFlags::UNSIGNED;
        assert!(flags.contains(PropertyFlags::ID));
        assert!(!flags.contains(PropertyFlags::INDEXED));
        assert!(!flags.needs_index());
        assert!(PropertyFlags::UNIQUE.needs_index());
        assert_eq!(flags.bits(), 8193);
        assert!(PropertyFlags::NONE.is_empty());
        assert!(!flags.is_empty());
    }

    #[test]
    fn json_shape() {
        let mut p = property(IdUid::new(2, 99), "device");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"id":"2:99","name":"device","type":9}"#);

        p.flags = PropertyFlags::INDEXED;
        p.index_id = Some(IdUid::new(1, 5));
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(
            json,
            r#"{"id":"2:99","name":"device","type":9,"flags":8,"indexId":"1:5"}"#
        );
        let back: Property = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn unknown_type_rejected() {
        let result: Result<Property, _> =
            serde_json::from_str(r#"{"id":"1:1","name":"x","type":99}"#);
        assert!(result.is_err());
    }
}
