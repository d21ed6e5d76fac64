//! Schema-driven property values.

use slotbox_codec::{Builder, Offset, Table};
use slotbox_model::PropertyType;
use std::fmt;

/// A property value as stored in a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The slot is absent. Empty strings and byte vectors read back as this.
    Null,
    /// A boolean.
    Bool(bool),
    /// Any integer type, widened.
    Int(i64),
    /// `Float` or `Double`, widened.
    Float(f64),
    /// A string.
    String(String),
    /// A byte vector.
    Bytes(Vec<u8>),
    /// A string vector.
    Strings(Vec<String>),
}

impl Value {
    /// Reads `slot` of `table` as a value of `property_type`.
    #[must_use]
    pub fn read(table: &Table<'_>, slot: u16, property_type: PropertyType) -> Self {
        if !table.has_slot(slot) {
            return Self::Null;
        }
        match property_type {
            PropertyType::Bool => Self::Bool(table.get_bool_slot(slot, false)),
            PropertyType::Byte => Self::Int(i64::from(table.get_slot::<i8>(slot, 0))),
            PropertyType::Short => Self::Int(i64::from(table.get_slot::<i16>(slot, 0))),
            PropertyType::Char | PropertyType::Int => {
                Self::Int(i64::from(table.get_slot::<i32>(slot, 0)))
            }
            PropertyType::Long
            | PropertyType::Date
            | PropertyType::Relation
            | PropertyType::DateNano => Self::Int(table.get_slot::<i64>(slot, 0)),
            PropertyType::Float => Self::Float(f64::from(table.get_slot::<f32>(slot, 0.0))),
            PropertyType::Double => Self::Float(table.get_slot::<f64>(slot, 0.0)),
            PropertyType::String => Self::String(table.get_string_slot(slot).to_string()),
            PropertyType::ByteVector => Self::Bytes(table.get_byte_vector_slot(slot).to_vec()),
            PropertyType::StringVector => Self::Strings(
                table
                    .get_string_vector_slot(slot)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    /// Writes the value into `slot` of the open table as `property_type`.
    ///
    /// Returns false, writing nothing, if the value does not fit the type or
    /// is out of range for the property's width.
    pub fn write(&self, builder: &mut Builder, slot: u16, property_type: PropertyType) -> bool {
        match (self, property_type) {
            (Self::Null, _) => {}
            (Self::Bool(v), PropertyType::Bool) => builder.set_bool_slot(slot, *v),
            (Self::Int(v), PropertyType::Byte) => match i8::try_from(*v) {
                Ok(v) => builder.set_slot::<i8>(slot, v),
                Err(_) => return false,
            },
            (Self::Int(v), PropertyType::Short) => match i16::try_from(*v) {
                Ok(v) => builder.set_slot::<i16>(slot, v),
                Err(_) => return false,
            },
            (Self::Int(v), PropertyType::Char | PropertyType::Int) => match i32::try_from(*v) {
                Ok(v) => builder.set_slot::<i32>(slot, v),
                Err(_) => return false,
            },
            (
                Self::Int(v),
                PropertyType::Long
                | PropertyType::Date
                | PropertyType::Relation
                | PropertyType::DateNano,
            ) => builder.set_slot::<i64>(slot, *v),
            (Self::Float(v), PropertyType::Float) => {
                let narrowed = *v as f32;
                if v.is_finite() && !narrowed.is_finite() {
                    return false;
                }
                builder.set_slot::<f32>(slot, narrowed);
            }
            (Self::Float(v), PropertyType::Double) => builder.set_slot::<f64>(slot, *v),
            (Self::String(v), PropertyType::String) => {
                let offset = builder.create_string_offset(v);
                builder.set_offset_slot(slot, offset);
            }
            (Self::Bytes(v), PropertyType::ByteVector) => {
                let offset = builder.create_byte_vector_offset(v);
                builder.set_offset_slot(slot, offset);
            }
            (Self::Strings(v), PropertyType::StringVector) => {
                if !v.is_empty() {
                    let items: Vec<Offset> = v.iter().map(|s| builder.create_string(s)).collect();
                    let offset = builder.create_offset_vector(&items);
                    builder.set_offset_slot(slot, offset);
                }
            }
            _ => return false,
        }
        true
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The value as an integer; `Null` reads as zero.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Null => Some(0),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a float; `Null` reads as zero.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Null => Some(0.0),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a string; `Null` reads as empty.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Null => Some(""),
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The value as bytes; `Null` reads as empty.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Null => Some(&[]),
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a string list; `Null` reads as empty.
    #[must_use]
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Self::Null => Some(&[]),
            Self::Strings(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "{} bytes", v.len()),
            Self::Strings(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

macro_rules! int_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::Int(i64::from(v))
                }
            }
        )*
    };
}

int_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    /// Stored as the same 64 bits; read back with `as u64`.
    fn from(v: u64) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Self::Strings(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value, property_type: PropertyType) -> Value {
        let mut builder = Builder::new();
        builder.start_table();
        assert!(value.write(&mut builder, 0, property_type));
        let root = builder.end_table();
        let bytes = builder.finish(root);
        Value::read(&Table::root(&bytes), 0, property_type)
    }

    #[test]
    fn integers_fit_property_width() {
        assert_eq!(roundtrip(Value::Int(-3), PropertyType::Byte), Value::Int(-3));
        assert_eq!(roundtrip(Value::Int(-32768), PropertyType::Short), Value::Int(-32768));
        assert_eq!(
            roundtrip(Value::Int(1 << 40), PropertyType::Date),
            Value::Int(1 << 40)
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut builder = Builder::new();
        builder.start_table();
        assert!(!Value::Int(300).write(&mut builder, 0, PropertyType::Byte));
        assert!(!Value::Int(40_000).write(&mut builder, 0, PropertyType::Short));
        assert!(!Value::Int(1 << 40).write(&mut builder, 0, PropertyType::Int));
        assert!(!Value::Float(1e300).write(&mut builder, 0, PropertyType::Float));
        let root = builder.end_table();
        let bytes = builder.finish(root);
        assert!(!Table::root(&bytes).has_slot(0));
    }

    #[test]
    fn zero_scalars_are_present_empty_strings_are_not() {
        assert_eq!(roundtrip(Value::Int(0), PropertyType::Long), Value::Int(0));
        assert_eq!(roundtrip(Value::Bool(false), PropertyType::Bool), Value::Bool(false));
        assert_eq!(roundtrip(Value::from(""), PropertyType::String), Value::Null);
        assert_eq!(roundtrip(Value::Bytes(vec![]), PropertyType::ByteVector), Value::Null);
        assert_eq!(roundtrip(Value::Strings(vec![]), PropertyType::StringVector), Value::Null);
    }

    #[test]
    fn string_vectors() {
        let tags = Value::Strings(vec!["a".into(), "bc".into()]);
        assert_eq!(roundtrip(tags.clone(), PropertyType::StringVector), tags);
    }

    #[test]
    fn mismatched_types_write_nothing() {
        let mut builder = Builder::new();
        builder.start_table();
        assert!(!Value::from("x").write(&mut builder, 0, PropertyType::Long));
        assert!(!Value::Int(1).write(&mut builder, 0, PropertyType::Double));
    }

    #[test]
    fn null_reads_as_zero_values() {
        assert_eq!(Value::Null.as_int(), Some(0));
        assert_eq!(Value::Null.as_str(), Some(""));
        assert_eq!(Value::Null.as_bytes(), Some(&[][..]));
        assert_eq!(Value::from("x").as_int(), None);
    }
}
