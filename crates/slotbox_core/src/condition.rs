//! Query conditions and their wire encoding.
//!
//! A condition list is a codec buffer whose root table holds the entity ID
//! (slot 0) and a vector of condition tables (slot 1). Conditions are
//! conjunctive. Each condition table uses these slots:
//!
//! | slot | field            |
//! |------|------------------|
//! | 0    | op (`u8`)        |
//! | 1    | property ID      |
//! | 2, 3 | integer operands |
//! | 4, 5 | float operands   |
//! | 6    | string operand   |
//! | 7    | bytes operand    |
//! | 8    | case sensitive   |
//! | 9    | string list      |
//! | 10   | integer list     |

use crate::value::Value;
use slotbox_codec::{Builder, Offset, Table};
use slotbox_model::PropertyType;
use std::cmp::Ordering;
use std::fmt;

mod slots {
    pub const OP: u16 = 0;
    pub const PROPERTY: u16 = 1;
    pub const INT_A: u16 = 2;
    pub const INT_B: u16 = 3;
    pub const FLOAT_A: u16 = 4;
    pub const FLOAT_B: u16 = 5;
    pub const STRING: u16 = 6;
    pub const BYTES: u16 = 7;
    pub const CASE_SENSITIVE: u16 = 8;
    pub const STRINGS: u16 = 9;
    pub const INTS: u16 = 10;

    pub const ROOT_ENTITY: u16 = 0;
    pub const ROOT_CONDITIONS: u16 = 1;
}

/// Comparison performed by a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConditionOp {
    /// The property is absent from the record.
    IsNull = 1,
    /// The property is present.
    NotNull = 2,
    /// Equal to the operand.
    Equal = 3,
    /// Not equal to the operand.
    NotEqual = 4,
    /// Greater than the operand.
    Greater = 5,
    /// Less than the operand.
    Less = 6,
    /// Within the inclusive range of the two operands.
    Between = 7,
    /// Equal to one of the listed operands.
    In = 8,
    /// String contains the operand, or a string vector has it as an element.
    Contains = 9,
    /// String starts with the operand.
    StartsWith = 10,
    /// String ends with the operand.
    EndsWith = 11,
}

impl ConditionOp {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::IsNull,
            2 => Self::NotNull,
            3 => Self::Equal,
            4 => Self::NotEqual,
            5 => Self::Greater,
            6 => Self::Less,
            7 => Self::Between,
            8 => Self::In,
            9 => Self::Contains,
            10 => Self::StartsWith,
            11 => Self::EndsWith,
            _ => return None,
        })
    }

    /// Short name used in logs and errors.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::IsNull => "is null",
            Self::NotNull => "is not null",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Between => "between",
            Self::In => "in",
            Self::Contains => "contains",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
        }
    }
}

/// Operand of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand (null checks).
    None,
    /// One integer.
    Int(i64),
    /// Inclusive integer range.
    IntRange(i64, i64),
    /// Integer set.
    Ints(Vec<i64>),
    /// One float.
    Float(f64),
    /// Inclusive float range.
    FloatRange(f64, f64),
    /// One string.
    String(String),
    /// String set.
    Strings(Vec<String>),
    /// One byte vector.
    Bytes(Vec<u8>),
}

impl Operand {
    fn family(&self) -> &'static str {
        match self {
            Self::None => "null check",
            Self::Int(_) | Self::IntRange(..) | Self::Ints(_) => "integer",
            Self::Float(_) | Self::FloatRange(..) => "float",
            Self::String(_) | Self::Strings(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// One condition on one property.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// The comparison.
    pub op: ConditionOp,
    /// Property ID within the queried entity.
    pub property_id: u32,
    /// The operand.
    pub operand: Operand,
    /// Case sensitivity of string comparisons.
    pub case_sensitive: bool,
}

impl Condition {
    /// Creates a condition.
    #[must_use]
    pub fn new(op: ConditionOp, property_id: u32, operand: Operand) -> Self {
        Self {
            op,
            property_id,
            operand,
            case_sensitive: true,
        }
    }

    /// Sets the case sensitivity of string comparisons.
    #[must_use]
    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    /// Returns a short description of the condition for `property_type`, or
    /// `None` if it applies.
    #[must_use]
    pub fn mismatch(&self, property_type: PropertyType) -> Option<String> {
        let applies = match (&self.operand, self.op) {
            (Operand::None, ConditionOp::IsNull | ConditionOp::NotNull) => true,
            (
                Operand::Int(_),
                ConditionOp::Equal | ConditionOp::NotEqual | ConditionOp::Greater | ConditionOp::Less,
            )
            | (Operand::IntRange(..), ConditionOp::Between)
            | (Operand::Ints(_), ConditionOp::In) => property_type.is_integer(),
            (Operand::Float(_), ConditionOp::Greater | ConditionOp::Less)
            | (Operand::FloatRange(..), ConditionOp::Between) => property_type.is_floating(),
            (Operand::String(_), ConditionOp::Contains) => matches!(
                property_type,
                PropertyType::String | PropertyType::StringVector
            ),
            (
                Operand::String(_),
                ConditionOp::Equal
                | ConditionOp::NotEqual
                | ConditionOp::Greater
                | ConditionOp::Less
                | ConditionOp::StartsWith
                | ConditionOp::EndsWith,
            )
            | (Operand::Strings(_), ConditionOp::In) => property_type == PropertyType::String,
            (Operand::Bytes(_), ConditionOp::Equal | ConditionOp::Greater | ConditionOp::Less) => {
                property_type == PropertyType::ByteVector
            }
            _ => false,
        };
        (!applies).then(|| format!("{} condition '{}'", self.operand.family(), self.op.symbol()))
    }

    /// Encodes the condition as a table and returns its offset.
    pub fn encode(&self, builder: &mut Builder) -> Offset {
        let (string, bytes, strings, ints) = match &self.operand {
            Operand::String(s) => (builder.create_string_offset(s), Offset::ZERO, Offset::ZERO, Offset::ZERO),
            Operand::Bytes(b) => (Offset::ZERO, builder.create_byte_vector(b), Offset::ZERO, Offset::ZERO),
            Operand::Strings(list) => {
                let items: Vec<Offset> = list.iter().map(|s| builder.create_string(s)).collect();
                (Offset::ZERO, Offset::ZERO, builder.create_offset_vector(&items), Offset::ZERO)
            }
            Operand::Ints(list) => {
                let raw: Vec<u8> = list.iter().flat_map(|i| i.to_le_bytes()).collect();
                (Offset::ZERO, Offset::ZERO, Offset::ZERO, builder.create_byte_vector(&raw))
            }
            _ => (Offset::ZERO, Offset::ZERO, Offset::ZERO, Offset::ZERO),
        };

        builder.start_table();
        builder.set_byte_slot(slots::OP, self.op as u8);
        builder.set_slot::<u32>(slots::PROPERTY, self.property_id);
        match self.operand {
            Operand::Int(a) => builder.set_slot::<i64>(slots::INT_A, a),
            Operand::IntRange(a, b) => {
                builder.set_slot::<i64>(slots::INT_A, a);
                builder.set_slot::<i64>(slots::INT_B, b);
            }
            Operand::Float(a) => builder.set_slot::<f64>(slots::FLOAT_A, a),
            Operand::FloatRange(a, b) => {
                builder.set_slot::<f64>(slots::FLOAT_A, a);
                builder.set_slot::<f64>(slots::FLOAT_B, b);
            }
            Operand::Ints(_) => builder.set_offset_slot(slots::INTS, ints),
            Operand::Strings(_) => builder.set_offset_slot(slots::STRINGS, strings),
            Operand::String(_) => builder.set_offset_slot(slots::STRING, string),
            Operand::Bytes(_) => builder.set_offset_slot(slots::BYTES, bytes),
            Operand::None => {}
        }
        builder.set_bool_slot(slots::CASE_SENSITIVE, self.case_sensitive);
        builder.end_table()
    }

    /// Decodes a condition table. Returns `None` for an unknown op.
    ///
    /// The operand kind is recovered from the slots present, so a decoded
    /// condition equals the encoded one.
    #[must_use]
    pub fn decode(table: &Table<'_>) -> Option<Self> {
        let op = ConditionOp::from_u8(table.get_byte_slot(slots::OP, 0))?;
        let operand = if table.has_slot(slots::INTS) {
            let raw = table.get_byte_vector_slot(slots::INTS);
            Operand::Ints(
                raw.chunks_exact(8)
                    .filter_map(|c| c.try_into().ok().map(i64::from_le_bytes))
                    .collect(),
            )
        } else if table.has_slot(slots::STRINGS) {
            Operand::Strings(
                table
                    .get_string_vector_slot(slots::STRINGS)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            )
        } else if table.has_slot(slots::BYTES) {
            Operand::Bytes(table.get_byte_vector_slot(slots::BYTES).to_vec())
        } else if table.has_slot(slots::INT_B) {
            Operand::IntRange(
                table.get_slot::<i64>(slots::INT_A, 0),
                table.get_slot::<i64>(slots::INT_B, 0),
            )
        } else if table.has_slot(slots::INT_A) {
            Operand::Int(table.get_slot::<i64>(slots::INT_A, 0))
        } else if table.has_slot(slots::FLOAT_B) {
            Operand::FloatRange(
                table.get_slot::<f64>(slots::FLOAT_A, 0.0),
                table.get_slot::<f64>(slots::FLOAT_B, 0.0),
            )
        } else if table.has_slot(slots::FLOAT_A) {
            Operand::Float(table.get_slot::<f64>(slots::FLOAT_A, 0.0))
        } else if matches!(op, ConditionOp::IsNull | ConditionOp::NotNull) {
            Operand::None
        } else {
            // An empty string operand is never written.
            Operand::String(table.get_string_slot(slots::STRING).to_string())
        };

        Some(Self {
            op,
            property_id: table.get_slot::<u32>(slots::PROPERTY, 0),
            operand,
            case_sensitive: table.get_bool_slot(slots::CASE_SENSITIVE, true),
        })
    }

    /// Evaluates the condition against a property value.
    ///
    /// `Null` compares as the type's zero value except in null checks.
    #[must_use]
    pub fn matches(&self, value: &Value, unsigned: bool) -> bool {
        match (self.op, &self.operand) {
            (ConditionOp::IsNull, _) => value.is_null(),
            (ConditionOp::NotNull, _) => !value.is_null(),
            (op, Operand::Int(operand)) => value
                .as_int()
                .is_some_and(|v| compare_op(op, compare_int(v, *operand, unsigned))),
            (ConditionOp::Between, Operand::IntRange(low, high)) => value.as_int().is_some_and(|v| {
                compare_int(v, *low, unsigned) != Ordering::Less
                    && compare_int(v, *high, unsigned) != Ordering::Greater
            }),
            (ConditionOp::In, Operand::Ints(list)) => {
                value.as_int().is_some_and(|v| list.contains(&v))
            }
            (op, Operand::Float(operand)) => value
                .as_float()
                .and_then(|v| v.partial_cmp(operand))
                .is_some_and(|ordering| compare_op(op, ordering)),
            (ConditionOp::Between, Operand::FloatRange(low, high)) => {
                value.as_float().is_some_and(|v| *low <= v && v <= *high)
            }
            (ConditionOp::Contains, Operand::String(operand)) => match value {
                Value::Strings(items) => items.iter().any(|s| self.string_eq(s, operand)),
                _ => value
                    .as_str()
                    .is_some_and(|v| self.fold(v).contains(&self.fold(operand))),
            },
            (ConditionOp::StartsWith, Operand::String(operand)) => value
                .as_str()
                .is_some_and(|v| self.fold(v).starts_with(&self.fold(operand))),
            (ConditionOp::EndsWith, Operand::String(operand)) => value
                .as_str()
                .is_some_and(|v| self.fold(v).ends_with(&self.fold(operand))),
            (op, Operand::String(operand)) => value
                .as_str()
                .is_some_and(|v| compare_op(op, self.fold(v).cmp(&self.fold(operand)))),
            (ConditionOp::In, Operand::Strings(list)) => value
                .as_str()
                .is_some_and(|v| list.iter().any(|s| self.string_eq(v, s))),
            (op, Operand::Bytes(operand)) => value
                .as_bytes()
                .is_some_and(|v| compare_op(op, v.cmp(operand.as_slice()))),
            _ => false,
        }
    }

    fn fold(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    }

    fn string_eq(&self, a: &str, b: &str) -> bool {
        self.fold(a) == self.fold(b)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.property_id, self.op.symbol())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Int(v) => write!(f, " {v}"),
            Operand::IntRange(a, b) => write!(f, " [{a}, {b}]"),
            Operand::Ints(v) => write!(f, " {v:?}"),
            Operand::Float(v) => write!(f, " {v}"),
            Operand::FloatRange(a, b) => write!(f, " [{a}, {b}]"),
            Operand::String(v) => {
                write!(f, " {v:?}")?;
                if !self.case_sensitive {
                    f.write_str(" (case insensitive)")?;
                }
                Ok(())
            }
            Operand::Strings(v) => write!(f, " {v:?}"),
            Operand::Bytes(v) => write!(f, " {} bytes", v.len()),
        }
    }
}

fn compare_int(value: i64, operand: i64, unsigned: bool) -> Ordering {
    if unsigned {
        (value as u64).cmp(&(operand as u64))
    } else {
        value.cmp(&operand)
    }
}

fn compare_op(op: ConditionOp, ordering: Ordering) -> bool {
    match op {
        ConditionOp::Equal => ordering == Ordering::Equal,
        ConditionOp::NotEqual => ordering != Ordering::Equal,
        ConditionOp::Greater => ordering == Ordering::Greater,
        ConditionOp::Less => ordering == Ordering::Less,
        _ => false,
    }
}

/// Encodes a condition list for `entity_id`.
///
/// `conditions` are offsets returned by [`Condition::encode`] on the same
/// builder.
#[must_use]
pub fn finish_conditions(mut builder: Builder, entity_id: u32, conditions: &[Offset]) -> Vec<u8> {
    let list = builder.create_offset_vector(conditions);
    builder.start_table();
    builder.set_slot::<u32>(slots::ROOT_ENTITY, entity_id);
    builder.set_offset_slot(slots::ROOT_CONDITIONS, list);
    let root = builder.end_table();
    builder.finish(root)
}

/// Decodes a condition list into its entity ID and conditions.
///
/// Returns `None` if any condition has an unknown op.
#[must_use]
pub fn decode_conditions(bytes: &[u8]) -> Option<(u32, Vec<Condition>)> {
    let root = Table::root(bytes);
    let entity_id = root.get_slot::<u32>(slots::ROOT_ENTITY, 0);
    let conditions = root
        .get_table_vector_slot(slots::ROOT_CONDITIONS)
        .iter()
        .map(Condition::decode)
        .collect::<Option<Vec<_>>>()?;
    Some((entity_id, conditions))
}
