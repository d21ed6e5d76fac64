//! # SlotBox Codec
//!
//! Flat, table-based binary records for SlotBox.
//!
//! A record is a table of numbered slots. Scalars live inline in the table;
//! strings, byte vectors and nested tables are written elsewhere in the
//! buffer and referenced by an [`Offset`].
//!
//! ## Conventions
//!
//! - A zero offset means "no value". Position 0 of every buffer holds the
//!   root table position, so no object ever lives there.
//! - Empty strings and byte vectors are never allocated: empty and absent
//!   read back the same.
//! - Scalar setters always write, even default values.
//! - Offset setters only write non-zero offsets.
//! - Readers never fail; absent or unreadable slots yield defaults.
//!
//! ## Usage
//!
//! ```
//! use slotbox_codec::{Builder, Table};
//!
//! let mut builder = Builder::new();
//! let device = builder.create_string_offset("device 1");
//! builder.start_table();
//! builder.set_slot::<u64>(0, 1);
//! builder.set_offset_slot(1, device);
//! builder.set_bool_slot(2, true);
//! let root = builder.end_table();
//! let bytes = builder.finish(root);
//!
//! let table = Table::root(&bytes);
//! assert_eq!(table.get_slot::<u64>(0, 0), 1);
//! assert_eq!(table.get_string_slot(1), "device 1");
//! assert!(table.get_bool_slot(2, false));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod scalar;
mod table;

pub use builder::Builder;
pub use scalar::Scalar;
pub use table::Table;

/// Size of the root table position stored at the start of every buffer.
pub const ROOT_SIZE: usize = 4;

/// Position of a string, vector or table inside a buffer.
///
/// The zero offset means "no value".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Offset(u32);

impl Offset {
    /// The zero offset.
    pub const ZERO: Self = Self(0);

    /// Creates an offset from a raw buffer position.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw buffer position.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true for the zero offset.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_string(value: &str) -> Vec<u8> {
        let mut builder = Builder::new();
        let offset = builder.create_string_offset(value);
        builder.start_table();
        builder.set_offset_slot(0, offset);
        let root = builder.end_table();
        builder.finish(root)
    }

    fn encode_nothing() -> Vec<u8> {
        let mut builder = Builder::new();
        builder.start_table();
        let root = builder.end_table();
        builder.finish(root)
    }

    #[test]
    fn empty_string_equals_never_written() {
        let empty = encode_string("");
        let absent = encode_nothing();
        assert_eq!(empty, absent);
        assert_eq!(Table::root(&empty).get_string_slot(0), "");
        assert!(!Table::root(&empty).has_slot(0));
    }

    #[test]
    fn empty_byte_vector_equals_never_written() {
        let mut builder = Builder::new();
        let offset = builder.create_byte_vector_offset(&[]);
        builder.start_table();
        builder.set_offset_slot(0, offset);
        let root = builder.end_table();
        let bytes = builder.finish(root);

        assert_eq!(bytes, encode_nothing());
        assert!(Table::root(&bytes).get_byte_vector_slot(0).is_empty());
    }

    #[test]
    fn every_scalar_width() {
        let mut builder = Builder::new();
        builder.start_table();
        builder.set_slot::<u8>(0, u8::MAX);
        builder.set_slot::<u16>(1, u16::MAX);
        builder.set_slot::<u32>(2, u32::MAX);
        builder.set_slot::<u64>(3, u64::MAX);
        builder.set_slot::<i8>(4, i8::MIN);
        builder.set_slot::<i16>(5, i16::MIN);
        builder.set_slot::<i32>(6, i32::MIN);
        builder.set_slot::<i64>(7, i64::MIN);
        builder.set_slot::<f32>(8, -1.25);
        builder.set_slot::<f64>(9, 1e300);
        let root = builder.end_table();
        let bytes = builder.finish(root);

        let t = Table::root(&bytes);
        assert_eq!(t.get_slot::<u8>(0, 0), u8::MAX);
        assert_eq!(t.get_slot::<u16>(1, 0), u16::MAX);
        assert_eq!(t.get_slot::<u32>(2, 0), u32::MAX);
        assert_eq!(t.get_slot::<u64>(3, 0), u64::MAX);
        assert_eq!(t.get_slot::<i8>(4, 0), i8::MIN);
        assert_eq!(t.get_slot::<i16>(5, 0), i16::MIN);
        assert_eq!(t.get_slot::<i32>(6, 0), i32::MIN);
        assert_eq!(t.get_slot::<i64>(7, 0), i64::MIN);
        assert_eq!(t.get_slot::<f32>(8, 0.0).to_bits(), (-1.25_f32).to_bits());
        assert_eq!(t.get_slot::<f64>(9, 0.0).to_bits(), 1e300_f64.to_bits());
    }

    #[test]
    fn offset_zero() {
        assert!(Offset::ZERO.is_zero());
        assert!(Offset::default().is_zero());
        assert!(!Offset::new(4).is_zero());
    }

    proptest! {
        #[test]
        fn string_roundtrip(value in ".*") {
            let bytes = encode_string(&value);
            prop_assert_eq!(Table::root(&bytes).get_string_slot(0), value.as_str());
        }

        #[test]
        fn garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256), slot in 0u16..16) {
            let table = Table::root(&bytes);
            let _ = table.get_slot::<u64>(slot, 0);
            let _ = table.get_string_slot(slot);
            let _ = table.get_byte_vector_slot(slot);
            let _ = table.get_table_vector_slot(slot);
            let _ = table.get_string_vector_slot(slot);
        }
    }
}
