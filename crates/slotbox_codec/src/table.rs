//! Table reader.

use crate::scalar::Scalar;
use crate::{Offset, ROOT_SIZE};

/// A read-only view of one table inside a buffer.
///
/// Every read is bounds-checked. Reading an absent slot, a slot past the
/// table's slot count or a truncated buffer returns the default or empty
/// value instead of failing; making sense of the slots is up to the caller.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Table<'a> {
    /// Opens the root table of a finished buffer.
    ///
    /// A buffer too short to hold a root position yields an absent table.
    pub fn root(buf: &'a [u8]) -> Self {
        let pos = u32::read_le(buf).map_or(0, |p| p as usize);
        Self { buf, pos }
    }

    /// Opens the table located at `pos` in `buf`.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// The table's position in its buffer. Zero for an absent table.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Returns true if this view points at no table.
    pub fn is_absent(&self) -> bool {
        self.pos < ROOT_SIZE
    }

    /// Number of slots in the table's slot directory.
    pub fn slot_count(&self) -> u16 {
        if self.is_absent() {
            return 0;
        }
        self.read::<u16>(self.pos).unwrap_or(0)
    }

    /// Returns true if `slot` holds a value.
    pub fn has_slot(&self, slot: u16) -> bool {
        self.field_position(slot).is_some()
    }

    /// Absolute position of the data stored in `slot`, if any.
    pub fn field_position(&self, slot: u16) -> Option<usize> {
        if slot >= self.slot_count() {
            return None;
        }
        let entry = self.pos + 4 + 4 * usize::from(slot);
        match self.read::<u32>(entry)? {
            0 => None,
            relative => Some(self.pos + relative as usize),
        }
    }

    /// Reads a scalar slot, or `default` if the slot is absent.
    pub fn get_slot<T: Scalar>(&self, slot: u16, default: T) -> T {
        self.field_position(slot)
            .and_then(|at| self.read::<T>(at))
            .unwrap_or(default)
    }

    /// Reads a single byte slot.
    pub fn get_byte_slot(&self, slot: u16, default: u8) -> u8 {
        self.get_slot::<u8>(slot, default)
    }

    /// Reads a boolean slot written by `Builder::set_bool_slot`.
    pub fn get_bool_slot(&self, slot: u16, default: bool) -> bool {
        self.get_byte_slot(slot, u8::from(default)) != 0
    }

    /// Reads an offset slot. Absent slots read as the zero offset.
    pub fn get_offset_slot(&self, slot: u16) -> Offset {
        Offset::new(self.get_slot::<u32>(slot, 0))
    }

    /// Reads a string slot.
    ///
    /// Returns `""` if the slot is absent, its offset is zero, or the stored
    /// bytes are not valid UTF-8.
    pub fn get_string_slot(&self, slot: u16) -> &'a str {
        std::str::from_utf8(self.get_byte_vector_slot(slot)).unwrap_or("")
    }

    /// Reads a byte vector slot. Returns an empty slice if absent.
    pub fn get_byte_vector_slot(&self, slot: u16) -> &'a [u8] {
        let offset = self.get_offset_slot(slot);
        if offset.is_zero() {
            return &[];
        }
        self.vector_at(offset.value() as usize).unwrap_or(&[])
    }

    /// Reads a nested table slot.
    pub fn get_table_slot(&self, slot: u16) -> Option<Table<'a>> {
        let offset = self.get_offset_slot(slot);
        if offset.is_zero() {
            return None;
        }
        Some(Table::at(self.buf, offset.value() as usize))
    }

    /// Reads a vector-of-tables slot. Absent slots read as empty.
    pub fn get_table_vector_slot(&self, slot: u16) -> Vec<Table<'a>> {
        self.offsets_in(slot)
            .into_iter()
            .map(|o| Table::at(self.buf, o.value() as usize))
            .collect()
    }

    /// Reads a vector-of-strings slot. Absent slots read as empty.
    pub fn get_string_vector_slot(&self, slot: u16) -> Vec<&'a str> {
        self.offsets_in(slot)
            .into_iter()
            .map(|o| {
                self.vector_at(o.value() as usize)
                    .and_then(|bytes| std::str::from_utf8(bytes).ok())
                    .unwrap_or("")
            })
            .collect()
    }

    fn offsets_in(&self, slot: u16) -> Vec<Offset> {
        let offset = self.get_offset_slot(slot);
        if offset.is_zero() {
            return Vec::new();
        }
        // Offset vectors store the element count, not the byte length.
        let pos = offset.value() as usize;
        let count = self.read::<u32>(pos).unwrap_or(0) as usize;
        let mut offsets = Vec::new();
        for i in 0..count {
            match self.read::<u32>(pos + 4 + 4 * i) {
                Some(value) => offsets.push(Offset::new(value)),
                None => break,
            }
        }
        offsets
    }

    /// Returns the payload of the length-prefixed object at `pos`.
    fn vector_at(&self, pos: usize) -> Option<&'a [u8]> {
        let len = self.read::<u32>(pos)? as usize;
        let start = pos.checked_add(4)?;
        self.buf.get(start..start.checked_add(len)?)
    }

    fn read<T: Scalar>(&self, at: usize) -> Option<T> {
        T::read_le(self.buf.get(at..)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;

    fn sample() -> Vec<u8> {
        let mut builder = Builder::new();
        let name = builder.create_string_offset("sensor");
        let blob = builder.create_byte_vector_offset(&[1, 2, 3]);
        builder.start_table();
        builder.set_slot::<i64>(0, -42);
        builder.set_offset_slot(1, name);
        builder.set_offset_slot(2, blob);
        builder.set_bool_slot(4, true);
        builder.set_slot::<f32>(5, 2.5);
        let root = builder.end_table();
        builder.finish(root)
    }

    #[test]
    fn reads_written_slots() {
        let bytes = sample();
        let table = Table::root(&bytes);
        assert_eq!(table.slot_count(), 6);
        assert_eq!(table.get_slot::<i64>(0, 0), -42);
        assert_eq!(table.get_string_slot(1), "sensor");
        assert_eq!(table.get_byte_vector_slot(2), &[1, 2, 3]);
        assert!(table.get_bool_slot(4, false));
        assert!((table.get_slot::<f32>(5, 0.0) - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn absent_slots_read_defaults() {
        let bytes = sample();
        let table = Table::root(&bytes);
        assert!(!table.has_slot(3));
        assert_eq!(table.get_slot::<u32>(3, 77), 77);
        assert_eq!(table.get_string_slot(3), "");
        assert!(table.get_byte_vector_slot(40).is_empty());
        assert!(table.get_table_slot(3).is_none());
    }

    #[test]
    fn default_valued_scalars_are_still_present() {
        let mut builder = Builder::new();
        builder.start_table();
        builder.set_slot::<u64>(0, 0);
        builder.set_bool_slot(1, false);
        let root = builder.end_table();
        let bytes = builder.finish(root);

        let table = Table::root(&bytes);
        assert!(table.has_slot(0));
        assert!(table.has_slot(1));
        assert!(!table.get_bool_slot(1, true));
    }

    #[test]
    fn nested_tables_and_vectors() {
        let mut builder = Builder::new();
        let mut children = Vec::new();
        for i in 0..3u32 {
            builder.start_table();
            builder.set_slot::<u32>(0, i);
            children.push(builder.end_table());
        }
        let list = builder.create_offset_vector(&children);
        let words: Vec<_> = ["a", "bc"]
            .iter()
            .map(|w| builder.create_string(w))
            .collect();
        let words = builder.create_offset_vector(&words);
        builder.start_table();
        builder.set_offset_slot(0, list);
        builder.set_offset_slot(1, words);
        let root = builder.end_table();
        let bytes = builder.finish(root);

        let table = Table::root(&bytes);
        let values: Vec<u32> = table
            .get_table_vector_slot(0)
            .iter()
            .map(|t| t.get_slot::<u32>(0, 99))
            .collect();
        assert_eq!(values, vec![0, 1, 2]);
        assert_eq!(table.get_string_vector_slot(1), vec!["a", "bc"]);
    }

    #[test]
    fn table_opened_inside_another_table() {
        let mut builder = Builder::new();
        builder.start_table();
        builder.set_slot::<u16>(0, 5);
        builder.start_table();
        builder.set_slot::<u16>(0, 6);
        let inner = builder.end_table();
        builder.set_offset_slot(1, inner);
        let outer = builder.end_table();
        let bytes = builder.finish(outer);

        let table = Table::root(&bytes);
        assert_eq!(table.get_slot::<u16>(0, 0), 5);
        let inner = table.get_table_slot(1).unwrap();
        assert_eq!(inner.get_slot::<u16>(0, 0), 6);
    }

    #[test]
    fn truncated_buffer_reads_defaults() {
        let bytes = sample();
        for cut in 0..bytes.len() {
            let table = Table::root(&bytes[..cut]);
            let _ = table.get_slot::<i64>(0, 0);
            let _ = table.get_string_slot(1);
            let _ = table.get_byte_vector_slot(2);
        }
        assert!(Table::root(&[]).is_absent());
        assert_eq!(Table::root(&[1, 2]).slot_count(), 0);
    }
}
