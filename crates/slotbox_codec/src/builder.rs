//! Table builder.

use crate::scalar::Scalar;
use crate::{Offset, ROOT_SIZE};

/// A field recorded while a table is open.
#[derive(Debug, Clone)]
struct PendingField {
    slot: u16,
    align: usize,
    data: Vec<u8>,
}

/// A growable buffer that records are written into.
///
/// Strings, byte vectors and offset vectors are written immediately and
/// return an [`Offset`]. Table fields are collected while the table is open
/// and laid out by [`Builder::end_table`], so creating a string while a table
/// is open is fine.
///
/// # Example
///
/// ```
/// use slotbox_codec::{Builder, Table};
///
/// let mut builder = Builder::new();
/// let name = builder.create_string_offset("device 1");
/// builder.start_table();
/// builder.set_slot::<u64>(0, 7);
/// builder.set_offset_slot(1, name);
/// let root = builder.end_table();
/// let bytes = builder.finish(root);
///
/// let table = Table::root(&bytes);
/// assert_eq!(table.get_slot::<u64>(0, 0), 7);
/// assert_eq!(table.get_string_slot(1), "device 1");
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    buf: Vec<u8>,
    open: Vec<Vec<PendingField>>,
}

impl Builder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Creates an empty builder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity.max(ROOT_SIZE));
        buf.resize(ROOT_SIZE, 0);
        Self {
            buf,
            open: Vec::new(),
        }
    }

    /// Number of bytes written so far, including the root header.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing beyond the root header has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.len() == ROOT_SIZE
    }

    /// Discards everything written so far so the builder can be reused.
    pub fn reset(&mut self) {
        self.buf.truncate(ROOT_SIZE);
        self.buf.fill(0);
        self.open.clear();
    }

    /// Writes a string and returns its offset. Always allocates.
    pub fn create_string(&mut self, value: &str) -> Offset {
        self.create_byte_vector(value.as_bytes())
    }

    /// Writes a byte vector and returns its offset. Always allocates.
    pub fn create_byte_vector(&mut self, value: &[u8]) -> Offset {
        let pos = self.begin_object();
        self.push_len(value.len());
        self.buf.extend_from_slice(value);
        pos
    }

    /// Writes a string unless it is empty.
    ///
    /// Returns the zero offset for an empty string, so the field is omitted
    /// entirely and reads back as absent.
    pub fn create_string_offset(&mut self, value: &str) -> Offset {
        if value.is_empty() {
            Offset::ZERO
        } else {
            self.create_string(value)
        }
    }

    /// Writes a byte vector unless it is empty. See [`Self::create_string_offset`].
    pub fn create_byte_vector_offset(&mut self, value: &[u8]) -> Offset {
        if value.is_empty() {
            Offset::ZERO
        } else {
            self.create_byte_vector(value)
        }
    }

    /// Writes a vector of offsets (strings, byte vectors or tables).
    pub fn create_offset_vector(&mut self, offsets: &[Offset]) -> Offset {
        let pos = self.begin_object();
        self.push_len(offsets.len());
        for offset in offsets {
            offset.value().write_le(&mut self.buf);
        }
        pos
    }

    /// Opens a new table. Tables may be nested; fields go to the innermost one.
    pub fn start_table(&mut self) {
        self.open.push(Vec::new());
    }

    /// Writes a scalar into `slot` of the open table.
    ///
    /// The value is written even when it equals the type's default. Callers
    /// that want default omission check before calling.
    pub fn set_slot<T: Scalar>(&mut self, slot: u16, value: T) {
        let mut data = Vec::with_capacity(T::WIDTH);
        value.write_le(&mut data);
        self.push_field(slot, T::WIDTH, data);
    }

    /// Writes a single byte into `slot`.
    pub fn set_byte_slot(&mut self, slot: u16, value: u8) {
        self.set_slot::<u8>(slot, value);
    }

    /// Writes a boolean as a single byte, 1 for true and 0 for false.
    pub fn set_bool_slot(&mut self, slot: u16, value: bool) {
        self.set_byte_slot(slot, u8::from(value));
    }

    /// Writes an offset into `slot`, but only if it is non-zero.
    pub fn set_offset_slot(&mut self, slot: u16, offset: Offset) {
        if !offset.is_zero() {
            self.set_slot::<u32>(slot, offset.value());
        }
    }

    /// Closes the innermost open table and lays it out.
    ///
    /// Layout: `u16` slot count, `u16` padding, one `u32` per slot holding the
    /// field position relative to the table start (0 = absent), then the
    /// inline field data, each aligned to its own width.
    pub fn end_table(&mut self) -> Offset {
        let fields = match self.open.pop() {
            Some(fields) => fields,
            None => {
                debug_assert!(false, "end_table called without an open table");
                Vec::new()
            }
        };

        let slot_count = fields
            .iter()
            .map(|f| usize::from(f.slot) + 1)
            .max()
            .unwrap_or(0);

        self.align(4);
        let start = self.buf.len();
        let header = 4 + 4 * slot_count;
        self.buf.resize(start + header, 0);
        let count_bytes = u16::try_from(slot_count).unwrap_or(u16::MAX).to_le_bytes();
        self.buf[start..start + 2].copy_from_slice(&count_bytes);

        for field in fields {
            self.align(field.align);
            let relative = u32::try_from(self.buf.len() - start).unwrap_or(0);
            self.buf.extend_from_slice(&field.data);
            let entry = start + 4 + 4 * usize::from(field.slot);
            self.buf[entry..entry + 4].copy_from_slice(&relative.to_le_bytes());
        }

        Offset::new(u32::try_from(start).unwrap_or(0))
    }

    /// Records `root` as the buffer's root table and returns the bytes.
    pub fn finish(mut self, root: Offset) -> Vec<u8> {
        self.buf[..ROOT_SIZE].copy_from_slice(&root.value().to_le_bytes());
        self.buf
    }

    fn push_field(&mut self, slot: u16, align: usize, data: Vec<u8>) {
        let Some(fields) = self.open.last_mut() else {
            debug_assert!(false, "slot {slot} written outside of a table");
            return;
        };
        // Last write to a slot wins.
        fields.retain(|f| f.slot != slot);
        fields.push(PendingField { slot, align, data });
    }

    fn begin_object(&mut self) -> Offset {
        self.align(4);
        Offset::new(u32::try_from(self.buf.len()).unwrap_or(0))
    }

    fn push_len(&mut self, len: usize) {
        u32::try_from(len)
            .unwrap_or(u32::MAX)
            .write_le(&mut self.buf);
    }

    fn align(&mut self, align: usize) {
        let padding = (align - self.buf.len() % align) % align;
        self.buf.resize(self.buf.len() + padding, 0);
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
