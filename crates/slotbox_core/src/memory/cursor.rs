//! Cursor state of the reference engine.

use crate::types::EntityTypeId;
use std::collections::BTreeMap;

/// A write not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingWrite {
    /// Insert or replace a record.
    Put {
        /// Encoded record.
        record: Vec<u8>,
    },
    /// Remove a record.
    Remove,
}

/// Records of one entity type.
#[derive(Debug, Default)]
pub(crate) struct Records {
    /// Committed records by object ID.
    pub(crate) records: BTreeMap<u64, Vec<u8>>,
    /// Highest ID handed out or stored.
    pub(crate) last_id: u64,
}

/// An open cursor.
///
/// Reads see the committed records overlaid with this cursor's own
/// pending writes.
#[derive(Debug)]
pub(crate) struct CursorState {
    pub(crate) entity: EntityTypeId,
    pub(crate) write: bool,
    /// Pending writes by object ID.
    writes: BTreeMap<u64, PendingWrite>,
    /// Set by `remove_all`: committed records are hidden.
    cleared: bool,
}

impl CursorState {
    pub(crate) fn new(entity: EntityTypeId, write: bool) -> Self {
        Self {
            entity,
            write,
            writes: BTreeMap::new(),
            cleared: false,
        }
    }

    pub(crate) fn put(&mut self, id: u64, record: Vec<u8>) {
        self.writes.insert(id, PendingWrite::Put { record });
    }

    /// Returns true if the record was visible.
    pub(crate) fn remove(&mut self, committed: &Records, id: u64) -> bool {
        let existed = self.get(committed, id).is_some();
        self.writes.insert(id, PendingWrite::Remove);
        existed
    }

    /// Returns how many records were visible.
    pub(crate) fn remove_all(&mut self, committed: &Records) -> u64 {
        let count = self.count(committed);
        self.writes.clear();
        self.cleared = true;
        count
    }

    pub(crate) fn get<'a>(&'a self, committed: &'a Records, id: u64) -> Option<&'a [u8]> {
        match self.writes.get(&id) {
            Some(PendingWrite::Put { record }) => Some(record.as_slice()),
            Some(PendingWrite::Remove) => None,
            None if self.cleared => None,
            None => committed.records.get(&id).map(Vec::as_slice),
        }
    }

    /// Visible records in ascending ID order.
    pub(crate) fn visible<'a>(&'a self, committed: &'a Records) -> Vec<(u64, &'a [u8])> {
        let mut view: BTreeMap<u64, &[u8]> = if self.cleared {
            BTreeMap::new()
        } else {
            committed
                .records
                .iter()
                .map(|(id, record)| (*id, record.as_slice()))
                .collect()
        };
        for (id, write) in &self.writes {
            match write {
                PendingWrite::Put { record } => {
                    view.insert(*id, record.as_slice());
                }
                PendingWrite::Remove => {
                    view.remove(id);
                }
            }
        }
        view.into_iter().collect()
    }

    pub(crate) fn count(&self, committed: &Records) -> u64 {
        self.visible(committed).len() as u64
    }

    /// Applies pending writes to `committed` and starts over.
    pub(crate) fn commit_into(&mut self, committed: &mut Records) {
        if self.cleared {
            committed.records.clear();
        }
        for (id, write) in std::mem::take(&mut self.writes) {
            match write {
                PendingWrite::Put { record } => {
                    committed.last_id = committed.last_id.max(id);
                    committed.records.insert(id, record);
                }
                PendingWrite::Remove => {
                    committed.records.remove(&id);
                }
            }
        }
        self.cleared = false;
    }

    #[cfg(test)]
    pub(crate) fn write_count(&self) -> usize {
        self.writes.len()
    }
}
