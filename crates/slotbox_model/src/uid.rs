//! UID minting.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Largest UID handed out; keeps UIDs representable as signed 64-bit values.
pub const MAX_UID: u64 = u64::MAX >> 1;

/// Mints UIDs that collide with nothing seen so far.
///
/// Every UID of the previous model (live and retired) must be registered
/// before minting starts. Minted UIDs are registered automatically.
#[derive(Debug)]
pub struct UidMinter {
    rng: StdRng,
    taken: HashSet<u64>,
}

impl UidMinter {
    /// Creates a minter, seeded for reproducible output if `seed` is set.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            taken: HashSet::new(),
        }
    }

    /// Marks UIDs as unavailable.
    pub fn reserve(&mut self, uids: impl IntoIterator<Item = u64>) {
        self.taken.extend(uids);
    }

    /// Returns true if `uid` is known to the minter.
    #[must_use]
    pub fn is_taken(&self, uid: u64) -> bool {
        self.taken.contains(&uid)
    }

    /// Returns a fresh UID.
    pub fn mint(&mut self) -> u64 {
        loop {
            let uid = self.rng.gen_range(1..=MAX_UID);
            if self.taken.insert(uid) {
                return uid;
            }
        }
    }
}
