//! Dual identifiers.

use crate::error::{ModelError, ModelResult};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A sequential ID paired with a persistent UID.
///
/// The ID is dense and scoped to its collection (entities, the properties of
/// one entity, relations, indexes). The UID is unique across the whole
/// history of a model and is never reused, which is what makes renames
/// trackable.
///
/// Persisted as the text `"id:uid"`; `"0:0"` marks an unset counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdUid {
    id: u32,
    uid: u64,
}

impl IdUid {
    /// The unset pair `0:0`.
    pub const UNSET: Self = Self { id: 0, uid: 0 };

    /// Creates a pair.
    #[must_use]
    pub const fn new(id: u32, uid: u64) -> Self {
        Self { id, uid }
    }

    /// The sequential ID.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.id
    }

    /// The persistent UID.
    #[must_use]
    pub const fn uid(self) -> u64 {
        self.uid
    }

    /// Returns true for `0:0`.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.id == 0 && self.uid == 0
    }

    /// Checks that both halves are set.
    pub fn validate(self) -> ModelResult<()> {
        if self.id == 0 {
            return Err(ModelError::invalid("id", "id is undefined"));
        }
        if self.uid == 0 {
            return Err(ModelError::invalid("id", "uid is undefined"));
        }
        Ok(())
    }

    /// Checks a counter: either unset, or both halves set.
    pub fn validate_counter(self) -> ModelResult<()> {
        if self.is_unset() {
            Ok(())
        } else {
            self.validate()
        }
    }
}

impl fmt::Display for IdUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.uid)
    }
}

impl FromStr for IdUid {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| ModelError::MalformedIdUid {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (id, uid) = s.split_once(':').ok_or_else(|| malformed("missing ':'"))?;
        let id = id.parse::<u32>().map_err(|_| malformed("id is not a u32"))?;
        let uid = uid.parse::<u64>().map_err(|_| malformed("uid is not a u64"))?;
        Ok(Self { id, uid })
    }
}

impl Serialize for IdUid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IdUid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_and_parse() {
        let pair = IdUid::new(3, 4_711_000_123);
        assert_eq!(pair.to_string(), "3:4711000123");
        assert_eq!("3:4711000123".parse::<IdUid>().unwrap(), pair);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("3".parse::<IdUid>().is_err());
        assert!("x:1".parse::<IdUid>().is_err());
        assert!("1:-5".parse::<IdUid>().is_err());
    }

    #[test]
    fn json_is_a_string() {
        let json = serde_json::to_string(&IdUid::new(1, 2)).unwrap();
        assert_eq!(json, "\"1:2\"");
        let back: IdUid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, IdUid::new(1, 2));
    }

    #[test]
    fn validate_reports_missing_half() {
        let err = IdUid::new(0, 5).validate().unwrap_err();
        assert!(err.to_string().contains("id is undefined"));
        let err = IdUid::new(5, 0).validate().unwrap_err();
        assert!(err.to_string().contains("uid is undefined"));
    }

    #[test]
    fn counters_may_be_unset() {
        assert!(IdUid::UNSET.validate_counter().is_ok());
        assert!(IdUid::UNSET.validate().is_err());
        assert!(IdUid::new(0, 9).validate_counter().is_err());
    }

    proptest! {
        #[test]
        fn validate_iff_both_halves_set(id in 0u32..4, uid in 0u64..4) {
            let pair = IdUid::new(id, uid);
            prop_assert_eq!(pair.validate().is_ok(), id != 0 && uid != 0);
        }

        #[test]
        fn text_roundtrip(id in any::<u32>(), uid in any::<u64>()) {
            let pair = IdUid::new(id, uid);
            prop_assert_eq!(pair.to_string().parse::<IdUid>().unwrap(), pair);
        }
    }
}
