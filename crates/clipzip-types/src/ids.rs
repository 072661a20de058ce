//! Typed identifiers for collections and extraction jobs.
//!
//! Both wrap the server's string form unchanged. They are opaque on the wire
//! (`#[serde(transparent)]`) and borrow as `str`, so maps keyed by them can be
//! queried with plain string slices.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A collection identifier, unique within one catalog snapshot.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(String);

/// An extraction job identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_string_id {
    ($T:ident, $name:literal) => {
        impl $T {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($name, "({})"), self.0)
            }
        }

        impl Borrow<str> for $T {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl PartialEq<str> for $T {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $T {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

impl_string_id!(CollectionId, "CollectionId");
impl_string_id!(JobId, "JobId");

impl JobId {
    /// A locally generated id for jobs the server never accepted.
    pub fn local() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(CollectionId::from("cdem"), 1);
        assert_eq!(map.get("cdem"), Some(&1));
        assert_eq!(map.get("nope"), None);
    }

    #[test]
    fn test_serde_transparent() {
        let id = JobId::new("a1b2");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"a1b2\"");
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_local_job_ids_are_unique() {
        assert_ne!(JobId::local(), JobId::local());
    }

    #[test]
    fn test_debug_shows_kind() {
        assert_eq!(format!("{:?}", CollectionId::from("x")), "CollectionId(x)");
    }
}
