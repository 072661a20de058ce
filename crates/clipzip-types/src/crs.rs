//! EPSG coordinate reference system codes.
//!
//! The service is inconsistent about how it spells a CRS: collection `crs`
//! lists arrive as strings (`"4326"`, sometimes `"EPSG:4326"`), request bodies
//! want bare integers. [`Crs`] accepts every form on input and always
//! serializes as the integer code.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An EPSG code.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Crs(pub u32);

impl Crs {
    /// WGS 84.
    pub const WGS84: Crs = Crs(4326);
    /// NAD83(CSRS), the CRS collection footprints are published in.
    pub const NAD83_CSRS: Crs = Crs(4617);
    /// NAD83 / Canada Atlas Lambert, the CRS of the basemap limits.
    pub const CANADA_ATLAS_LAMBERT: Crs = Crs(3978);

    pub fn code(self) -> u32 {
        self.0
    }

    /// `EPSG:<code>` form used by layer configs.
    pub fn epsg(self) -> String {
        format!("EPSG:{}", self.0)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CRS: {0:?}")]
pub struct CrsParseError(pub String);

impl FromStr for Crs {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        code.parse::<u32>()
            .map(Crs)
            .map_err(|_| CrsParseError(s.to_string()))
    }
}

impl From<u32> for Crs {
    fn from(code: u32) -> Self {
        Crs(code)
    }
}

impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CrsVisitor;

        impl Visitor<'_> for CrsVisitor {
            type Value = Crs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an EPSG code as integer or string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Crs, E> {
                u32::try_from(v).map(Crs).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Crs, E> {
                u32::try_from(v).map(Crs).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Crs, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(CrsVisitor)
    }
}
