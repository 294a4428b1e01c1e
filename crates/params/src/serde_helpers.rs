//! Serde helper modules for params file fields.
use serde::{Deserialize, Deserializer, Serializer, de::Error};

use crate::policy::BlockSizePercent;

/// Serialize/deserialize [`BlockSizePercent`] as a decimal string like `"6.25"`.
pub mod serde_percent {
    use super::*;

    pub fn serialize<S: Serializer>(v: &BlockSizePercent, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BlockSizePercent, D::Error> {
        let s = String::deserialize(d)?;
        s.parse()
            .map_err(|e| D::Error::custom(format!("invalid percentage {s}: {e}")))
    }
}
