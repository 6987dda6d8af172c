use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IndexError;

/// Length in bytes of a [`ContentHash`] (MD5).
pub const CONTENT_HASH_LEN: usize = 16;

/// MD5 digest of the bytes of a published resource.
///
/// Always rendered as 32 lower-case hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; CONTENT_HASH_LEN]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; CONTENT_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Hashes `data`.
    pub fn digest(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(text: &str) -> Result<Self, IndexError> {
        let mut bytes = [0u8; CONTENT_HASH_LEN];
        hex::decode_to_slice(text, &mut bytes).map_err(|_| IndexError::InvalidHash {
            text: text.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}
