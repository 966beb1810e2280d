use serde::{Deserialize, Serialize};
use std::fmt;

/// Content address produced by a registered hash algorithm.
///
/// The length depends on the algorithm (32 bytes for `sha256`/`blake3`,
/// 64 bytes for `sha512`). Serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        hex[..hex.len().min(12)].to_string()
    }

    pub fn from_hex(text: &str) -> Result<Self, DigestParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DigestParseError::Empty);
        }
        if text.len() % 2 != 0 {
            return Err(DigestParseError::OddLength(text.len()));
        }
        hex::decode(text.to_ascii_lowercase())
            .map(Self)
            .map_err(|_| DigestParseError::InvalidHex)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Digest::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DigestParseError {
    #[error("empty digest")]
    Empty,
    #[error("odd hex length: {0}")]
    OddLength(usize),
    #[error("invalid hex character")]
    InvalidHex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let d = Digest::from_bytes(vec![0xab, 0xcd, 0x01]);
        assert_eq!(d.to_hex(), "abcd01");
        assert_eq!(Digest::from_hex("ABCD01").unwrap(), d);
    }

    #[test]
    fn rejects_bad_hex() {
        assert_eq!(Digest::from_hex(""), Err(DigestParseError::Empty));
        assert_eq!(Digest::from_hex("abc"), Err(DigestParseError::OddLength(3)));
        assert_eq!(Digest::from_hex("zz"), Err(DigestParseError::InvalidHex));
    }

    #[test]
    fn serializes_as_hex_string() {
        let d = Digest::from_bytes(vec![1, 2]);
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"0102\"");
        let back: Digest = serde_json::from_str("\"0102\"").unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn debug_is_shortened() {
        let d = Digest::from_bytes(vec![0xff; 32]);
        assert_eq!(format!("{:?}", d), "Digest(ffffffffffff)");
        assert_eq!(d.to_string().len(), 64);
    }
}
