//! A resource is an object being stored in the lake: raw bytes plus
//! convenience codecs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DataLakeError;

/// An object stored in the data lake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub data: Vec<u8>,
}

impl Resource {
    /// A resource over raw bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// A resource holding `obj` serialized as JSON.
    pub fn json<T: Serialize>(obj: &T) -> Result<Self, DataLakeError> {
        Ok(Self {
            data: serde_json::to_vec(obj)?,
        })
    }

    /// A resource holding `obj` as Base64-encoded JSON, for backends that
    /// require text-safe payloads.
    pub fn base64<T: Serialize>(obj: &T) -> Result<Self, DataLakeError> {
        let json = serde_json::to_vec(obj)?;
        Ok(Self {
            data: BASE64.encode(json).into_bytes(),
        })
    }

    /// Parse the resource data as JSON.
    pub fn scan_json<T: DeserializeOwned>(&self) -> Result<T, DataLakeError> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// Parse the resource data as Base64-encoded JSON.
    pub fn scan_base64<T: DeserializeOwned>(&self) -> Result<T, DataLakeError> {
        let json = BASE64.decode(&self.data)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Block {
        number: u64,
        hash: String,
    }

    fn block() -> Block {
        Block {
            number: 19_000_000,
            hash: "0xabc".into(),
        }
    }

    #[test]
    fn json_roundtrip() {
        let res = Resource::json(&block()).unwrap();
        let scanned: Block = res.scan_json().unwrap();
        assert_eq!(scanned, block());
    }

    #[test]
    fn base64_roundtrip() {
        let res = Resource::base64(&block()).unwrap();
        // The payload is text-safe.
        assert!(res.data.iter().all(|b| b.is_ascii()));
        let scanned: Block = res.scan_base64().unwrap();
        assert_eq!(scanned, block());
    }

    #[test]
    fn scan_json_rejects_garbage() {
        let res = Resource::new(b"not json".to_vec());
        assert!(res.scan_json::<Block>().is_err());
    }
}
