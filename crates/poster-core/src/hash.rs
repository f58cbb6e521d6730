//! Content hashing for packed media and document fingerprints.
//!
//! SHA-256 over raw bytes. Packed media stores the hex digest next to the
//! embedded data so a load can verify nothing was altered in transit.

use sha2::{Digest, Sha256};

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Compare against a stored hex digest, ignoring case.
    pub fn matches_hex(&self, hex: &str) -> bool {
        self.to_hex().eq_ignore_ascii_case(hex.trim())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash an in-memory byte slice.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    let result = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    ContentHash::from_bytes(bytes)
}

/// Fingerprint a serialized document. Equal fingerprints mean equal bytes.
pub fn fingerprint<T: serde::Serialize>(value: &T) -> serde_json::Result<ContentHash> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(value)?);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Ok(ContentHash::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_vector() {
        // sha256("abc")
        assert_eq!(
            hash_bytes(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_matches_hex_case_insensitive() {
        let h = hash_bytes(b"abc");
        assert!(h.matches_hex(&h.to_hex().to_uppercase()));
        assert!(!h.matches_hex("00"));
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = serde_json::json!({"name": "MAT_Plastic_Black", "roughness": 0.45});
        let b = serde_json::json!({"name": "MAT_Plastic_Black", "roughness": 0.45});
        let c = serde_json::json!({"name": "MAT_Plastic_Black", "roughness": 0.5});
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&c).unwrap());
    }
}
