//! Hashing utilities for the chain: a 256-bit digest type and the
//! configurable digest algorithm behind it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use std::collections::HashMap;
use std::fmt;

/// A named alias for a 32-byte(u8) array, used to represent a 256-bit hash.
pub type H256 = [u8; 32];

/// A wrapper type for H256 with Display and Debug formatting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub H256);

impl Hash {
    /// The zero hash (all zeros). Used as the genesis `prev_hash` sentinel.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a new Hash from raw bytes.
    pub fn from_bytes(bytes: H256) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &H256 {
        &self.0
    }

    /// Convert to a lowercase hex string (no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Number of leading `0` symbols in the hex encoding.
    pub fn leading_zero_nibbles(&self) -> usize {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }

    /// Hex symbol at `position`, or `None` past the end.
    pub fn hex_symbol(&self, position: usize) -> Option<char> {
        let byte = *self.0.get(position / 2)?;
        let nibble = if position % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        char::from_digit(u32::from(nibble), 16)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<H256> for Hash {
    fn from(bytes: H256) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for H256 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Digest algorithm used for block hashes and merkle nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha3_256,
    Blake3,
}

impl HashAlgorithm {
    /// Hash arbitrary data.
    pub fn digest(self, data: &[u8]) -> Hash {
        self.digest_concat(&[data])
    }

    /// Hash multiple pieces of data as if they were concatenated.
    pub fn digest_concat(self, parts: &[&[u8]]) -> Hash {
        match self {
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                Hash(hasher.finalize().into())
            }
            Self::Sha3_256 => {
                let mut hasher = Sha3_256::new();
                for part in parts {
                    hasher.update(part);
                }
                Hash(hasher.finalize().into())
            }
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for part in parts {
                    hasher.update(part);
                }
                Hash(hasher.finalize().into())
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha3_256 => "sha3-256",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha3-256" | "sha3" => Ok(Self::Sha3_256),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

/// Hash arbitrary data with the default algorithm (SHA-256).
pub fn hash(data: &[u8]) -> Hash {
    HashAlgorithm::default().digest(data)
}

/// Hash multiple pieces of data by concatenating them.
pub fn hash_concat(parts: &[&[u8]]) -> Hash {
    HashAlgorithm::default().digest_concat(parts)
}

/// Number of bits that differ between two digests.
pub fn avalanche(a: &Hash, b: &Hash) -> u32 {
    a.0.iter().zip(b.0.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Two distinct inputs whose digests share a hex prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixCollision {
    pub first: String,
    pub second: String,
    pub prefix: String,
    pub attempts: u64,
}

/// Search `base0`, `base1`, ... until two inputs share the first
/// `prefix_nibbles` hex symbols of their digest.
///
/// Returns `None` if `max_attempts` inputs were hashed without a collision.
pub fn find_prefix_collision(
    base: &str,
    prefix_nibbles: usize,
    algorithm: HashAlgorithm,
    max_attempts: u64,
) -> Option<PrefixCollision> {
    let prefix_nibbles = prefix_nibbles.clamp(1, 64);
    let mut seen: HashMap<String, String> = HashMap::new();

    for counter in 0..max_attempts {
        let input = format!("{base}{counter}");
        let prefix = algorithm.digest(input.as_bytes()).to_hex()[..prefix_nibbles].to_string();
        if let Some(previous) = seen.get(&prefix) {
            return Some(PrefixCollision {
                first: previous.clone(),
                second: input,
                prefix,
                attempts: counter + 1,
            });
        }
        seen.insert(prefix, input);
    }

    None
}
