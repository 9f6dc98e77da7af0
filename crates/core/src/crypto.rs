//! Ed25519 document signing.
//!
//! Documents are signed by digest: the signer hashes the message with
//! SHA-256 and signs the 32-byte digest. Nothing in the chain depends on
//! this module; it is a standalone way to attest who authored a payload.

use crate::hash::{Hash, HashAlgorithm};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing keys or checking signatures.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Decode hex (optionally `0x`-prefixed) into a fixed-size array.
fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).ok()?.try_into().ok()
}

/// Serde adapter storing byte arrays as hex strings.
mod hex_array {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let encoded = String::deserialize(deserializer)?;
        super::decode_fixed(&encoded)
            .ok_or_else(|| de::Error::custom(format!("expected {N} hex-encoded bytes")))
    }
}

/// Detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(#[serde(with = "hex_array")] pub [u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        decode_fixed(s).map(Self).ok_or(CryptoError::InvalidSignature)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &self.to_hex()[..16])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Verifying half of a signer's keypair.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    /// Parse from hex, with or without a `0x` prefix. The bytes must be a
    /// valid curve point.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = decode_fixed(s).ok_or(CryptoError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Check a signature over raw bytes.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
        self.0
            .verify(message, &signature)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    /// Check a signature produced by [`Keypair::sign_document`].
    pub fn verify_document(
        &self,
        document: &[u8],
        signature: &Signature,
    ) -> Result<(), CryptoError> {
        self.verify(document_digest(document).as_bytes(), signature)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = CryptoError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_hex()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", &self.to_hex()[..16])
    }
}

/// An Ed25519 signer.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Fresh keypair from the operating system's entropy source.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Keypair from a 32-byte secret seed.
    pub fn from_private_key(secret: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    /// Parse a hex-encoded secret seed.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        decode_fixed(s)
            .map(|secret| Self::from_private_key(&secret))
            .ok_or(CryptoError::InvalidPrivateKey)
    }

    pub fn private_key(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key())
    }

    /// Sign raw bytes.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }

    /// Sign the SHA-256 digest of a document.
    pub fn sign_document(&self, document: &[u8]) -> Signature {
        self.sign(document_digest(document).as_bytes())
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        self.public_key().verify(message, signature)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

fn document_digest(document: &[u8]) -> Hash {
    HashAlgorithm::Sha256.digest(document)
}

/// Sign a document with the given keypair.
pub fn sign_document(keypair: &Keypair, document: &[u8]) -> Signature {
    keypair.sign_document(document)
}

/// Check a document signature. Any failure, including a signature made by
/// another key, is reported as `false`.
pub fn verify_document(public_key: &PublicKey, document: &[u8], signature: &Signature) -> bool {
    public_key.verify_document(document, signature).is_ok()
}
