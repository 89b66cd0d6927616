//! HMAC-SHA-256 request signing
//!
//! The signature covers the exact bytes of the request body and is sent as
//! `Authorization: HMAC <lowercase hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Authorization scheme name
pub const AUTH_SCHEME: &str = "HMAC";

/// Size of an HMAC-SHA-256 tag in bytes
pub const SIGNATURE_SIZE: usize = 32;

/// Errors that can occur during signing operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("Shared secret is empty")]
    EmptySecret,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signature is not valid hex")]
    MalformedSignature,

    #[error("Invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength { expected: usize, actual: usize },

    #[error("Signature verification failed")]
    VerificationFailed,
}

impl From<SigningError> for crate::error::Error {
    fn from(e: SigningError) -> Self {
        crate::error::Error::Signing(e.to_string())
    }
}

/// Signs and verifies request bodies with a shared secret
#[derive(Clone)]
pub struct RequestSigner {
    key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").field("key", &"***").finish()
    }
}

impl RequestSigner {
    pub fn new(secret: &str) -> Result<Self, SigningError> {
        if secret.is_empty() {
            return Err(SigningError::EmptySecret);
        }
        Ok(Self {
            key: Zeroizing::new(secret.as_bytes().to_vec()),
        })
    }

    fn mac(&self) -> Result<HmacSha256, SigningError> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| SigningError::InvalidKey(e.to_string()))
    }

    /// Hex-encoded HMAC-SHA-256 of `body`
    pub fn sign(&self, body: &[u8]) -> Result<String, SigningError> {
        let mut mac = self.mac()?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self, body: &[u8]) -> Result<String, SigningError> {
        Ok(format!("{} {}", AUTH_SCHEME, self.sign(body)?))
    }

    /// Check a hex signature against `body` in constant time
    pub fn verify(&self, body: &[u8], signature_hex: &str) -> Result<(), SigningError> {
        let signature = hex::decode(signature_hex).map_err(|_| SigningError::MalformedSignature)?;
        if signature.len() != SIGNATURE_SIZE {
            return Err(SigningError::InvalidSignatureLength {
                expected: SIGNATURE_SIZE,
                actual: signature.len(),
            });
        }

        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(&signature)
            .map_err(|_| SigningError::VerificationFailed)
    }
}
