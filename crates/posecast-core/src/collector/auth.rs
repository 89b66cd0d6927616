//! Verification of signed reports on the receiving side

use std::fmt;

use crate::transport::{AUTH_SCHEME, RequestSigner};

/// Why a report was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization: HMAC <token>` header
    MissingHmac,
    /// A token was present but did not match the body
    InvalidHmac,
}

impl AuthRejection {
    /// Status string returned to the client
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthRejection::MissingHmac => "missing hmac",
            AuthRejection::InvalidHmac => "invalid hmac",
        }
    }

    /// HTTP status for the rejection
    pub fn status_code(&self) -> u16 {
        403
    }
}

impl fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for AuthRejection {}

/// Checks the `Authorization` header of incoming reports.
///
/// Without a signer every report is accepted.
#[derive(Debug, Clone, Default)]
pub struct ReportAuthenticator {
    signer: Option<RequestSigner>,
}

impl ReportAuthenticator {
    pub fn new(signer: Option<RequestSigner>) -> Self {
        Self { signer }
    }

    pub fn is_enforced(&self) -> bool {
        self.signer.is_some()
    }

    /// Accept or refuse a report given its raw body and `Authorization` header
    pub fn check(&self, authorization: Option<&str>, body: &[u8]) -> Result<(), AuthRejection> {
        let Some(signer) = &self.signer else {
            return Ok(());
        };

        let (scheme, token) = authorization
            .and_then(|value| value.split_once(' '))
            .unwrap_or_default();
        if !scheme.eq_ignore_ascii_case(AUTH_SCHEME) || token.is_empty() {
            return Err(AuthRejection::MissingHmac);
        }

        signer
            .verify(body, token)
            .map_err(|_| AuthRejection::InvalidHmac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enforced() -> (ReportAuthenticator, RequestSigner) {
        let signer = RequestSigner::new("abc").unwrap();
        (ReportAuthenticator::new(Some(signer.clone())), signer)
    }

    #[test]
    fn test_open_collector_accepts_anything() {
        let auth = ReportAuthenticator::default();
        assert!(!auth.is_enforced());
        assert_eq!(auth.check(None, b"{}"), Ok(()));
        assert_eq!(auth.check(Some("HMAC nonsense"), b"{}"), Ok(()));
    }

    #[test]
    fn test_valid_signature_accepted() {
        let (auth, signer) = enforced();
        let body = br#"{"position":{"x":0.0,"y":1.0,"z":0.0}}"#;
        let header = signer.authorization(body).unwrap();
        assert_eq!(auth.check(Some(&header), body), Ok(()));

        let lower = header.replacen("HMAC", "hmac", 1);
        assert_eq!(auth.check(Some(&lower), body), Ok(()));
    }

    #[test]
    fn test_missing_or_wrong_scheme() {
        let (auth, signer) = enforced();
        let token = signer.sign(b"{}").unwrap();

        assert_eq!(auth.check(None, b"{}"), Err(AuthRejection::MissingHmac));
        assert_eq!(auth.check(Some(""), b"{}"), Err(AuthRejection::MissingHmac));
        assert_eq!(auth.check(Some("HMAC "), b"{}"), Err(AuthRejection::MissingHmac));
        assert_eq!(
            auth.check(Some(&format!("Bearer {}", token)), b"{}"),
            Err(AuthRejection::MissingHmac)
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let (auth, signer) = enforced();
        let header = signer.authorization(b"{\"a\":1}").unwrap();
        assert_eq!(auth.check(Some(&header), b"{\"a\":2}"), Err(AuthRejection::InvalidHmac));
        assert_eq!(auth.check(Some("HMAC zz"), b"{}"), Err(AuthRejection::InvalidHmac));
    }

    #[test]
    fn test_rejection_strings() {
        assert_eq!(AuthRejection::MissingHmac.to_string(), "missing hmac");
        assert_eq!(AuthRejection::InvalidHmac.as_str(), "invalid hmac");
        assert_eq!(AuthRejection::InvalidHmac.status_code(), 403);
    }
}
