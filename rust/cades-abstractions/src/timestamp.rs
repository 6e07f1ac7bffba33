// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time-stamp token decoding and verification interface (RFC 3161 tokens).

use chrono::{DateTime, Utc};

/// The parts of a token's TSTInfo the engine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampTokenInfo {
    pub gen_time: DateTime<Utc>,
    /// Message imprint hash algorithm OID.
    pub imprint_algorithm: String,
    pub imprint: Vec<u8>,
    /// Subject of the time-stamping authority, when known.
    pub authority: Option<String>,
}

/// Outcome of checking the token signature and its authority's certification path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerification {
    Valid,
    /// The token is sound but the authority's certification path has expired.
    CertPathExpired { message: String },
    Invalid { message: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeStampTokenError {
    #[error("malformed time-stamp token: {0}")]
    Malformed(String),
    #[error("time-stamp verification was cancelled")]
    Cancelled,
    #[error("time-stamp verification failed: {0}")]
    Failed(String),
}

pub trait TimeStampTokenVerifier: Send + Sync {
    /// Decodes the TSTInfo of a token (`ContentInfo` DER).
    fn decode(&self, token: &[u8]) -> Result<TimeStampTokenInfo, TimeStampTokenError>;

    /// Verifies the token signature and authority path as of `at`.
    fn verify(&self, token: &[u8], at: DateTime<Utc>) -> Result<TokenVerification, TimeStampTokenError>;
}
