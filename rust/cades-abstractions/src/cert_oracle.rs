// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Certification path and revocation oracle.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::policy::RevocationRequirement;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CertVerdict {
    Valid,
    Expired,
    Revoked,
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertValidationResult {
    pub verdict: CertVerdict,
    /// Human-readable explanation.
    pub message: String,
    /// Set when the oracle found the certificate revoked.
    pub revocation_time: Option<DateTime<Utc>>,
    /// Certificates (DER) of the path that was built, signer first.
    pub certification_path: Vec<Vec<u8>>,
}

impl CertValidationResult {
    pub fn valid(certification_path: Vec<Vec<u8>>) -> Self {
        Self {
            verdict: CertVerdict::Valid,
            message: "Certification path is valid".to_string(),
            revocation_time: None,
            certification_path,
        }
    }

    pub fn revoked(revocation_time: DateTime<Utc>, certification_path: Vec<Vec<u8>>) -> Self {
        Self {
            verdict: CertVerdict::Revoked,
            message: format!("Certificate revoked at {revocation_time}"),
            revocation_time: Some(revocation_time),
            certification_path,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CertOracleError {
    #[error("certificate validation was cancelled")]
    Cancelled,
    #[error("certificate validation timed out after {0:?}")]
    Timeout(Duration),
    #[error("certificate validation failed: {0}")]
    Failed(String),
}

/// Builds a certification path and checks revocation as of a point in time.
///
/// Implementations may block on path building or revocation lookups; cancellation
/// and timeouts must be reported through [`CertOracleError`], never by hanging.
pub trait CertOracle: Send + Sync {
    fn validate(
        &self,
        certificate: &[u8],
        trust_anchors: &[Vec<u8>],
        revocation: RevocationRequirement,
        time_reference: DateTime<Utc>,
    ) -> Result<CertValidationResult, CertOracleError>;
}
