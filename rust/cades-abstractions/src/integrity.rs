// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cryptographic signature check capability.

use crate::policy::AlgorithmPair;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("signature algorithm {signature_algorithm} implies a digest other than {digest_algorithm}")]
    AlgorithmMismatch {
        digest_algorithm: String,
        signature_algorithm: String,
    },
    #[error("invalid signer key: {0}")]
    InvalidKey(String),
    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),
    #[error("signature verification failed")]
    SignatureMismatch,
}

/// Verifies a signature value over `signed_bytes` with the key of `signer_certificate`.
pub trait IntegrityVerifier: Send + Sync {
    fn verify(
        &self,
        signer_certificate: &[u8],
        algorithm: &AlgorithmPair,
        signed_bytes: &[u8],
        signature: &[u8],
    ) -> Result<(), IntegrityError>;
}
