// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Verification error taxonomy.
//!
//! Every finding produced by the engine is a [`VerificationError`]. Callers classify
//! findings with [`VerificationError::kind`] rather than by inspecting messages.

use std::fmt;

use cades_abstractions::asn1::Error as DerError;
use cades_abstractions::{AttributeId, AttributeViewError, CertVerdict};
use serde::Serialize;

/// Which half of the SignerInfo an attribute belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum AttributeScope {
    Signed,
    Unsigned,
}

impl fmt::Display for AttributeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signed => f.write_str("signed"),
            Self::Unsigned => f.write_str("unsigned"),
        }
    }
}

/// The policy constraint a violation refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum PolicyConstraint {
    ContentMode,
    KeyLength,
    SigningPeriod,
    Algorithm,
    CertificateInclusion,
}

impl fmt::Display for PolicyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ContentMode => "content mode",
            Self::KeyLength => "key length",
            Self::SigningPeriod => "signing period",
            Self::Algorithm => "algorithm",
            Self::CertificateInclusion => "certificate inclusion",
        };
        f.write_str(name)
    }
}

/// Fieldless discriminant of [`VerificationError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnknownAttribute,
    AttributeNotFound,
    AttributeBuildFailure,
    InvalidAttribute,
    AttributeNotValidated,
    MissingMandatedAttribute,
    MissingRequiredAttribute,
    MissingDetachedContent,
    IntegrityFailure,
    TimestampInvalid,
    PolicyConstraintViolation,
    InvalidPolicyIdentifier,
    DistinguishedNameOrder,
    CertificationPathFailure,
    IndeterminateValidation,
    UnsupportedDigestAlgorithm,
    Malformed,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::UnknownAttribute => "UNKNOWN_ATTRIBUTE",
            Self::AttributeNotFound => "ATTRIBUTE_NOT_FOUND",
            Self::AttributeBuildFailure => "ATTRIBUTE_BUILD_FAILURE",
            Self::InvalidAttribute => "INVALID_ATTRIBUTE",
            Self::AttributeNotValidated => "ATTRIBUTE_NOT_VALIDATED",
            Self::MissingMandatedAttribute => "MISSING_MANDATED_ATTRIBUTE",
            Self::MissingRequiredAttribute => "MISSING_REQUIRED_ATTRIBUTE",
            Self::MissingDetachedContent => "MISSING_DETACHED_CONTENT",
            Self::IntegrityFailure => "INTEGRITY_FAILURE",
            Self::TimestampInvalid => "TIMESTAMP_INVALID",
            Self::PolicyConstraintViolation => "POLICY_CONSTRAINT_VIOLATION",
            Self::InvalidPolicyIdentifier => "INVALID_POLICY_IDENTIFIER",
            Self::DistinguishedNameOrder => "DISTINGUISHED_NAME_ORDER",
            Self::CertificationPathFailure => "CERTIFICATION_PATH_FAILURE",
            Self::IndeterminateValidation => "INDETERMINATE_VALIDATION",
            Self::UnsupportedDigestAlgorithm => "UNSUPPORTED_DIGEST_ALGORITHM",
            Self::Malformed => "MALFORMED",
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VerificationError {
    /// No validator is registered for the identifier.
    #[error("unknown attribute {id}")]
    UnknownAttribute { id: AttributeId },

    #[error("attribute {id} occurrence {index} not found")]
    AttributeNotFound { id: AttributeId, index: usize },

    /// The attribute value could not be decoded into its expected structure.
    #[error("could not build attribute {id}: {cause}")]
    AttributeBuildFailure { id: AttributeId, cause: String },

    /// The attribute decoded but its content is not acceptable.
    #[error("attribute {id} is invalid: {message}")]
    InvalidAttribute { id: AttributeId, message: String },

    /// The attribute is present but its content is not checked. Always a warning.
    #[error("attribute {id} was not validated: {message}")]
    AttributeNotValidated { id: AttributeId, message: String },

    #[error("mandated {scope} attribute {id} is missing")]
    MissingMandatedAttribute { id: AttributeId, scope: AttributeScope },

    /// An attribute needed to rebuild an LTV hash is absent.
    #[error("required attribute {id} is missing")]
    MissingRequiredAttribute { id: AttributeId },

    #[error("detached content was not supplied")]
    MissingDetachedContent,

    #[error("signature integrity check failed: {0}")]
    IntegrityFailure(String),

    #[error("time-stamp {id} is invalid: {message}")]
    TimestampInvalid {
        id: AttributeId,
        message: String,
        /// The only problem is an expired certification path of the time-stamping authority.
        cert_path_expired: bool,
    },

    #[error("policy {constraint} constraint violated: {message}")]
    PolicyConstraintViolation { constraint: PolicyConstraint, message: String },

    #[error("signature policy identifier {found} does not match policy {expected}")]
    InvalidPolicyIdentifier { expected: String, found: String },

    /// Names match except for the order of their relative distinguished names. Always a warning.
    #[error("distinguished name order differs: {0}")]
    DistinguishedNameOrder(String),

    #[error("certification path is {verdict:?}: {message}")]
    CertificationPathFailure { verdict: CertVerdict, message: String },

    /// A collaborator could not reach a verdict (cancelled, timed out, failed).
    #[error("validation is indeterminate: {0}")]
    IndeterminateValidation(String),

    #[error("unsupported digest algorithm {0}")]
    UnsupportedDigestAlgorithm(String),

    #[error("malformed structure: {0}")]
    Malformed(String),
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownAttribute { .. } => ErrorKind::UnknownAttribute,
            Self::AttributeNotFound { .. } => ErrorKind::AttributeNotFound,
            Self::AttributeBuildFailure { .. } => ErrorKind::AttributeBuildFailure,
            Self::InvalidAttribute { .. } => ErrorKind::InvalidAttribute,
            Self::AttributeNotValidated { .. } => ErrorKind::AttributeNotValidated,
            Self::MissingMandatedAttribute { .. } => ErrorKind::MissingMandatedAttribute,
            Self::MissingRequiredAttribute { .. } => ErrorKind::MissingRequiredAttribute,
            Self::MissingDetachedContent => ErrorKind::MissingDetachedContent,
            Self::IntegrityFailure(_) => ErrorKind::IntegrityFailure,
            Self::TimestampInvalid { .. } => ErrorKind::TimestampInvalid,
            Self::PolicyConstraintViolation { .. } => ErrorKind::PolicyConstraintViolation,
            Self::InvalidPolicyIdentifier { .. } => ErrorKind::InvalidPolicyIdentifier,
            Self::DistinguishedNameOrder(_) => ErrorKind::DistinguishedNameOrder,
            Self::CertificationPathFailure { .. } => ErrorKind::CertificationPathFailure,
            Self::IndeterminateValidation(_) => ErrorKind::IndeterminateValidation,
            Self::UnsupportedDigestAlgorithm(_) => ErrorKind::UnsupportedDigestAlgorithm,
            Self::Malformed(_) => ErrorKind::Malformed,
        }
    }

    /// Findings that are reported but never count against the verdict.
    pub fn is_advisory(&self) -> bool {
        matches!(
            self,
            Self::AttributeNotValidated { .. } | Self::DistinguishedNameOrder(_)
        )
    }

    pub(crate) fn build_failure(id: &AttributeId, cause: impl fmt::Display) -> Self {
        Self::AttributeBuildFailure {
            id: id.clone(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn invalid(id: &AttributeId, message: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            id: id.clone(),
            message: message.into(),
        }
    }
}

impl From<DerError> for VerificationError {
    fn from(value: DerError) -> Self {
        Self::Malformed(value.to_string())
    }
}

impl From<AttributeViewError> for VerificationError {
    fn from(value: AttributeViewError) -> Self {
        match value {
            AttributeViewError::NotFound { id, index } => Self::AttributeNotFound { id, index },
            AttributeViewError::Malformed(message) => Self::Malformed(message),
        }
    }
}
