// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signature report populated by [`crate::SignatureVerifier::verify`].

use cades_abstractions::{AttributeId, CertVerdict, CertificateInclusion, ContentMode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::validation_result::ValidationResult;
use crate::verifier::SignatureVerifier;

/// Outcome of one validated attribute occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttribReport {
    /// Display name from the registry.
    pub name: String,
    pub identifier: AttributeId,
    pub error: bool,
    pub error_message: Option<String>,
    pub warning_message: Option<String>,
}

impl AttribReport {
    pub fn passed(name: impl Into<String>, identifier: AttributeId) -> Self {
        Self {
            name: name.into(),
            identifier,
            error: false,
            error_message: None,
            warning_message: None,
        }
    }

    pub fn failed(name: impl Into<String>, identifier: AttributeId, message: impl Into<String>) -> Self {
        Self {
            error: true,
            error_message: Some(message.into()),
            ..Self::passed(name, identifier)
        }
    }

    pub fn warned(name: impl Into<String>, identifier: AttributeId, message: impl Into<String>) -> Self {
        Self {
            warning_message: Some(message.into()),
            ..Self::passed(name, identifier)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeStampReport {
    pub name: String,
    pub identifier: AttributeId,
    /// Time carried by the token, when it could be decoded.
    pub time_reference: Option<DateTime<Utc>>,
    pub valid: bool,
    pub cert_path_expired: bool,
    pub message: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum SignatureValidity {
    Valid,
    /// The signature itself is sound but a verdict could not be reached.
    Indeterminate,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureReport {
    pub signer_subject: String,
    pub content_mode: ContentMode,
    /// Display names of the mandated signed attributes.
    pub required_rules: Vec<String>,
    pub certificate_inclusion: CertificateInclusion,
    pub contains_mandated_certificates: bool,
    pub cert_path_state: Option<CertVerdict>,
    pub cert_path_message: Option<String>,
    /// The message digest matches the content.
    pub hash: bool,
    /// The signature value verifies under the signer key.
    pub asymmetric_cipher: bool,
    /// The signature policy identifier matches the policy.
    pub pa_oid_valid: bool,
    pub required: Vec<AttribReport>,
    pub optional: Vec<AttribReport>,
    pub timestamps: Vec<TimeStampReport>,
    pub has_one_valid_timestamp: bool,
    pub has_one_expired_timestamp: bool,
    pub has_one_invalid_timestamp: bool,
    /// Main time reference the verdict was reached at.
    pub time_reference: Option<DateTime<Utc>>,
    pub stages: Vec<ValidationResult>,
    pub error_messages: Vec<String>,
    pub warning_messages: Vec<String>,
    pub valid: bool,
}

impl Default for SignatureReport {
    fn default() -> Self {
        Self {
            signer_subject: Self::UNKNOWN_SIGNER.to_string(),
            content_mode: ContentMode::Attached,
            required_rules: Vec::new(),
            certificate_inclusion: CertificateInclusion::None,
            contains_mandated_certificates: false,
            cert_path_state: None,
            cert_path_message: None,
            hash: false,
            asymmetric_cipher: false,
            pa_oid_valid: true,
            required: Vec::new(),
            optional: Vec::new(),
            timestamps: Vec::new(),
            has_one_valid_timestamp: false,
            has_one_expired_timestamp: false,
            has_one_invalid_timestamp: false,
            time_reference: None,
            stages: Vec::new(),
            error_messages: Vec::new(),
            warning_messages: Vec::new(),
            valid: false,
        }
    }
}

impl SignatureReport {
    pub const UNKNOWN_SIGNER: &'static str = "unknown signer";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self, stage_name: &str) -> Option<&ValidationResult> {
        self.stages.iter().find(|s| s.stage_name == stage_name)
    }

    /// Three-way verdict.
    ///
    /// A broken signature value, message digest or policy reference is `Invalid`. A
    /// signature that only failed on its certification path is `Indeterminate`, as is
    /// one whose time-stamps failed only because their authority paths expired.
    pub fn validity(&self) -> SignatureValidity {
        if self.valid {
            return SignatureValidity::Valid;
        }
        if !self.asymmetric_cipher || !self.hash || !self.pa_oid_valid {
            return SignatureValidity::Invalid;
        }

        let failing: Vec<&str> = self
            .stages
            .iter()
            .filter(|s| !s.is_valid)
            .map(|s| s.stage_name.as_str())
            .collect();

        let path_only = failing
            .iter()
            .all(|stage| *stage == SignatureVerifier::STAGE_NAME_CERTIFICATION_PATH);
        let expired_timestamps_only = self.has_one_expired_timestamp
            && !self.has_one_invalid_timestamp
            && failing.iter().all(|stage| {
                *stage == SignatureVerifier::STAGE_NAME_TIMESTAMPS
                    || *stage == SignatureVerifier::STAGE_NAME_CERTIFICATION_PATH
            });

        if path_only || expired_timestamps_only {
            SignatureValidity::Indeterminate
        } else {
            SignatureValidity::Invalid
        }
    }
}
