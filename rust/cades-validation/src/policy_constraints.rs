// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signature policy constraint checks.
//!
//! Checks never fail: every finding is returned, an empty list means compliant.

use cades_abstractions::{
    AttributeView, CertificateInclusion, ContentMode, ContentModeRequirement, IntegrityVerifier, PolicyConstraintSet,
};
use chrono::{DateTime, Utc};

use crate::error::{PolicyConstraint, VerificationError};
use crate::integrity::signed_bytes;

fn violation(constraint: PolicyConstraint, message: impl Into<String>) -> VerificationError {
    VerificationError::PolicyConstraintViolation {
        constraint,
        message: message.into(),
    }
}

pub struct PolicyConstraintChecker<'a> {
    integrity: &'a dyn IntegrityVerifier,
    external_content: Option<&'a [u8]>,
}

impl<'a> PolicyConstraintChecker<'a> {
    pub fn new(integrity: &'a dyn IntegrityVerifier, external_content: Option<&'a [u8]>) -> Self {
        Self {
            integrity,
            external_content,
        }
    }

    /// Content mode, key length, signing period and algorithm constraints, evaluated at `time`.
    pub fn check(
        &self,
        constraints: &PolicyConstraintSet,
        signature: &dyn AttributeView,
        certificate: Option<&[u8]>,
        time: DateTime<Utc>,
    ) -> Vec<VerificationError> {
        let mut errors = Vec::new();
        errors.extend(check_content_mode(constraints.content_mode, signature.content_mode()));
        errors.extend(check_key_length(constraints, signature));
        errors.extend(check_signing_period(constraints, time));
        errors.extend(self.check_algorithms(constraints, signature, certificate));
        errors
    }

    fn check_algorithms(
        &self,
        constraints: &PolicyConstraintSet,
        signature: &dyn AttributeView,
        certificate: Option<&[u8]>,
    ) -> Option<VerificationError> {
        if constraints.accepted_algorithms.is_empty() {
            return None;
        }

        let Some(certificate) = certificate else {
            return Some(violation(
                PolicyConstraint::Algorithm,
                "signer certificate is not available",
            ));
        };
        let signed = match signed_bytes(signature, self.external_content) {
            Ok(signed) => signed,
            Err(e) => return Some(violation(PolicyConstraint::Algorithm, e.to_string())),
        };

        let accepted = constraints.accepted_algorithms.iter().any(|pair| {
            self.integrity
                .verify(certificate, pair, &signed, signature.signature_value())
                .is_ok()
        });

        (!accepted).then(|| {
            violation(
                PolicyConstraint::Algorithm,
                format!(
                    "signature does not verify under any accepted algorithm (digest {}, signature {})",
                    signature.digest_algorithm(),
                    signature.signature_algorithm()
                ),
            )
        })
    }
}

fn check_content_mode(requirement: ContentModeRequirement, actual: ContentMode) -> Option<VerificationError> {
    let compliant = match requirement {
        ContentModeRequirement::Either => true,
        ContentModeRequirement::External => actual == ContentMode::Detached,
        ContentModeRequirement::Internal => actual == ContentMode::Attached,
    };
    (!compliant).then(|| {
        violation(
            PolicyConstraint::ContentMode,
            format!("policy requires {requirement:?} content but the signature is {actual:?}"),
        )
    })
}

/// Applies to RSA signatures, whose value length equals the modulus length.
fn check_key_length(constraints: &PolicyConstraintSet, signature: &dyn AttributeView) -> Vec<VerificationError> {
    let algorithm = signature.signature_algorithm();
    if !cades_x509::is_rsa_signature_algorithm(algorithm) {
        return Vec::new();
    }

    let bits = signature.signature_value().len() * 8;
    constraints
        .min_key_lengths
        .iter()
        .filter(|min| min.algorithm.as_deref().map_or(true, |a| a == algorithm))
        .filter(|min| bits < min.bits as usize)
        .map(|min| {
            violation(
                PolicyConstraint::KeyLength,
                format!("key length {bits} is below the policy minimum of {}", min.bits),
            )
        })
        .collect()
}

fn check_signing_period(constraints: &PolicyConstraintSet, time: DateTime<Utc>) -> Option<VerificationError> {
    match constraints.signing_period {
        None => Some(violation(
            PolicyConstraint::SigningPeriod,
            "policy defines no signing period",
        )),
        Some(period) if !period.contains(time) => Some(violation(
            PolicyConstraint::SigningPeriod,
            format!("time reference {time} is outside the signing period"),
        )),
        Some(_) => None,
    }
}

/// Compares the certificates embedded in the signature with the inclusion requirement.
pub fn check_certificate_inclusion(
    requirement: CertificateInclusion,
    embedded: &[Vec<u8>],
    signer: Option<&[u8]>,
    certification_path: &[Vec<u8>],
) -> Vec<VerificationError> {
    let message = match requirement {
        CertificateInclusion::None => return Vec::new(),
        CertificateInclusion::SignerOnly => match (embedded, signer) {
            ([only], Some(signer)) if cades_x509::same_certificate(only, signer) => return Vec::new(),
            (_, None) => "signer certificate is not available".to_string(),
            _ => format!(
                "policy requires only the signer certificate, found {} certificate(s)",
                embedded.len()
            ),
        },
        CertificateInclusion::FullPath => {
            if certification_path.is_empty() {
                "no certification path is available to compare".to_string()
            } else if embedded.len() == certification_path.len()
                && certification_path
                    .iter()
                    .all(|cert| embedded.iter().any(|e| cades_x509::same_certificate(e, cert)))
            {
                return Vec::new();
            } else {
                format!(
                    "policy requires the full certification path ({} certificate(s)), found {}",
                    certification_path.len(),
                    embedded.len()
                )
            }
        }
    };

    vec![violation(PolicyConstraint::CertificateInclusion, message)]
}
