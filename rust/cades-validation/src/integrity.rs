// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signature value and message digest checks.

use cades_abstractions::asn1::Tag;
use cades_abstractions::{oids, AlgorithmPair, AttributeId, AttributeView, IntegrityVerifier, SignedContent};
use tracing::debug;

use crate::error::VerificationError;
use crate::hash_chain::digest;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityOutcome {
    /// The message digest matches the content.
    pub hash: bool,
    /// The signature value verifies under the signer key.
    pub asymmetric_cipher: bool,
    pub errors: Vec<VerificationError>,
}

impl IntegrityOutcome {
    pub fn is_verified(&self) -> bool {
        self.hash && self.asymmetric_cipher
    }
}

/// Signed content bytes, embedded or supplied out of band.
pub(crate) fn content_bytes<'a>(signature: &'a dyn AttributeView, external: Option<&'a [u8]>) -> Option<&'a [u8]> {
    match signature.content() {
        SignedContent::Embedded(bytes) => Some(bytes),
        SignedContent::External => external,
    }
}

/// Bytes the signature value was computed over: the DER `SET OF` signed attributes,
/// or the content itself when there are none.
pub(crate) fn signed_bytes(
    signature: &dyn AttributeView,
    external: Option<&[u8]>,
) -> Result<Vec<u8>, VerificationError> {
    match signature.signer_info_parts()?.signed_attrs {
        Some(mut signed_attrs) => {
            // Stored as [0] IMPLICIT; signed as an explicit SET OF.
            if let Some(tag) = signed_attrs.first_mut() {
                *tag = Tag::Set.octet();
            }
            Ok(signed_attrs)
        }
        None => content_bytes(signature, external)
            .map(<[u8]>::to_vec)
            .ok_or(VerificationError::MissingDetachedContent),
    }
}

/// Checks the message digest attribute against the content and the signature value
/// against the signer certificate.
pub fn check_integrity(
    signature: &dyn AttributeView,
    verifier: &dyn IntegrityVerifier,
    external: Option<&[u8]>,
) -> IntegrityOutcome {
    let mut outcome = IntegrityOutcome::default();

    match check_message_digest(signature, external) {
        Ok(()) => outcome.hash = true,
        Err(e) => outcome.errors.push(e),
    }

    match check_signature_value(signature, verifier, external) {
        Ok(()) => outcome.asymmetric_cipher = true,
        Err(e) => outcome.errors.push(e),
    }

    debug!(
        hash = outcome.hash,
        asymmetric_cipher = outcome.asymmetric_cipher,
        "integrity checked"
    );
    outcome
}

fn check_message_digest(signature: &dyn AttributeView, external: Option<&[u8]>) -> Result<(), VerificationError> {
    let content = content_bytes(signature, external).ok_or(VerificationError::MissingDetachedContent)?;

    let id = AttributeId::new(oids::MESSAGE_DIGEST);
    if signature.occurrence_count(&id) == 0 {
        // Without signed attributes the signature value covers the content directly.
        return match signature.signer_info_parts()?.signed_attrs {
            None => Ok(()),
            Some(_) => Err(VerificationError::IntegrityFailure(
                "signed attributes carry no message digest".to_string(),
            )),
        };
    }

    let raw = signature.raw_attribute(&id, 0)?;
    let values = raw.values()?;
    let stored = values
        .first()
        .ok_or_else(|| VerificationError::IntegrityFailure("message digest attribute has no value".to_string()))?
        .expect_tag(Tag::OctetString)?;

    if stored.value != digest(signature.digest_algorithm(), content)?.as_slice() {
        return Err(VerificationError::IntegrityFailure(
            "message digest does not match the content".to_string(),
        ));
    }
    Ok(())
}

fn check_signature_value(
    signature: &dyn AttributeView,
    verifier: &dyn IntegrityVerifier,
    external: Option<&[u8]>,
) -> Result<(), VerificationError> {
    let certificate = signature
        .signer_certificate()
        .ok_or_else(|| VerificationError::IntegrityFailure("signer certificate is not available".to_string()))?;
    let signed = signed_bytes(signature, external)?;
    let algorithm = AlgorithmPair::new(signature.digest_algorithm(), signature.signature_algorithm());

    verifier
        .verify(certificate, &algorithm, &signed, signature.signature_value())
        .map_err(|e| VerificationError::IntegrityFailure(e.to_string()))
}
