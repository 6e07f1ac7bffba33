// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Unsigned attribute validators (validation data and counter-signatures).

use cades_abstractions::asn1::{self, Tag, Tlv};
use cades_abstractions::{AttributeId, RawAttribute};

use super::{fields, ordered_context_fields, single_value, Building as _};
use crate::error::VerificationError;
use crate::registry::AttributeContext;

/// Each value must be a structurally complete SignerInfo.
pub fn counter_signature(_ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let id = raw.id();
    let values = raw.values().building(id)?;
    if values.is_empty() {
        return Err(VerificationError::build_failure(id, "attribute has no value"));
    }

    for value in values {
        let parts = fields(id, value, Tag::Sequence)?;
        if parts.len() < 5 {
            return Err(VerificationError::build_failure(id, "incomplete SignerInfo"));
        }
        parts[0].expect_tag(Tag::Integer).building(id)?;
    }
    Ok(())
}

/// `CompleteCertificateRefs ::= SEQUENCE OF OtherCertID`.
pub fn certificate_refs(_ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let id = raw.id();
    for cert_id in fields(id, single_value(raw)?, Tag::Sequence)? {
        let parts = fields(id, cert_id, Tag::Sequence)?;
        let hash = parts
            .first()
            .ok_or_else(|| VerificationError::build_failure(id, "empty OtherCertID"))?;
        check_other_hash(id, *hash)?;
    }
    Ok(())
}

/// `OtherHash ::= CHOICE { sha1Hash OCTET STRING, otherHash OtherHashAlgAndValue }`.
fn check_other_hash(id: &AttributeId, hash: Tlv<'_>) -> Result<(), VerificationError> {
    match hash.tag {
        Tag::OctetString if hash.value.len() == 20 => Ok(()),
        Tag::OctetString => Err(VerificationError::invalid(id, "SHA-1 reference hash must be 20 bytes")),
        Tag::Sequence => {
            let parts = fields(id, hash, Tag::Sequence)?;
            let [algorithm, value] = parts.as_slice() else {
                return Err(VerificationError::build_failure(id, "malformed OtherHashAlgAndValue"));
            };
            fields(id, *algorithm, Tag::Sequence)?;
            value.expect_tag(Tag::OctetString).building(id)?;
            Ok(())
        }
        found => Err(VerificationError::build_failure(
            id,
            format!("unexpected OtherHash tag {found}"),
        )),
    }
}

/// `CompleteRevocationRefs ::= SEQUENCE OF CrlOcspRef`, each holding optional `[0] [1] [2]` fields.
pub fn revocation_refs(_ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let id = raw.id();
    for reference in fields(id, single_value(raw)?, Tag::Sequence)? {
        let parts = fields(id, reference, Tag::Sequence)?;
        ordered_context_fields(
            id,
            &parts,
            &[asn1::context_tag(0), asn1::context_tag(1), asn1::context_tag(2)],
        )?;
    }
    Ok(())
}

/// `CertificateValues ::= SEQUENCE OF Certificate`.
pub fn cert_values(_ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let id = raw.id();
    for certificate in fields(id, single_value(raw)?, Tag::Sequence)? {
        cades_x509::parse_certificate(certificate.raw)
            .map_err(|e| VerificationError::invalid(id, e.to_string()))?;
    }
    Ok(())
}

/// `RevocationValues` and Adobe `RevocationInfoArchival`: a SEQUENCE of optional `[0] [1] [2]` fields.
pub fn revocation_values(_ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let parts = fields(raw.id(), single_value(raw)?, Tag::Sequence)?;
    ordered_context_fields(
        raw.id(),
        &parts,
        &[asn1::context_tag(0), asn1::context_tag(1), asn1::context_tag(2)],
    )
}
