// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signed attribute validators.

use cades_abstractions::asn1::{self, Error as DerError, Tag, Tlv};
use cades_abstractions::{oids, AttributeId, RawAttribute};

use super::{fields, ordered_context_fields, single_value, Building as _};
use crate::error::VerificationError;
use crate::hash_chain::digest;
use crate::registry::AttributeContext;

pub fn content_type(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let oid = single_value(raw)?.oid().building(raw.id())?;
    match ctx.signature.content_type() {
        Some(expected) if expected != oid => Err(VerificationError::invalid(
            raw.id(),
            format!("content type {oid} does not match the encapsulated content type {expected}"),
        )),
        _ => Ok(()),
    }
}

pub fn message_digest(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let value = single_value(raw)?.expect_tag(Tag::OctetString).building(raw.id())?;
    let content = ctx.content_bytes().ok_or(VerificationError::MissingDetachedContent)?;
    let expected = digest(ctx.signature.digest_algorithm(), content)?;
    if value.value != expected.as_slice() {
        return Err(VerificationError::invalid(
            raw.id(),
            "message digest does not match the signed content",
        ));
    }
    Ok(())
}

pub fn signing_time(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let time = single_value(raw)?.time().building(raw.id())?;
    let reference = ctx.time.main_time_reference();
    if time > reference {
        return Err(VerificationError::invalid(
            raw.id(),
            format!("signing time {time} is after the time reference {reference}"),
        ));
    }
    Ok(())
}

pub fn signing_certificate(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    check_signing_certificate(ctx, raw, false)
}

pub fn signing_certificate_v2(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    check_signing_certificate(ctx, raw, true)
}

/// `SigningCertificate(V2) ::= SEQUENCE { certs SEQUENCE OF ESSCertID(v2), policies ... OPTIONAL }`.
/// The first ESSCertID identifies the signer certificate.
fn check_signing_certificate(
    ctx: &AttributeContext<'_>,
    raw: &RawAttribute,
    v2: bool,
) -> Result<(), VerificationError> {
    let id = raw.id();
    let outer = fields(id, single_value(raw)?, Tag::Sequence)?;
    let certs = outer
        .first()
        .ok_or_else(|| VerificationError::build_failure(id, "missing certs"))?;
    let cert_ids = fields(id, *certs, Tag::Sequence)?;
    let first = cert_ids
        .first()
        .ok_or_else(|| VerificationError::build_failure(id, "no certificate identifier"))?;
    let parts = fields(id, *first, Tag::Sequence)?;

    let mut rest = parts.as_slice();
    let algorithm = match rest.first() {
        Some(alg) if v2 && alg.tag == Tag::Sequence => {
            let oid = fields(id, *alg, Tag::Sequence)?
                .first()
                .ok_or_else(|| VerificationError::build_failure(id, "empty hash algorithm"))?
                .oid()
                .building(id)?;
            rest = &rest[1..];
            oid
        }
        _ if v2 => oids::SHA256.to_string(),
        _ => oids::SHA1.to_string(),
    };

    let cert_hash = rest
        .first()
        .ok_or_else(|| VerificationError::build_failure(id, "missing certHash"))?
        .expect_tag(Tag::OctetString)
        .building(id)?;

    let signer = ctx
        .signature
        .signer_certificate()
        .ok_or_else(|| VerificationError::invalid(id, "signer certificate is not available"))?;

    if cert_hash.value != digest(&algorithm, signer)?.as_slice() {
        return Err(VerificationError::invalid(
            id,
            "certificate hash does not match the signer certificate",
        ));
    }

    match rest.get(1) {
        Some(issuer_serial) => check_issuer_serial(id, *issuer_serial, signer),
        None => Ok(()),
    }
}

/// `IssuerSerial ::= SEQUENCE { issuer GeneralNames, serialNumber CertificateSerialNumber }`.
fn check_issuer_serial(id: &AttributeId, issuer_serial: Tlv<'_>, signer: &[u8]) -> Result<(), VerificationError> {
    let cert = cades_x509::parse_certificate(signer).map_err(|e| VerificationError::invalid(id, e.to_string()))?;
    let parts = fields(id, issuer_serial, Tag::Sequence)?;
    let [general_names, serial, ..] = parts.as_slice() else {
        return Err(VerificationError::build_failure(id, "incomplete issuerSerial"));
    };

    let serial = serial.expect_tag(Tag::Integer).building(id)?;
    if serial.value != cert.serial.as_slice() {
        return Err(VerificationError::invalid(
            id,
            "issuer serial number does not match the signer certificate",
        ));
    }

    let names = fields(id, *general_names, Tag::Sequence)?;
    let directory_name = names
        .iter()
        .find(|name| name.tag == asn1::context_tag(4))
        .ok_or_else(|| VerificationError::invalid(id, "issuer has no directory name"))?;
    let issuer = asn1::read_single(directory_name.value).building(id)?;

    compare_names(id, issuer.raw, &cert.issuer_raw)
}

fn compare_names(id: &AttributeId, found: &[u8], expected: &[u8]) -> Result<(), VerificationError> {
    if found == expected {
        return Ok(());
    }

    let mut found_rdns = relative_names(found).building(id)?;
    let mut expected_rdns = relative_names(expected).building(id)?;
    found_rdns.sort();
    expected_rdns.sort();

    if found_rdns == expected_rdns {
        Err(VerificationError::DistinguishedNameOrder(format!(
            "issuer in {id} lists the signer issuer RDNs in a different order"
        )))
    } else {
        Err(VerificationError::invalid(
            id,
            "issuer name does not match the signer certificate",
        ))
    }
}

fn relative_names(name: &[u8]) -> Result<Vec<Vec<u8>>, DerError> {
    let name = asn1::read_single(name)?.expect_tag(Tag::Sequence)?;
    Ok(name.children()?.iter().map(|rdn| rdn.raw.to_vec()).collect())
}

/// `SignaturePolicyIdentifier ::= CHOICE { signaturePolicyId SignaturePolicyId, signaturePolicyImplied NULL }`.
pub fn signature_policy_identifier(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let id = raw.id();
    let value = single_value(raw)?;
    if value.tag == Tag::Null {
        return Ok(());
    }

    let parts = fields(id, value, Tag::Sequence)?;
    let found = parts
        .first()
        .ok_or_else(|| VerificationError::build_failure(id, "missing sigPolicyId"))?
        .oid()
        .building(id)?;
    if parts.len() < 2 {
        return Err(VerificationError::build_failure(id, "missing sigPolicyHash"));
    }

    match ctx.policy.policy_identifier() {
        Some(expected) if expected != found => Err(VerificationError::InvalidPolicyIdentifier {
            expected: expected.to_string(),
            found,
        }),
        _ => Ok(()),
    }
}

/// `SignerLocation ::= SEQUENCE { countryName [0], localityName [1], postalAddress [2] }`, all optional.
pub fn signer_location(_ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let parts = fields(raw.id(), single_value(raw)?, Tag::Sequence)?;
    ordered_context_fields(
        raw.id(),
        &parts,
        &[asn1::context_tag(0), asn1::context_tag(1), asn1::context_tag(2)],
    )
}

pub fn signer_attributes(_ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    fields(raw.id(), single_value(raw)?, Tag::Sequence)?;
    Err(VerificationError::AttributeNotValidated {
        id: raw.id().clone(),
        message: "signer attributes structure is not validated".to_string(),
    })
}

/// `ContentHints ::= SEQUENCE { contentDescription UTF8String OPTIONAL, contentType ContentType }`.
pub fn content_hint(_ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let id = raw.id();
    let parts = fields(id, single_value(raw)?, Tag::Sequence)?;
    match parts.as_slice() {
        [content_type] => content_type.oid().building(id).map(|_| ()),
        [description, content_type] => {
            description.expect_tag(Tag::Utf8String).building(id)?;
            content_type.oid().building(id).map(|_| ())
        }
        _ => Err(VerificationError::build_failure(id, "unexpected ContentHints layout")),
    }
}
