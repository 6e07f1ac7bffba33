// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read-only view over a decoded CMS signer.
//!
//! The verification engine never parses a container itself. A decoding layer
//! implements [`AttributeView`] and hands the engine attribute encodings exactly as
//! stored, plus the raw SignedData/SignerInfo fields needed to rebuild LTV hashes.
//! [`DecodedSignature`] is an in-memory implementation assembled from those parts.

use std::collections::HashSet;

use serde::Serialize;

use crate::asn1::{self, Error as DerError, Tag, Tlv};
use crate::identifiers::{oids, AttributeId};

/// One encoded attribute: `SEQUENCE { attrType OBJECT IDENTIFIER, attrValues SET OF ANY }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    id: AttributeId,
    /// Complete `Attribute` SEQUENCE.
    encoded: Vec<u8>,
    /// Offset of `attrValues` within `encoded`.
    values_at: usize,
    /// Offset of `attrType` within `encoded`.
    type_at: usize,
}

impl RawAttribute {
    /// Builds an attribute from its identifier and already-encoded values.
    pub fn new(id: impl Into<AttributeId>, values: &[Vec<u8>]) -> Result<Self, DerError> {
        let id = id.into();
        let attr_type = asn1::encode_oid(id.as_str())?;
        let attr_values = asn1::encode_constructed(Tag::Set, values.iter().map(Vec::as_slice))?;
        let encoded = asn1::encode_constructed(Tag::Sequence, [attr_type.as_slice(), attr_values.as_slice()])?;
        Self::from_der(&encoded)
    }

    /// Parses a complete `Attribute` SEQUENCE.
    pub fn from_der(encoded: &[u8]) -> Result<Self, DerError> {
        let seq = asn1::read_single(encoded)?.expect_tag(Tag::Sequence)?;
        let children = seq.children()?;
        let [attr_type, attr_values] = children.as_slice() else {
            return Err(der::ErrorKind::Length { tag: Tag::Sequence }.into());
        };
        let id = AttributeId::new(attr_type.oid()?);
        attr_values.expect_tag(Tag::Set)?;

        let values_at = encoded.len() - attr_values.raw.len();
        let type_at = values_at - attr_type.raw.len();
        Ok(Self {
            id,
            encoded: encoded.to_vec(),
            values_at,
            type_at,
        })
    }

    pub fn id(&self) -> &AttributeId {
        &self.id
    }

    /// Complete OBJECT IDENTIFIER element, as stored.
    pub fn attr_type(&self) -> &[u8] {
        &self.encoded[self.type_at..self.values_at]
    }

    /// Complete SET element holding the values, as stored.
    pub fn attr_values(&self) -> &[u8] {
        &self.encoded[self.values_at..]
    }

    /// The `attrValues` elements.
    pub fn values(&self) -> Result<Vec<Tlv<'_>>, DerError> {
        asn1::read_single(self.attr_values())?.children()
    }

    /// Complete `Attribute` SEQUENCE encoding.
    pub fn as_der(&self) -> &[u8] {
        &self.encoded
    }
}

/// Where the signed content lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedContent {
    /// Encapsulated in the SignedData.
    Embedded(Vec<u8>),
    /// Detached; the caller supplies the bytes out of band.
    External,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ContentMode {
    Attached,
    Detached,
}

/// Raw SignedData fields outside the signer info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDataParts {
    /// Complete `EncapsulatedContentInfo` SEQUENCE.
    pub encap_content_info: Vec<u8>,
    /// Complete `[0] certificates` field when present.
    pub certificates: Option<Vec<u8>>,
    /// Complete `[1] crls` field when present.
    pub crls: Option<Vec<u8>>,
}

/// Raw SignerInfo fields, each a complete element as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfoParts {
    pub version: Vec<u8>,
    pub sid: Vec<u8>,
    pub digest_algorithm: Vec<u8>,
    /// `[0] IMPLICIT SignedAttributes` when tagged as present.
    pub signed_attrs: Option<Vec<u8>>,
    pub signature_algorithm: Vec<u8>,
    /// The `signature` OCTET STRING element.
    pub signature: Vec<u8>,
    /// `[1] IMPLICIT UnsignedAttributes` when tagged as present.
    pub unsigned_attrs: Option<Vec<u8>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeViewError {
    #[error("attribute {id} occurrence {index} not found")]
    NotFound { id: AttributeId, index: usize },
    #[error("malformed signature structure: {0}")]
    Malformed(String),
}

impl From<DerError> for AttributeViewError {
    fn from(value: DerError) -> Self {
        Self::Malformed(value.to_string())
    }
}

/// Accessor over one decoded signer.
pub trait AttributeView {
    /// Distinct identifiers present (signed then unsigned), in first-declaration order.
    fn attribute_identifiers(&self) -> Vec<AttributeId>;

    /// Number of attributes carrying `id`.
    fn occurrence_count(&self, id: &AttributeId) -> usize;

    /// The `index`-th attribute carrying `id`.
    fn raw_attribute(&self, id: &AttributeId, index: usize) -> Result<RawAttribute, AttributeViewError>;

    /// Content octets of the SignerInfo `signature` field.
    fn signature_value(&self) -> &[u8];

    fn content(&self) -> &SignedContent;

    /// eContentType of the encapsulated content, when known.
    fn content_type(&self) -> Option<&str>;

    /// SignerInfo digest algorithm OID.
    fn digest_algorithm(&self) -> &str;

    /// SignerInfo signature algorithm OID.
    fn signature_algorithm(&self) -> &str;

    /// DER of the certificate identified by the signer identifier, if resolved.
    fn signer_certificate(&self) -> Option<&[u8]>;

    /// Certificates embedded in the SignedData, in stored order.
    fn certificates(&self) -> &[Vec<u8>];

    fn signed_data_parts(&self) -> Result<SignedDataParts, AttributeViewError>;

    fn signer_info_parts(&self) -> Result<SignerInfoParts, AttributeViewError>;

    fn content_mode(&self) -> ContentMode {
        match self.content() {
            SignedContent::Embedded(_) => ContentMode::Attached,
            SignedContent::External => ContentMode::Detached,
        }
    }
}

/// In-memory signer assembled from already-decoded parts.
#[derive(Debug, Clone)]
pub struct DecodedSignature {
    version: Vec<u8>,
    sid: Vec<u8>,
    digest_algorithm: String,
    signature_algorithm: String,
    signature_value: Vec<u8>,
    content: SignedContent,
    content_type: String,
    signed: Vec<RawAttribute>,
    unsigned: Vec<RawAttribute>,
    unsigned_tagged: bool,
    certificates: Vec<Vec<u8>>,
    crls: Vec<Vec<u8>>,
    signer_certificate: Option<Vec<u8>>,
}

impl DecodedSignature {
    pub fn new(signature_value: Vec<u8>) -> Self {
        Self {
            version: vec![Tag::Integer.octet(), 0x01, 0x01],
            // Empty subjectKeyIdentifier until the caller supplies the real signer identifier.
            sid: vec![asn1::context_primitive_tag(0).octet(), 0x00],
            digest_algorithm: oids::SHA256.to_string(),
            signature_algorithm: oids::ECDSA_WITH_SHA256.to_string(),
            signature_value,
            content: SignedContent::External,
            content_type: oids::ID_DATA.to_string(),
            signed: Vec::new(),
            unsigned: Vec::new(),
            unsigned_tagged: false,
            certificates: Vec::new(),
            crls: Vec::new(),
            signer_certificate: None,
        }
    }

    pub fn with_sid(mut self, sid: Vec<u8>) -> Self {
        self.sid = sid;
        self
    }

    pub fn with_digest_algorithm(mut self, oid: impl Into<String>) -> Self {
        self.digest_algorithm = oid.into();
        self
    }

    pub fn with_signature_algorithm(mut self, oid: impl Into<String>) -> Self {
        self.signature_algorithm = oid.into();
        self
    }

    pub fn with_content(mut self, content: SignedContent) -> Self {
        self.content = content;
        self
    }

    pub fn with_content_type(mut self, oid: impl Into<String>) -> Self {
        self.content_type = oid.into();
        self
    }

    pub fn with_signed_attribute(mut self, attribute: RawAttribute) -> Self {
        self.signed.push(attribute);
        self
    }

    pub fn with_unsigned_attribute(mut self, attribute: RawAttribute) -> Self {
        self.unsigned.push(attribute);
        self.unsigned_tagged = true;
        self
    }

    /// Marks the unsigned attributes field as present even when it holds no attribute.
    pub fn with_empty_unsigned_attributes(mut self) -> Self {
        self.unsigned_tagged = true;
        self
    }

    pub fn with_certificates(mut self, certificates: Vec<Vec<u8>>) -> Self {
        self.certificates = certificates;
        self
    }

    pub fn with_crls(mut self, crls: Vec<Vec<u8>>) -> Self {
        self.crls = crls;
        self
    }

    pub fn with_signer_certificate(mut self, certificate: Vec<u8>) -> Self {
        self.signer_certificate = Some(certificate);
        self
    }

    fn all_attributes(&self) -> impl Iterator<Item = &RawAttribute> {
        self.signed.iter().chain(self.unsigned.iter())
    }

    fn algorithm_identifier(oid: &str) -> Result<Vec<u8>, DerError> {
        asn1::encode_tlv(Tag::Sequence, &asn1::encode_oid(oid)?)
    }

    fn attribute_block(tag: Tag, attributes: &[RawAttribute]) -> Result<Vec<u8>, DerError> {
        asn1::encode_constructed(tag, attributes.iter().map(RawAttribute::as_der))
    }
}

impl AttributeView for DecodedSignature {
    fn attribute_identifiers(&self) -> Vec<AttributeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for attribute in self.all_attributes() {
            if seen.insert(attribute.id()) {
                out.push(attribute.id().clone());
            }
        }
        out
    }

    fn occurrence_count(&self, id: &AttributeId) -> usize {
        let id = AttributeId::new(id.as_str());
        self.all_attributes().filter(|a| *a.id() == id).count()
    }

    fn raw_attribute(&self, id: &AttributeId, index: usize) -> Result<RawAttribute, AttributeViewError> {
        let wanted = AttributeId::new(id.as_str());
        self.all_attributes()
            .filter(|a| *a.id() == wanted)
            .nth(index)
            .cloned()
            .ok_or(AttributeViewError::NotFound { id: wanted, index })
    }

    fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    fn content(&self) -> &SignedContent {
        &self.content
    }

    fn content_type(&self) -> Option<&str> {
        Some(&self.content_type)
    }

    fn digest_algorithm(&self) -> &str {
        &self.digest_algorithm
    }

    fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    fn signer_certificate(&self) -> Option<&[u8]> {
        self.signer_certificate.as_deref()
    }

    fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    fn signed_data_parts(&self) -> Result<SignedDataParts, AttributeViewError> {
        let content_type = asn1::encode_oid(&self.content_type)?;
        let encap_content_info = match &self.content {
            SignedContent::Embedded(bytes) => {
                let explicit = asn1::encode_tlv(asn1::context_tag(0), &asn1::encode_octet_string(bytes)?)?;
                asn1::encode_constructed(Tag::Sequence, [content_type.as_slice(), explicit.as_slice()])?
            }
            SignedContent::External => asn1::encode_tlv(Tag::Sequence, &content_type)?,
        };

        let certificates = (!self.certificates.is_empty())
            .then(|| asn1::encode_constructed(asn1::context_tag(0), self.certificates.iter().map(Vec::as_slice)))
            .transpose()?;
        let crls = (!self.crls.is_empty())
            .then(|| asn1::encode_constructed(asn1::context_tag(1), self.crls.iter().map(Vec::as_slice)))
            .transpose()?;

        Ok(SignedDataParts {
            encap_content_info,
            certificates,
            crls,
        })
    }

    fn signer_info_parts(&self) -> Result<SignerInfoParts, AttributeViewError> {
        let signed_attrs = (!self.signed.is_empty())
            .then(|| Self::attribute_block(asn1::context_tag(0), &self.signed))
            .transpose()?;
        let unsigned_attrs = self
            .unsigned_tagged
            .then(|| Self::attribute_block(asn1::context_tag(1), &self.unsigned))
            .transpose()?;

        Ok(SignerInfoParts {
            version: self.version.clone(),
            sid: self.sid.clone(),
            digest_algorithm: Self::algorithm_identifier(&self.digest_algorithm)?,
            signed_attrs,
            signature_algorithm: Self::algorithm_identifier(&self.signature_algorithm)?,
            signature: asn1::encode_octet_string(&self.signature_value)?,
            unsigned_attrs,
        })
    }
}
