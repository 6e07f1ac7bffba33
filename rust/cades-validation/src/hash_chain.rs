// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! LTV hash reconstruction.
//!
//! ES-C and archive time-stamps cover digests of signature state that existed when
//! they were issued. To verify them the engine rebuilds the exact byte sequences
//! from the stored encodings. Nothing is re-encoded except the unsigned attribute
//! container when archive time-stamps newer than the cutoff have to be removed.

use cades_abstractions::asn1;
use cades_abstractions::{
    oids, AttributeId, AttributeView, AttributeViewError, RawAttribute, SignedContent, TimeStampTokenVerifier,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::VerificationError;

/// How the unsigned attributes of the signer info contribute to an archive hash.
///
/// ETSI TS 101 733 is ambiguous about whether the `[1]` tag and length are hashed.
/// Both readings exist in deployed signatures, so both are kept selectable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub enum UnsignedAttrsEncoding {
    /// Each contained attribute's own encoding, without the enclosing tag and length.
    #[default]
    ElementWise,
    /// The complete tagged field as a single blob.
    TaggedBlob,
}

impl UnsignedAttrsEncoding {
    pub fn other(self) -> Self {
        match self {
            Self::ElementWise => Self::TaggedBlob,
            Self::TaggedBlob => Self::ElementWise,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ArchiveHashOptions {
    /// Encoding tried first when checking an archive time-stamp imprint.
    pub encoding: UnsignedAttrsEncoding,
    /// Retry with the other encoding when the first one does not match.
    pub fallback: bool,
}

impl Default for ArchiveHashOptions {
    fn default() -> Self {
        Self {
            encoding: UnsignedAttrsEncoding::ElementWise,
            fallback: true,
        }
    }
}

pub(crate) fn digest(algorithm: &str, data: &[u8]) -> Result<Vec<u8>, VerificationError> {
    cades_x509::digest_by_oid(algorithm, data)
        .ok_or_else(|| VerificationError::UnsupportedDigestAlgorithm(algorithm.to_string()))
}

/// Read-only reconstruction of the byte sequences covered by ES-C and archive time-stamps.
pub struct HashChainComputer<'a> {
    signature: &'a dyn AttributeView,
    tokens: &'a dyn TimeStampTokenVerifier,
    external_content: Option<&'a [u8]>,
}

impl<'a> HashChainComputer<'a> {
    pub fn new(
        signature: &'a dyn AttributeView,
        tokens: &'a dyn TimeStampTokenVerifier,
        external_content: Option<&'a [u8]>,
    ) -> Self {
        Self {
            signature,
            tokens,
            external_content,
        }
    }

    /// Bytes covered by an escTimeStamp.
    pub fn sig_and_refs_input(&self) -> Result<Vec<u8>, VerificationError> {
        let mut out = self.signature.signature_value().to_vec();

        for id in [oids::SIGNATURE_TIMESTAMP, oids::CERTIFICATE_REFS, oids::REVOCATION_REFS] {
            self.append_attribute(&mut out, id)?;
        }

        if self.signature.occurrence_count(&AttributeId::new(oids::ATTR_CERTIFICATE_REFS)) > 0 {
            self.append_attribute(&mut out, oids::ATTR_CERTIFICATE_REFS)?;
            self.append_attribute(&mut out, oids::ATTR_REVOCATION_REFS)?;
        }

        Ok(out)
    }

    pub fn sig_and_refs_hash(&self, algorithm: &str) -> Result<Vec<u8>, VerificationError> {
        digest(algorithm, &self.sig_and_refs_input()?)
    }

    /// Bytes covered by an archiveTimeStampV2, leaving out archive time-stamps newer than `cutoff`.
    pub fn archive_timestamp_input(
        &self,
        cutoff: Option<DateTime<Utc>>,
        encoding: UnsignedAttrsEncoding,
    ) -> Result<Vec<u8>, VerificationError> {
        self.archive_input_with(encoding, |time| cutoff.map_or(true, |cutoff| time <= cutoff))
    }

    pub fn archive_timestamp_hash(
        &self,
        algorithm: &str,
        cutoff: Option<DateTime<Utc>>,
        encoding: UnsignedAttrsEncoding,
    ) -> Result<Vec<u8>, VerificationError> {
        digest(algorithm, &self.archive_timestamp_input(cutoff, encoding)?)
    }

    /// Archive hash as it stood just before a time-stamp issued at `reference`.
    pub(crate) fn archive_timestamp_hash_before(
        &self,
        algorithm: &str,
        reference: DateTime<Utc>,
        encoding: UnsignedAttrsEncoding,
    ) -> Result<Vec<u8>, VerificationError> {
        digest(algorithm, &self.archive_input_with(encoding, |time| time < reference)?)
    }

    fn append_attribute(&self, out: &mut Vec<u8>, id: &str) -> Result<(), VerificationError> {
        let id = AttributeId::new(id);
        let raw = match self.signature.raw_attribute(&id, 0) {
            Ok(raw) => raw,
            Err(AttributeViewError::NotFound { .. }) => {
                return Err(VerificationError::MissingRequiredAttribute { id });
            }
            Err(e) => return Err(e.into()),
        };
        out.extend_from_slice(raw.attr_type());
        out.extend_from_slice(raw.attr_values());
        Ok(())
    }

    fn content_bytes(&self) -> Result<&'a [u8], VerificationError> {
        match self.signature.content() {
            SignedContent::Embedded(bytes) => Ok(bytes),
            SignedContent::External => self.external_content.ok_or(VerificationError::MissingDetachedContent),
        }
    }

    fn archive_input_with(
        &self,
        encoding: UnsignedAttrsEncoding,
        keep: impl Fn(DateTime<Utc>) -> bool,
    ) -> Result<Vec<u8>, VerificationError> {
        let data = self.signature.signed_data_parts()?;
        let info = self.signature.signer_info_parts()?;
        let mut out = Vec::new();

        out.extend_from_slice(&data.encap_content_info);
        let encap = asn1::read_single(&data.encap_content_info)?;
        if encap.children()?.len() <= 1 {
            out.extend_from_slice(self.content_bytes()?);
        }

        if let Some(certificates) = &data.certificates {
            out.extend_from_slice(certificates);
        }
        if let Some(crls) = &data.crls {
            out.extend_from_slice(crls);
        }

        out.extend_from_slice(&info.version);
        out.extend_from_slice(&info.sid);
        out.extend_from_slice(&info.digest_algorithm);
        if let Some(signed_attrs) = &info.signed_attrs {
            out.extend_from_slice(signed_attrs);
        }
        out.extend_from_slice(&info.signature_algorithm);
        out.extend_from_slice(&info.signature);

        if let Some(unsigned_attrs) = &info.unsigned_attrs {
            let field = asn1::read_single(unsigned_attrs)?;
            let attributes = field.children()?;
            let mut kept = Vec::with_capacity(attributes.len());
            for attribute in &attributes {
                if self.is_later_archive_timestamp(attribute.raw, &keep) {
                    continue;
                }
                kept.push(attribute.raw);
            }

            match encoding {
                UnsignedAttrsEncoding::ElementWise => {
                    for attribute in kept {
                        out.extend_from_slice(attribute);
                    }
                }
                UnsignedAttrsEncoding::TaggedBlob if kept.len() == attributes.len() => {
                    out.extend_from_slice(field.raw);
                }
                UnsignedAttrsEncoding::TaggedBlob => {
                    let len = kept.iter().map(|attribute| attribute.len()).sum();
                    out.extend(asn1::encode_header(field.tag, len)?);
                    for attribute in kept {
                        out.extend_from_slice(attribute);
                    }
                }
            }
        }

        Ok(out)
    }

    fn is_later_archive_timestamp(&self, encoded: &[u8], keep: &impl Fn(DateTime<Utc>) -> bool) -> bool {
        let Ok(attribute) = RawAttribute::from_der(encoded) else {
            return false;
        };
        if *attribute.id() != oids::ARCHIVE_TIMESTAMP_V2 {
            return false;
        }

        let token = match attribute.values() {
            Ok(values) => values.first().map(|v| v.raw.to_vec()),
            Err(_) => None,
        };
        let Some(token) = token else {
            return false;
        };

        match self.tokens.decode(&token) {
            Ok(info) => !keep(info.gen_time),
            Err(e) => {
                debug!(error = %e, "archive time-stamp kept in hash input: token time unreadable");
                false
            }
        }
    }
}
