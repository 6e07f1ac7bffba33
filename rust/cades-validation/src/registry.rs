// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute validator registry.
//!
//! Maps attribute identifiers to a display name and a validation function. The
//! registry is an ordinary value: build it once (usually from
//! [`AttributeRegistry::cades_default`]), add entries if needed, and hand it to the
//! verifier.

use std::collections::HashMap;

use cades_abstractions::{
    oids, AttributeId, AttributeView, PolicyOracle, RawAttribute, SignedContent, TimeStampTokenVerifier,
};

use crate::attributes::{signed, timestamp, unsigned};
use crate::context::VerificationContext;
use crate::error::VerificationError;
use crate::hash_chain::{ArchiveHashOptions, HashChainComputer};

/// Everything a validator may consult. Time references are a snapshot.
#[derive(Clone, Copy)]
pub struct AttributeContext<'a> {
    pub signature: &'a dyn AttributeView,
    pub policy: &'a dyn PolicyOracle,
    pub timestamps: &'a dyn TimeStampTokenVerifier,
    pub time: VerificationContext,
    pub external_content: Option<&'a [u8]>,
    pub archive_hash: ArchiveHashOptions,
    /// Outcome of the signer signature check.
    pub integrity_verified: bool,
}

impl<'a> AttributeContext<'a> {
    pub fn hash_chain(&self) -> HashChainComputer<'a> {
        HashChainComputer::new(self.signature, self.timestamps, self.external_content)
    }

    /// Signed content bytes, embedded or supplied out of band.
    pub fn content_bytes(&self) -> Option<&'a [u8]> {
        match self.signature.content() {
            SignedContent::Embedded(bytes) => Some(bytes),
            SignedContent::External => self.external_content,
        }
    }
}

pub type ValidateFn = fn(&AttributeContext<'_>, &RawAttribute) -> Result<(), VerificationError>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Signed,
    Unsigned,
    /// Validated by the time-stamp chain, never by the attribute passes.
    TimeStamp,
}

#[derive(Clone, Copy)]
pub struct AttributeEntry {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub validate: ValidateFn,
}

impl AttributeEntry {
    pub const fn new(name: &'static str, kind: AttributeKind, validate: ValidateFn) -> Self {
        Self { name, kind, validate }
    }
}

#[derive(Clone, Default)]
pub struct AttributeRegistry {
    entries: HashMap<AttributeId, AttributeEntry>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validators for the CAdES attributes this engine understands.
    pub fn cades_default() -> Self {
        use AttributeKind::{Signed, TimeStamp, Unsigned};

        let defaults: [(&str, AttributeEntry); 20] = [
            (oids::CONTENT_TYPE, AttributeEntry::new("Content Type", Signed, signed::content_type)),
            (oids::MESSAGE_DIGEST, AttributeEntry::new("Message Digest", Signed, signed::message_digest)),
            (oids::SIGNING_TIME, AttributeEntry::new("Signing Time", Signed, signed::signing_time)),
            (
                oids::SIGNING_CERTIFICATE,
                AttributeEntry::new("Signing Certificate", Signed, signed::signing_certificate),
            ),
            (
                oids::SIGNING_CERTIFICATE_V2,
                AttributeEntry::new("Signing Certificate V2", Signed, signed::signing_certificate_v2),
            ),
            (
                oids::SIG_POLICY_ID,
                AttributeEntry::new("Signature Policy Identifier", Signed, signed::signature_policy_identifier),
            ),
            (oids::SIGNER_LOCATION, AttributeEntry::new("Signer Location", Signed, signed::signer_location)),
            (oids::SIGNER_ATTR, AttributeEntry::new("Signer Attributes", Signed, signed::signer_attributes)),
            (oids::CONTENT_HINT, AttributeEntry::new("Content Hints", Signed, signed::content_hint)),
            (
                oids::COUNTER_SIGNATURE,
                AttributeEntry::new("Counter Signature", Unsigned, unsigned::counter_signature),
            ),
            (
                oids::CERTIFICATE_REFS,
                AttributeEntry::new("Complete Certificate References", Unsigned, unsigned::certificate_refs),
            ),
            (
                oids::REVOCATION_REFS,
                AttributeEntry::new("Complete Revocation References", Unsigned, unsigned::revocation_refs),
            ),
            (oids::CERT_VALUES, AttributeEntry::new("Certificate Values", Unsigned, unsigned::cert_values)),
            (
                oids::REVOCATION_VALUES,
                AttributeEntry::new("Revocation Values", Unsigned, unsigned::revocation_values),
            ),
            (
                oids::ATTR_CERTIFICATE_REFS,
                AttributeEntry::new("Attribute Certificate References", Unsigned, unsigned::certificate_refs),
            ),
            (
                oids::ATTR_REVOCATION_REFS,
                AttributeEntry::new("Attribute Revocation References", Unsigned, unsigned::revocation_refs),
            ),
            (
                oids::REVOCATION_INFO_ARCHIVAL,
                AttributeEntry::new("Revocation Info Archival", Unsigned, unsigned::revocation_values),
            ),
            (
                oids::SIGNATURE_TIMESTAMP,
                AttributeEntry::new("Signature Time Stamp", TimeStamp, timestamp::signature_timestamp),
            ),
            (
                oids::ESC_TIMESTAMP,
                AttributeEntry::new("CAdES-C Time Stamp", TimeStamp, timestamp::esc_timestamp),
            ),
            (
                oids::ARCHIVE_TIMESTAMP_V2,
                AttributeEntry::new("Archive Time Stamp V2", TimeStamp, timestamp::archive_timestamp_v2),
            ),
        ];

        let mut registry = Self::new();
        for (id, entry) in defaults {
            registry.register(id, entry);
        }
        registry
    }

    /// Adds or replaces the entry for `id`.
    pub fn register(&mut self, id: impl Into<AttributeId>, entry: AttributeEntry) -> &mut Self {
        self.entries.insert(id.into(), entry);
        self
    }

    pub fn get(&self, id: &AttributeId) -> Option<&AttributeEntry> {
        self.entries.get(id)
    }

    /// Display name for reports; unknown identifiers are shown as-is.
    pub fn display_name(&self, id: &AttributeId) -> String {
        self.get(id)
            .map(|entry| entry.name.to_string())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn is_timestamp(&self, id: &AttributeId) -> bool {
        self.get(id).is_some_and(|entry| entry.kind == AttributeKind::TimeStamp)
    }
}
