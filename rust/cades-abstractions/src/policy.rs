// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signature policy interface.
//!
//! Policy documents are retrieved and parsed elsewhere; the engine only needs the
//! constraint values below. [`StaticPolicy`] covers callers with a fixed policy,
//! either built in code or deserialized from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::AttributeId;

/// Required location of the signed content.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentModeRequirement {
    /// Content must be detached.
    External,
    /// Content must be encapsulated.
    Internal,
    #[default]
    Either,
}

/// Certificates the signature itself must carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CertificateInclusion {
    #[default]
    None,
    SignerOnly,
    FullPath,
}

/// Revocation checks requested from the certificate oracle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RevocationRequirement {
    NoCheck,
    CrlCheck,
    OcspCheck,
    BothCheck,
    #[default]
    EitherCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmPair {
    /// Digest algorithm OID.
    pub digest_algorithm: String,
    /// Signature algorithm OID.
    pub signature_algorithm: String,
}

impl AlgorithmPair {
    pub fn new(digest_algorithm: impl Into<String>, signature_algorithm: impl Into<String>) -> Self {
        Self {
            digest_algorithm: digest_algorithm.into(),
            signature_algorithm: signature_algorithm.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinKeyLength {
    /// Signature algorithm OID the minimum applies to; `None` applies to every algorithm.
    #[serde(default)]
    pub algorithm: Option<String>,
    pub bits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPeriod {
    pub not_before: DateTime<Utc>,
    #[serde(default)]
    pub not_after: Option<DateTime<Utc>>,
}

impl SigningPeriod {
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.not_before && self.not_after.map_or(true, |end| time <= end)
    }
}

/// Constraint snapshot read once at the start of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyConstraintSet {
    pub accepted_algorithms: Vec<AlgorithmPair>,
    pub min_key_lengths: Vec<MinKeyLength>,
    pub signing_period: Option<SigningPeriod>,
    pub content_mode: ContentModeRequirement,
    pub certificate_inclusion: CertificateInclusion,
}

pub trait PolicyOracle: Send + Sync {
    /// Policy OID the signature must reference, if the policy is explicit.
    fn policy_identifier(&self) -> Option<&str>;

    fn mandated_signed_attributes(&self) -> Vec<AttributeId>;

    fn mandated_unsigned_attributes(&self) -> Vec<AttributeId>;

    /// Trust anchor certificates (DER).
    fn trust_anchors(&self) -> Vec<Vec<u8>>;

    fn accepted_algorithms(&self) -> Vec<AlgorithmPair>;

    fn min_key_lengths(&self) -> Vec<MinKeyLength>;

    fn signing_period(&self) -> Option<SigningPeriod>;

    fn content_mode_requirement(&self) -> ContentModeRequirement;

    fn certificate_inclusion_requirement(&self) -> CertificateInclusion;

    fn revocation_requirement(&self) -> RevocationRequirement {
        RevocationRequirement::default()
    }

    fn constraints(&self) -> PolicyConstraintSet {
        PolicyConstraintSet {
            accepted_algorithms: self.accepted_algorithms(),
            min_key_lengths: self.min_key_lengths(),
            signing_period: self.signing_period(),
            content_mode: self.content_mode_requirement(),
            certificate_inclusion: self.certificate_inclusion_requirement(),
        }
    }
}

/// A policy whose values are fixed up front.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticPolicy {
    pub identifier: Option<String>,
    pub mandated_signed: Vec<AttributeId>,
    pub mandated_unsigned: Vec<AttributeId>,
    /// DER certificates, hex encoded in the serialized form.
    #[serde(with = "hex_list")]
    pub trust_anchors: Vec<Vec<u8>>,
    pub accepted_algorithms: Vec<AlgorithmPair>,
    pub min_key_lengths: Vec<MinKeyLength>,
    pub signing_period: Option<SigningPeriod>,
    pub content_mode: ContentModeRequirement,
    pub certificate_inclusion: CertificateInclusion,
    pub revocation: RevocationRequirement,
}

impl StaticPolicy {
    pub fn with_options(mut self, configure: impl FnOnce(&mut Self)) -> Self {
        configure(&mut self);
        self
    }
}

impl PolicyOracle for StaticPolicy {
    fn policy_identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    fn mandated_signed_attributes(&self) -> Vec<AttributeId> {
        self.mandated_signed.clone()
    }

    fn mandated_unsigned_attributes(&self) -> Vec<AttributeId> {
        self.mandated_unsigned.clone()
    }

    fn trust_anchors(&self) -> Vec<Vec<u8>> {
        self.trust_anchors.clone()
    }

    fn accepted_algorithms(&self) -> Vec<AlgorithmPair> {
        self.accepted_algorithms.clone()
    }

    fn min_key_lengths(&self) -> Vec<MinKeyLength> {
        self.min_key_lengths.clone()
    }

    fn signing_period(&self) -> Option<SigningPeriod> {
        self.signing_period
    }

    fn content_mode_requirement(&self) -> ContentModeRequirement {
        self.content_mode
    }

    fn certificate_inclusion_requirement(&self) -> CertificateInclusion {
        self.certificate_inclusion
    }

    fn revocation_requirement(&self) -> RevocationRequirement {
        self.revocation
    }
}

mod hex_list {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(|s| hex::decode(s.trim()).map_err(D::Error::custom))
            .collect()
    }
}
