// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared interfaces and datatypes for the CAdES verification crates.
//!
//! This crate exists to keep the engine (`cades-validation`) independent from
//! the collaborators it consumes:
//! - container decoding (`AttributeView`)
//! - signature policy (`PolicyOracle`)
//! - certification path and revocation (`CertOracle`)
//! - time-stamp tokens (`TimeStampTokenVerifier`)
//! - signature cryptography (`IntegrityVerifier`, implemented by `cades-x509`)

pub mod asn1;
pub mod attribute_view;
pub mod cert_oracle;
pub mod identifiers;
pub mod integrity;
pub mod policy;
pub mod timestamp;

pub use attribute_view::{
    AttributeView, AttributeViewError, ContentMode, DecodedSignature, RawAttribute, SignedContent,
    SignedDataParts, SignerInfoParts,
};
pub use cert_oracle::{CertOracle, CertOracleError, CertValidationResult, CertVerdict};
pub use identifiers::{oids, AttributeId};
pub use integrity::{IntegrityError, IntegrityVerifier};
pub use policy::{
    AlgorithmPair, CertificateInclusion, ContentModeRequirement, MinKeyLength, PolicyConstraintSet,
    PolicyOracle, RevocationRequirement, SigningPeriod, StaticPolicy,
};
pub use timestamp::{TimeStampTokenError, TimeStampTokenInfo, TimeStampTokenVerifier, TokenVerification};
