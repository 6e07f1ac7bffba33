// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! CAdES signature verification engine.
//!
//! [`SignatureVerifier`] runs a linear pipeline over a decoded signature:
//! integrity, mandated attribute presence, the time-stamp chain, certification path
//! and revocation, policy constraints, deep attribute validation and certificate
//! inclusion. Every stage records its findings and the pipeline always runs to the
//! end, so the [`SignatureReport`] is complete even for invalid signatures.
//!
//! Container decoding, policy retrieval, path building and time-stamp token
//! verification are collaborators passed in through the traits of
//! `cades-abstractions`.

pub mod attribute_engine;
pub mod attributes;
pub mod context;
pub mod error;
pub mod hash_chain;
pub mod integrity;
pub mod policy_constraints;
pub mod registry;
pub mod report;
pub mod timestamps;
pub mod validation_result;
pub mod verifier;

pub use attribute_engine::{AttributeValidationEngine, ClassificationOutcome};
pub use context::VerificationContext;
pub use error::{AttributeScope, ErrorKind, PolicyConstraint, VerificationError};
pub use hash_chain::{ArchiveHashOptions, HashChainComputer, UnsignedAttrsEncoding};
pub use integrity::{check_integrity, IntegrityOutcome};
pub use policy_constraints::{check_certificate_inclusion, PolicyConstraintChecker};
pub use registry::{AttributeContext, AttributeEntry, AttributeKind, AttributeRegistry, ValidateFn};
pub use report::{AttribReport, SignatureReport, SignatureValidity, TimeStampReport};
pub use timestamps::{
    default_priority, TimeStampRecord, TimeStampStatus, TimestampChainOutcome, TimestampChainValidator,
};
pub use validation_result::{ValidationFailure, ValidationResult};
pub use verifier::{SignatureVerifier, VerificationOutcome, VerifierOptions};
