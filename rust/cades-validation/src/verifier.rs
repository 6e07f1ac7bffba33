// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Staged CAdES signature verification.

use std::sync::Arc;

use cades_abstractions::{
    AttributeId, AttributeView, CertOracle, CertValidationResult, CertVerdict, IntegrityVerifier, PolicyOracle,
    TimeStampTokenVerifier,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::attribute_engine::AttributeValidationEngine;
use crate::context::VerificationContext;
use crate::error::VerificationError;
use crate::hash_chain::{ArchiveHashOptions, UnsignedAttrsEncoding};
use crate::integrity::check_integrity;
use crate::policy_constraints::{check_certificate_inclusion, PolicyConstraintChecker};
use crate::registry::{AttributeContext, AttributeRegistry};
use crate::report::{AttribReport, SignatureReport, TimeStampReport};
use crate::timestamps::{default_priority, TimeStampRecord, TimeStampStatus, TimestampChainValidator};
use crate::validation_result::ValidationResult;

/// Options controlling how signatures are verified.
#[derive(Debug, Clone)]
pub struct VerifierOptions {
    /// Time-stamp identifiers, most authoritative first.
    pub timestamp_priority: Vec<AttributeId>,
    /// How unsigned attributes enter archive time-stamp hashes.
    pub archive_unsigned_attrs_encoding: UnsignedAttrsEncoding,
    /// Retry archive imprints with the other encoding when the configured one does not match.
    pub archive_encoding_fallback: bool,
    /// Certification path message used when a revocation falls after a validated time-stamp.
    pub revocation_grace_message: String,
    /// Detached content, for signatures that do not encapsulate it.
    pub external_content: Option<Arc<[u8]>>,
    /// Wall clock override; `None` uses the current time.
    pub verification_time: Option<DateTime<Utc>>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            timestamp_priority: default_priority(),
            archive_unsigned_attrs_encoding: UnsignedAttrsEncoding::default(),
            archive_encoding_fallback: true,
            revocation_grace_message: SignatureVerifier::DEFAULT_REVOCATION_GRACE_MESSAGE.to_string(),
            external_content: None,
            verification_time: None,
        }
    }
}

impl VerifierOptions {
    fn archive_hash(&self) -> ArchiveHashOptions {
        ArchiveHashOptions {
            encoding: self.archive_unsigned_attrs_encoding,
            fallback: self.archive_encoding_fallback,
        }
    }
}

/// Findings of one verification, alongside the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub is_valid: bool,
    pub fatal: Vec<VerificationError>,
    pub warnings: Vec<VerificationError>,
    /// Time references as they stood at the end of the pipeline.
    pub context: VerificationContext,
}

/// Verifies CAdES signatures against a signature policy.
///
/// The verifier holds no per-signature state; each call works on its own
/// [`VerificationContext`] and findings, so one instance may verify many signatures,
/// sequentially or from several threads.
#[derive(Clone)]
pub struct SignatureVerifier {
    policy: Arc<dyn PolicyOracle>,
    cert_oracle: Arc<dyn CertOracle>,
    timestamps: Arc<dyn TimeStampTokenVerifier>,
    integrity: Arc<dyn IntegrityVerifier>,
    registry: Arc<AttributeRegistry>,
    options: VerifierOptions,
}

/// Fatal findings and warnings collected across stages.
#[derive(Default)]
struct Findings {
    fatal: Vec<VerificationError>,
    warnings: Vec<VerificationError>,
}

impl Findings {
    fn record(
        &mut self,
        report: &mut SignatureReport,
        stage_name: &str,
        fatal: Vec<VerificationError>,
        warnings: Vec<VerificationError>,
    ) {
        for error in &fatal {
            warn!(stage = stage_name, error = %error, "fatal finding");
        }
        report
            .stages
            .push(ValidationResult::from_findings(stage_name, &fatal, &warnings));
        self.fatal.extend(fatal);
        self.warnings.extend(warnings);
    }
}

impl SignatureVerifier {
    pub const STAGE_NAME_INTEGRITY: &'static str = "Signature Integrity";
    pub const STAGE_NAME_ATTRIBUTE_PRESENCE: &'static str = "Mandated Attribute Presence";
    pub const STAGE_NAME_TIMESTAMPS: &'static str = "Timestamp Chain";
    pub const STAGE_NAME_CERTIFICATION_PATH: &'static str = "Certification Path";
    pub const STAGE_NAME_POLICY: &'static str = "Policy Constraints";
    pub const STAGE_NAME_ATTRIBUTES: &'static str = "Attribute Validation";
    pub const STAGE_NAME_CERTIFICATE_INCLUSION: &'static str = "Certificate Inclusion";

    pub const DEFAULT_REVOCATION_GRACE_MESSAGE: &'static str =
        "Certificate was revoked after the signature was time-stamped";

    pub const METADATA_KEY_TIME_REFERENCE: &'static str = "TimeReference";
    pub const METADATA_KEY_REVOCATION_GRACE: &'static str = "RevocationGrace";

    /// Creates a verifier with the default CAdES attribute registry and default options.
    pub fn new(
        policy: Arc<dyn PolicyOracle>,
        cert_oracle: Arc<dyn CertOracle>,
        timestamps: Arc<dyn TimeStampTokenVerifier>,
        integrity: Arc<dyn IntegrityVerifier>,
    ) -> Self {
        Self {
            policy,
            cert_oracle,
            timestamps,
            integrity,
            registry: Arc::new(AttributeRegistry::cades_default()),
            options: VerifierOptions::default(),
        }
    }

    /// Replaces the attribute registry.
    pub fn with_registry(mut self, registry: Arc<AttributeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Configure verifier options starting from the defaults.
    pub fn with_options(mut self, configure: impl FnOnce(&mut VerifierOptions)) -> Self {
        configure(&mut self.options);
        self
    }

    pub fn options(&self) -> &VerifierOptions {
        &self.options
    }

    /// Verifies `signature`, replacing the contents of `report`. Returns the verdict.
    pub fn verify(&self, signature: &dyn AttributeView, report: &mut SignatureReport) -> bool {
        self.verify_with_outcome(signature, report).is_valid
    }

    /// Like [`Self::verify`], also returning the classified findings and final time references.
    pub fn verify_with_outcome(&self, signature: &dyn AttributeView, report: &mut SignatureReport) -> VerificationOutcome {
        *report = SignatureReport::new();
        let mut findings = Findings::default();
        let mut time = VerificationContext::new(self.options.verification_time.unwrap_or_else(Utc::now));

        let constraints = self.policy.constraints();
        let external = self.options.external_content.as_deref();
        let signer = signature.signer_certificate();

        if let Some(subject) = signer.and_then(cades_x509::subject_name) {
            report.signer_subject = subject;
        }
        report.content_mode = signature.content_mode();
        report.certificate_inclusion = constraints.certificate_inclusion;

        // Integrity
        debug!(stage = Self::STAGE_NAME_INTEGRITY, "running stage");
        let integrity = check_integrity(signature, &*self.integrity, external);
        report.hash = integrity.hash;
        report.asymmetric_cipher = integrity.asymmetric_cipher;
        let integrity_verified = integrity.is_verified();
        findings.record(report, Self::STAGE_NAME_INTEGRITY, integrity.errors, Vec::new());

        // Mandated attribute presence
        debug!(stage = Self::STAGE_NAME_ATTRIBUTE_PRESENCE, "running stage");
        let present = signature.attribute_identifiers();
        let mandated_signed = self.policy.mandated_signed_attributes();
        let mandated_unsigned = self.policy.mandated_unsigned_attributes();
        report.required_rules = mandated_signed.iter().map(|id| self.registry.display_name(id)).collect();

        let engine = AttributeValidationEngine::new(&self.registry);
        let missing = engine.check_presence(&present, &mandated_signed, &mandated_unsigned);
        findings.record(report, Self::STAGE_NAME_ATTRIBUTE_PRESENCE, missing, Vec::new());
        let mandated: Vec<AttributeId> = mandated_signed.into_iter().chain(mandated_unsigned).collect();

        // Time-stamp chain
        debug!(stage = Self::STAGE_NAME_TIMESTAMPS, "running stage");
        let base = AttributeContext {
            signature,
            policy: &*self.policy,
            timestamps: &*self.timestamps,
            time,
            external_content: external,
            archive_hash: self.options.archive_hash(),
            integrity_verified,
        };
        let chain = TimestampChainValidator::new(&self.registry, &self.options.timestamp_priority);
        let timestamps = chain.order_and_validate(&base, &mut time);

        report.timestamps = timestamps
            .records
            .iter()
            .map(|record| TimeStampReport {
                name: self.registry.display_name(&record.id),
                identifier: record.id.clone(),
                time_reference: record.time,
                valid: record.is_valid(),
                cert_path_expired: record.status == TimeStampStatus::CertPathExpired,
                message: record.error.as_ref().map(ToString::to_string),
            })
            .collect();
        // One attribute report per occurrence, filed by whether the policy mandates it.
        let (mut timestamps_required, mut timestamps_optional) = (Vec::new(), Vec::new());
        for record in &timestamps.records {
            let attrib = self.timestamp_attrib_report(record);
            if mandated.contains(&record.id) {
                timestamps_required.push(attrib);
            } else {
                timestamps_optional.push(attrib);
            }
        }
        report.has_one_valid_timestamp = timestamps.has_one_valid;
        report.has_one_expired_timestamp = timestamps.has_one_expired;
        report.has_one_invalid_timestamp = timestamps.has_one_invalid;
        report.time_reference = Some(time.main_time_reference());
        findings.record(
            report,
            Self::STAGE_NAME_TIMESTAMPS,
            timestamps.errors,
            timestamps.warnings,
        );
        if let Some(stage) = report.stages.last_mut() {
            stage.metadata.insert(
                Self::METADATA_KEY_TIME_REFERENCE.to_string(),
                time.main_time_reference().to_rfc3339(),
            );
        }

        // Certification path and revocation
        debug!(stage = Self::STAGE_NAME_CERTIFICATION_PATH, time_reference = %time.main_time_reference(), "running stage");
        let (path_errors, certification_path, grace) = self.check_certification_path(
            signer,
            &time,
            timestamps.has_one_valid,
            report,
        );
        findings.record(report, Self::STAGE_NAME_CERTIFICATION_PATH, path_errors, Vec::new());
        if grace {
            if let Some(stage) = report.stages.last_mut() {
                stage.metadata.insert(
                    Self::METADATA_KEY_REVOCATION_GRACE.to_string(),
                    self.options.revocation_grace_message.clone(),
                );
            }
        }

        // Policy constraints
        debug!(stage = Self::STAGE_NAME_POLICY, "running stage");
        let checker = PolicyConstraintChecker::new(&*self.integrity, external);
        let policy_errors = checker.check(&constraints, signature, signer, time.main_time_reference());
        findings.record(report, Self::STAGE_NAME_POLICY, policy_errors, Vec::new());

        // Deep attribute validation
        debug!(stage = Self::STAGE_NAME_ATTRIBUTES, "running stage");
        let ctx = AttributeContext { time, ..base };
        let excluded = &self.options.timestamp_priority;

        let required = engine.classify(&ctx, &present, &mandated, excluded);
        let optional = engine.validate_optional(&ctx, &present, &mandated, excluded);
        report.pa_oid_valid = required.pa_oid_valid && optional.pa_oid_valid;
        report.required = required.reports;
        report.required.extend(timestamps_required);
        report.optional = optional.reports;
        report.optional.extend(timestamps_optional);

        let mut warnings = required.warnings;
        warnings.extend(optional.errors);
        warnings.extend(optional.warnings);
        findings.record(report, Self::STAGE_NAME_ATTRIBUTES, required.errors, warnings);

        // Certificate inclusion
        debug!(stage = Self::STAGE_NAME_CERTIFICATE_INCLUSION, "running stage");
        let inclusion = check_certificate_inclusion(
            constraints.certificate_inclusion,
            signature.certificates(),
            signer,
            &certification_path,
        );
        report.contains_mandated_certificates = inclusion.is_empty();
        findings.record(report, Self::STAGE_NAME_CERTIFICATE_INCLUSION, inclusion, Vec::new());

        // Verdict
        let is_valid = findings.fatal.is_empty();
        report.valid = is_valid;
        report.error_messages = findings.fatal.iter().map(ToString::to_string).collect();
        report.warning_messages = findings.warnings.iter().map(ToString::to_string).collect();

        info!(
            valid = is_valid,
            fatal = findings.fatal.len(),
            warnings = findings.warnings.len(),
            signer = %report.signer_subject,
            "signature verification finished"
        );

        VerificationOutcome {
            is_valid,
            fatal: findings.fatal,
            warnings: findings.warnings,
            context: time,
        }
    }

    fn timestamp_attrib_report(&self, record: &TimeStampRecord) -> AttribReport {
        let name = self.registry.display_name(&record.id);
        let message = record.error.as_ref().map(ToString::to_string);
        match (record.status, message) {
            (TimeStampStatus::Valid, _) => AttribReport::passed(name, record.id.clone()),
            (TimeStampStatus::CertPathExpired, Some(message)) => AttribReport::warned(name, record.id.clone(), message),
            (_, message) => AttribReport::failed(
                name,
                record.id.clone(),
                message.unwrap_or_else(|| "time-stamp was not validated".to_string()),
            ),
        }
    }

    /// Returns the stage findings, the certification path built by the oracle, and
    /// whether the revocation grace rule applied.
    fn check_certification_path(
        &self,
        signer: Option<&[u8]>,
        time: &VerificationContext,
        has_valid_timestamp: bool,
        report: &mut SignatureReport,
    ) -> (Vec<VerificationError>, Vec<Vec<u8>>, bool) {
        let Some(signer) = signer else {
            let message = "signer certificate is not available".to_string();
            report.cert_path_state = Some(CertVerdict::Indeterminate);
            report.cert_path_message = Some(message.clone());
            let error = VerificationError::CertificationPathFailure {
                verdict: CertVerdict::Indeterminate,
                message,
            };
            return (vec![error], Vec::new(), false);
        };

        let result = match self.cert_oracle.validate(
            signer,
            &self.policy.trust_anchors(),
            self.policy.revocation_requirement(),
            time.main_time_reference(),
        ) {
            Ok(result) => result,
            Err(e) => {
                report.cert_path_state = Some(CertVerdict::Indeterminate);
                report.cert_path_message = Some(e.to_string());
                return (
                    vec![VerificationError::IndeterminateValidation(e.to_string())],
                    Vec::new(),
                    false,
                );
            }
        };

        let CertValidationResult {
            verdict,
            message,
            revocation_time,
            certification_path,
        } = result;

        let grace = has_valid_timestamp
            && verdict == CertVerdict::Revoked
            && revocation_time.is_some_and(|revoked| time.grace_time() < revoked);

        if grace {
            info!(grace_time = %time.grace_time(), "revocation after validated time-stamp, path accepted");
            report.cert_path_state = Some(CertVerdict::Valid);
            report.cert_path_message = Some(self.options.revocation_grace_message.clone());
            return (Vec::new(), certification_path, true);
        }

        report.cert_path_state = Some(verdict);
        report.cert_path_message = Some(message.clone());
        let errors = match verdict {
            CertVerdict::Valid => Vec::new(),
            _ => vec![VerificationError::CertificationPathFailure { verdict, message }],
        };
        (errors, certification_path, false)
    }
}
