// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mandated and optional attribute classification.

use std::collections::HashSet;

use cades_abstractions::{oids, AttributeId};
use tracing::debug;

use crate::error::{AttributeScope, VerificationError};
use crate::registry::{AttributeContext, AttributeRegistry};
use crate::report::AttribReport;

/// Findings of one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationOutcome {
    pub errors: Vec<VerificationError>,
    pub warnings: Vec<VerificationError>,
    /// One entry per validated occurrence, in validation order.
    pub reports: Vec<AttribReport>,
    /// False once a signature policy identifier did not match the policy.
    pub pa_oid_valid: bool,
}

impl ClassificationOutcome {
    fn new() -> Self {
        Self {
            pa_oid_valid: true,
            ..Self::default()
        }
    }
}

/// Dispatches attribute occurrences to their registered validators and sorts the
/// findings into fatal errors and warnings.
pub struct AttributeValidationEngine<'r> {
    registry: &'r AttributeRegistry,
}

impl<'r> AttributeValidationEngine<'r> {
    pub fn new(registry: &'r AttributeRegistry) -> Self {
        Self { registry }
    }

    /// Mandated identifiers absent from the signature.
    pub fn check_presence(
        &self,
        present: &[AttributeId],
        mandated_signed: &[AttributeId],
        mandated_unsigned: &[AttributeId],
    ) -> Vec<VerificationError> {
        let present: HashSet<&AttributeId> = present.iter().collect();
        let signed = mandated_signed.iter().map(|id| (id, AttributeScope::Signed));
        let unsigned = mandated_unsigned.iter().map(|id| (id, AttributeScope::Unsigned));

        signed
            .chain(unsigned)
            .filter(|(id, _)| !present.contains(id))
            .map(|(id, scope)| VerificationError::MissingMandatedAttribute { id: id.clone(), scope })
            .collect()
    }

    /// Validates every occurrence of the mandated, non-excluded identifiers present in the signature.
    /// Time-stamp attributes are always left to the time-stamp chain.
    ///
    /// An identifier whose occurrences all fail is fatal. If at least one occurrence
    /// passes, the failures of the others are reported as warnings.
    pub fn classify(
        &self,
        ctx: &AttributeContext<'_>,
        signature_ids: &[AttributeId],
        mandated: &[AttributeId],
        excluded: &[AttributeId],
    ) -> ClassificationOutcome {
        let mut outcome = ClassificationOutcome::new();

        for id in signature_ids
            .iter()
            .filter(|id| mandated.contains(id) && self.in_attribute_passes(id, excluded))
        {
            let (failures, all_failed) = self.validate_identifier(ctx, id, &mut outcome);
            if all_failed {
                outcome.errors.extend(failures);
            } else {
                outcome.warnings.extend(failures);
            }
        }

        outcome
    }

    /// Validates identifiers present but not mandated. Every failure is a warning.
    pub fn validate_optional(
        &self,
        ctx: &AttributeContext<'_>,
        signature_ids: &[AttributeId],
        mandated: &[AttributeId],
        excluded: &[AttributeId],
    ) -> ClassificationOutcome {
        let mut outcome = ClassificationOutcome::new();

        for id in signature_ids
            .iter()
            .filter(|id| !mandated.contains(id) && self.in_attribute_passes(id, excluded))
        {
            let (failures, _) = self.validate_identifier(ctx, id, &mut outcome);
            outcome.warnings.extend(failures);
        }

        outcome
    }

    fn in_attribute_passes(&self, id: &AttributeId, excluded: &[AttributeId]) -> bool {
        !excluded.contains(id) && !self.registry.is_timestamp(id)
    }

    /// Runs all occurrences of `id`, recording reports and advisory findings. Returns
    /// the failures still to be classified and whether every occurrence failed.
    fn validate_identifier(
        &self,
        ctx: &AttributeContext<'_>,
        id: &AttributeId,
        outcome: &mut ClassificationOutcome,
    ) -> (Vec<VerificationError>, bool) {
        let name = self.registry.display_name(id);

        if self.registry.get(id).is_none() {
            let error = VerificationError::UnknownAttribute { id: id.clone() };
            outcome.reports.push(AttribReport::failed(&name, id.clone(), error.to_string()));
            return (vec![error], true);
        }

        let occurrences = ctx.signature.occurrence_count(id);
        let mut failures = Vec::new();
        for index in 0..occurrences {
            match self.validate_occurrence(ctx, id, index) {
                Ok(()) => outcome.reports.push(AttribReport::passed(&name, id.clone())),
                Err(error) if error.is_advisory() => {
                    debug!(attribute = %id, occurrence = index, error = %error, "advisory attribute finding");
                    outcome.reports.push(AttribReport::warned(&name, id.clone(), error.to_string()));
                    outcome.warnings.push(error);
                }
                Err(error) => {
                    debug!(attribute = %id, occurrence = index, error = %error, "attribute validation failed");
                    if matches!(error, VerificationError::InvalidPolicyIdentifier { .. }) {
                        outcome.pa_oid_valid = false;
                    }
                    outcome.reports.push(AttribReport::failed(&name, id.clone(), error.to_string()));
                    failures.push(error);
                }
            }
        }

        let all_failed = occurrences > 0 && failures.len() == occurrences;
        (failures, all_failed)
    }

    fn validate_occurrence(
        &self,
        ctx: &AttributeContext<'_>,
        id: &AttributeId,
        index: usize,
    ) -> Result<(), VerificationError> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| VerificationError::UnknownAttribute { id: id.clone() })?;
        let raw = ctx.signature.raw_attribute(id, index)?;
        (entry.validate)(ctx, &raw)?;

        if *id == oids::MESSAGE_DIGEST && !ctx.integrity_verified {
            return Err(VerificationError::IntegrityFailure(
                "message digest cannot be trusted: the signature value did not verify".to_string(),
            ));
        }
        Ok(())
    }
}
