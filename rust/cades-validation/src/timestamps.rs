// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time-stamp chain ordering and validation.
//!
//! Records are grouped by identifier in priority order (most authoritative first)
//! and, within a group, by time with the most recent first. The first valid
//! non-basic record fixes the main time reference; basic signature time-stamps only
//! fill the temporary reference.

use cades_abstractions::{oids, AttributeId, TokenVerification};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::attributes::timestamp::token_bytes;
use crate::context::VerificationContext;
use crate::error::VerificationError;
use crate::registry::{AttributeContext, AttributeRegistry};

/// Identifiers in default priority order.
pub fn default_priority() -> Vec<AttributeId> {
    vec![
        AttributeId::new(oids::ARCHIVE_TIMESTAMP_V2),
        AttributeId::new(oids::ESC_TIMESTAMP),
        AttributeId::new(oids::SIGNATURE_TIMESTAMP),
    ]
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TimeStampStatus {
    Pending,
    Valid,
    /// Imprint and token are sound; the authority's certification path has expired.
    CertPathExpired,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampRecord {
    pub id: AttributeId,
    /// Occurrence index among attributes sharing `id`.
    pub index: usize,
    /// Time claimed by the token; `None` when it could not be decoded.
    pub time: Option<DateTime<Utc>>,
    pub token: Vec<u8>,
    pub status: TimeStampStatus,
    pub error: Option<VerificationError>,
}

impl TimeStampRecord {
    pub fn is_valid(&self) -> bool {
        self.status == TimeStampStatus::Valid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampChainOutcome {
    /// Records in validation order.
    pub records: Vec<TimeStampRecord>,
    pub errors: Vec<VerificationError>,
    pub warnings: Vec<VerificationError>,
    pub has_one_valid: bool,
    pub has_one_expired: bool,
    pub has_one_invalid: bool,
}

pub struct TimestampChainValidator<'a> {
    registry: &'a AttributeRegistry,
    priority: &'a [AttributeId],
}

impl<'a> TimestampChainValidator<'a> {
    pub fn new(registry: &'a AttributeRegistry, priority: &'a [AttributeId]) -> Self {
        Self { registry, priority }
    }

    /// Collects one record per time-stamp occurrence and sorts them into validation order.
    pub fn order(&self, ctx: &AttributeContext<'_>) -> Vec<TimeStampRecord> {
        let present = ctx.signature.attribute_identifiers();
        let mut records = Vec::new();

        for id in self.priority.iter().filter(|id| present.contains(id)) {
            let mut bucket: Vec<TimeStampRecord> = (0..ctx.signature.occurrence_count(id))
                .map(|index| self.record(ctx, id, index))
                .collect();
            // Stable: equal times keep declaration order; undecodable times go last.
            bucket.sort_by(|a, b| b.time.cmp(&a.time));
            records.extend(bucket);
        }

        records
    }

    fn record(&self, ctx: &AttributeContext<'_>, id: &AttributeId, index: usize) -> TimeStampRecord {
        let token = ctx
            .signature
            .raw_attribute(id, index)
            .map_err(VerificationError::from)
            .and_then(|raw| token_bytes(&raw));

        let (token, time) = match token {
            Ok(token) => {
                let time = ctx.timestamps.decode(&token).ok().map(|info| info.gen_time);
                (token, time)
            }
            Err(e) => {
                debug!(attribute = %id, occurrence = index, error = %e, "time-stamp token unreadable");
                (Vec::new(), None)
            }
        };

        TimeStampRecord {
            id: id.clone(),
            index,
            time,
            token,
            status: TimeStampStatus::Pending,
            error: None,
        }
    }

    /// Orders and validates every time-stamp, updating `time` as records validate.
    pub fn order_and_validate(&self, ctx: &AttributeContext<'_>, time: &mut VerificationContext) -> TimestampChainOutcome {
        let mut outcome = TimestampChainOutcome {
            records: self.order(ctx),
            ..TimestampChainOutcome::default()
        };

        let only_basic = outcome.records.iter().all(|r| r.id == oids::SIGNATURE_TIMESTAMP);
        let mut at = time.wall_clock();
        let mut main_fixed = false;
        let mut bucket_failures: Vec<VerificationError> = Vec::new();
        let mut bucket_valid = false;
        let mut current: Option<AttributeId> = None;

        for i in 0..outcome.records.len() {
            let id = outcome.records[i].id.clone();
            if current.as_ref().is_some_and(|current| *current != id) {
                flush(&mut outcome, &mut bucket_failures, bucket_valid);
                bucket_valid = false;
            }
            current = Some(id.clone());

            let record_ctx = AttributeContext { time: *time, ..*ctx };
            let record = &mut outcome.records[i];
            self.validate_record(&record_ctx, record, at);

            match record.status {
                TimeStampStatus::Valid => {
                    bucket_valid = true;
                    outcome.has_one_valid = true;
                    if let Some(record_time) = record.time {
                        if id == oids::SIGNATURE_TIMESTAMP {
                            if time.temporary_time_reference().is_none() {
                                time.set_temporary_time_reference(record_time);
                            }
                        } else if !main_fixed {
                            time.set_main_time_reference(record_time);
                            main_fixed = true;
                        }
                        at = record_time;
                    }
                    info!(attribute = %id, time = ?record.time, "time-stamp validated");
                }
                TimeStampStatus::CertPathExpired => outcome.has_one_expired = true,
                TimeStampStatus::Invalid | TimeStampStatus::Pending => outcome.has_one_invalid = true,
            }

            if let Some(error) = &record.error {
                bucket_failures.push(error.clone());
            }
        }
        flush(&mut outcome, &mut bucket_failures, bucket_valid);

        if !outcome.has_one_valid {
            time.reset_to_wall_clock();
        } else if only_basic {
            if let Some(temporary) = time.temporary_time_reference() {
                time.set_main_time_reference(temporary);
            }
        }

        debug!(
            records = outcome.records.len(),
            main_time_reference = %time.main_time_reference(),
            from_timestamp = time.main_from_timestamp(),
            "time-stamp chain processed"
        );
        outcome
    }

    fn validate_record(&self, ctx: &AttributeContext<'_>, record: &mut TimeStampRecord, at: DateTime<Utc>) {
        let id = record.id.clone();
        let invalid = |message: String, cert_path_expired: bool| VerificationError::TimestampInvalid {
            id: id.clone(),
            message,
            cert_path_expired,
        };

        let imprint = self
            .registry
            .get(&id)
            .ok_or_else(|| VerificationError::UnknownAttribute { id: id.clone() })
            .and_then(|entry| {
                let raw = ctx.signature.raw_attribute(&id, record.index)?;
                (entry.validate)(ctx, &raw)
            });
        if let Err(e) = imprint {
            let error = invalid(e.to_string(), false);
            record.status = TimeStampStatus::Invalid;
            record.error = Some(error);
            return;
        }

        let (status, error) = match ctx.timestamps.verify(&record.token, at) {
            Ok(TokenVerification::Valid) => (TimeStampStatus::Valid, None),
            Ok(TokenVerification::CertPathExpired { message }) => {
                (TimeStampStatus::CertPathExpired, Some(invalid(message, true)))
            }
            Ok(TokenVerification::Invalid { message }) => (TimeStampStatus::Invalid, Some(invalid(message, false))),
            Err(e) => (TimeStampStatus::Invalid, Some(invalid(e.to_string(), false))),
        };
        record.status = status;
        record.error = error;
    }
}

/// Closes a bucket: its failures are warnings when one of its records validated, else fatal.
fn flush(outcome: &mut TimestampChainOutcome, failures: &mut Vec<VerificationError>, bucket_valid: bool) {
    if bucket_valid {
        outcome.warnings.append(failures);
    } else {
        outcome.errors.append(failures);
    }
}
