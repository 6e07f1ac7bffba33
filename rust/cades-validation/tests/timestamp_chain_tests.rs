// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tests for time-stamp ordering, validation and time reference selection.

mod common;

use std::sync::Mutex;

use cades_abstractions::asn1::{self, Tag};
use cades_abstractions::{
    oids, AttributeId, DecodedSignature, SignedContent, StaticPolicy, TimeStampTokenError, TimeStampTokenInfo,
    TimeStampTokenVerifier, TokenVerification,
};
use cades_validation::{
    default_priority, AttributeRegistry, ErrorKind, HashChainComputer, TimeStampStatus, TimestampChainValidator,
    UnsignedAttrsEncoding, VerificationContext, VerificationError,
};
use chrono::{DateTime, Utc};
use common::{
    attr, context, now, registry_without_imprints, sha256, timestamp_attr, utc, StubTokens, CONTENT,
};

fn signature() -> DecodedSignature {
    DecodedSignature::new(vec![0x5A; 64]).with_content(SignedContent::Embedded(CONTENT.to_vec()))
}

/// Forwards to [`StubTokens`], recording the time each token was verified at.
#[derive(Default)]
struct RecordingTokens {
    verified_at: Mutex<Vec<DateTime<Utc>>>,
}

impl TimeStampTokenVerifier for RecordingTokens {
    fn decode(&self, token: &[u8]) -> Result<TimeStampTokenInfo, TimeStampTokenError> {
        StubTokens.decode(token)
    }

    fn verify(&self, token: &[u8], at: DateTime<Utc>) -> Result<TokenVerification, TimeStampTokenError> {
        self.verified_at.lock().unwrap().push(at);
        StubTokens.verify(token, at)
    }
}

#[test]
fn order_groups_by_priority_then_most_recent_first() {
    let sig = signature()
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &[1; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 1, 1), &[2; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 6, 1), &[3; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::ARCHIVE_TIMESTAMP_V2, utc(2027, 1, 1), &[4; 32], 0));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = AttributeRegistry::cades_default();
    let priority = default_priority();

    let records = TimestampChainValidator::new(&registry, &priority).order(&context(&sig, &policy, &tokens));

    let order: Vec<(&str, Option<DateTime<Utc>>)> =
        records.iter().map(|r| (r.id.as_str(), r.time)).collect();
    assert_eq!(
        order,
        vec![
            (oids::ARCHIVE_TIMESTAMP_V2, Some(utc(2027, 1, 1))),
            (oids::ESC_TIMESTAMP, Some(utc(2026, 1, 1))),
            (oids::SIGNATURE_TIMESTAMP, Some(utc(2025, 6, 1))),
            (oids::SIGNATURE_TIMESTAMP, Some(utc(2025, 1, 1))),
        ]
    );
    assert!(records.iter().all(|r| r.status == TimeStampStatus::Pending));
}

#[test]
fn order_keeps_declaration_order_for_ties_and_puts_unreadable_last() {
    let sig = signature()
        .with_unsigned_attribute(attr(oids::SIGNATURE_TIMESTAMP, asn1::encode_octet_string(b"garbage").unwrap()))
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &[1; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &[2; 32], 0));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = AttributeRegistry::cades_default();
    let priority = default_priority();

    let records = TimestampChainValidator::new(&registry, &priority).order(&context(&sig, &policy, &tokens));

    let indexes: Vec<usize> = records.iter().map(|r| r.index).collect();
    assert_eq!(indexes, vec![1, 2, 0]);
    assert_eq!(records[2].time, None);
}

#[test]
fn identifiers_outside_the_priority_list_are_ignored() {
    let sig = signature()
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &[1; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 1, 1), &[2; 32], 0));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = AttributeRegistry::cades_default();
    let priority = vec![AttributeId::new(oids::ESC_TIMESTAMP)];

    let records = TimestampChainValidator::new(&registry, &priority).order(&context(&sig, &policy, &tokens));

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, oids::ESC_TIMESTAMP);
}

#[test]
fn first_valid_non_basic_timestamp_sets_main_reference() {
    let sig = signature()
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &[1; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 3, 1), &[1; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 1, 1), &[2; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::ARCHIVE_TIMESTAMP_V2, utc(2027, 1, 1), &[3; 32], 0));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = registry_without_imprints();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    let outcome = TimestampChainValidator::new(&registry, &priority)
        .order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    assert!(outcome.has_one_valid);
    assert!(!outcome.has_one_invalid);
    assert!(!outcome.has_one_expired);
    assert!(outcome.errors.is_empty());
    assert!(outcome.warnings.is_empty());
    assert!(outcome.records.iter().all(|r| r.is_valid()));

    assert_eq!(time.main_time_reference(), utc(2027, 1, 1));
    assert!(time.main_from_timestamp());
    assert_eq!(time.temporary_time_reference(), Some(utc(2025, 3, 1)));
    assert_eq!(time.grace_time(), utc(2025, 3, 1));
}

#[test]
fn main_reference_falls_through_to_lower_priority_when_archive_fails() {
    let sig = signature()
        .with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 1, 1), &[2; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::ARCHIVE_TIMESTAMP_V2, utc(2027, 1, 1), &[3; 32], 2));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = registry_without_imprints();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    let outcome = TimestampChainValidator::new(&registry, &priority)
        .order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    assert_eq!(time.main_time_reference(), utc(2026, 1, 1));
    assert!(outcome.has_one_valid);
    assert!(outcome.has_one_invalid);
    // The archive bucket had no valid record, so its failure is fatal.
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].kind(), ErrorKind::TimestampInvalid);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn failures_in_a_bucket_with_a_valid_record_are_warnings() {
    let sig = signature()
        .with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 1, 1), &[2; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 6, 1), &[2; 32], 2));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = registry_without_imprints();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    let outcome = TimestampChainValidator::new(&registry, &priority)
        .order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.has_one_valid);
    assert!(outcome.has_one_invalid);
    // The newer record failed; the older one fixed the reference.
    assert_eq!(outcome.records[0].status, TimeStampStatus::Invalid);
    assert_eq!(time.main_time_reference(), utc(2026, 1, 1));
}

#[test]
fn no_valid_timestamp_resets_main_reference_to_wall_clock() {
    let sig = signature()
        .with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 1, 1), &[2; 32], 2))
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &[1; 32], 2));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = registry_without_imprints();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    let outcome = TimestampChainValidator::new(&registry, &priority)
        .order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    assert!(!outcome.has_one_valid);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(time.main_time_reference(), now());
    assert!(!time.main_from_timestamp());
    assert_eq!(time.temporary_time_reference(), None);
}

#[test]
fn expired_authority_path_is_flagged_separately() {
    let sig = signature().with_unsigned_attribute(timestamp_attr(
        oids::ESC_TIMESTAMP,
        utc(2026, 1, 1),
        &[2; 32],
        1,
    ));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = registry_without_imprints();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    let outcome = TimestampChainValidator::new(&registry, &priority)
        .order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    assert!(outcome.has_one_expired);
    assert!(!outcome.has_one_invalid);
    assert!(!outcome.has_one_valid);
    assert_eq!(outcome.records[0].status, TimeStampStatus::CertPathExpired);
    assert!(matches!(
        outcome.errors.as_slice(),
        [VerificationError::TimestampInvalid {
            cert_path_expired: true,
            ..
        }]
    ));
}

#[test]
fn only_basic_timestamps_promote_the_temporary_reference() {
    let sig = signature()
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &[1; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 9, 1), &[1; 32], 0));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = registry_without_imprints();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    TimestampChainValidator::new(&registry, &priority).order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    assert_eq!(time.temporary_time_reference(), Some(utc(2025, 9, 1)));
    assert_eq!(time.main_time_reference(), utc(2025, 9, 1));
}

#[test]
fn each_token_is_verified_at_the_previous_valid_time() {
    let sig = signature()
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &[1; 32], 0))
        .with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 1, 1), &[2; 32], 2))
        .with_unsigned_attribute(timestamp_attr(oids::ARCHIVE_TIMESTAMP_V2, utc(2027, 1, 1), &[3; 32], 0));
    let policy = StaticPolicy::default();
    let tokens = RecordingTokens::default();
    let registry = registry_without_imprints();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    TimestampChainValidator::new(&registry, &priority).order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    let at = tokens.verified_at.lock().unwrap().clone();
    // The failed escTimeStamp does not move the verification time.
    assert_eq!(at, vec![now(), utc(2027, 1, 1), utc(2027, 1, 1)]);
}

#[test]
fn signature_timestamp_imprint_is_checked_against_the_signature_value() {
    let sig = signature();
    let imprint = sha256(&[0x5A; 64]);
    let sig = sig
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &imprint, 0))
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 2, 1), &[0; 32], 0));
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = AttributeRegistry::cades_default();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    let outcome = TimestampChainValidator::new(&registry, &priority)
        .order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    assert_eq!(outcome.records[0].time, Some(utc(2025, 2, 1)));
    assert_eq!(outcome.records[0].status, TimeStampStatus::Invalid);
    assert!(outcome.records[0]
        .error
        .as_ref()
        .is_some_and(|e| e.to_string().contains("imprint")));
    assert!(outcome.records[1].is_valid());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(time.temporary_time_reference(), Some(utc(2025, 1, 1)));
}

#[test]
fn esc_timestamp_imprint_covers_signature_and_references() {
    let base = signature()
        .with_unsigned_attribute(timestamp_attr(oids::SIGNATURE_TIMESTAMP, utc(2025, 1, 1), &sha256(&[0x5A; 64]), 0))
        .with_unsigned_attribute(attr(oids::CERTIFICATE_REFS, vec![0x30, 0x00]))
        .with_unsigned_attribute(attr(oids::REVOCATION_REFS, vec![0x30, 0x00]));
    let tokens = StubTokens;
    let imprint = HashChainComputer::new(&base, &tokens, None)
        .sig_and_refs_hash(oids::SHA256)
        .unwrap();
    let sig = base.with_unsigned_attribute(timestamp_attr(oids::ESC_TIMESTAMP, utc(2026, 1, 1), &imprint, 0));
    let policy = StaticPolicy::default();
    let registry = AttributeRegistry::cades_default();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    let outcome = TimestampChainValidator::new(&registry, &priority)
        .order_and_validate(&context(&sig, &policy, &tokens), &mut time);

    assert!(outcome.records.iter().all(|r| r.is_valid()));
    assert_eq!(time.main_time_reference(), utc(2026, 1, 1));
}

fn archived(encoding: UnsignedAttrsEncoding) -> DecodedSignature {
    let base = signature().with_unsigned_attribute(attr(oids::CERTIFICATE_REFS, vec![0x30, 0x00]));
    let imprint = HashChainComputer::new(&base, &StubTokens, None)
        .archive_timestamp_hash(oids::SHA256, None, encoding)
        .unwrap();
    base.with_unsigned_attribute(timestamp_attr(oids::ARCHIVE_TIMESTAMP_V2, utc(2027, 1, 1), &imprint, 0))
}

#[test]
fn archive_imprint_matches_configured_encoding() {
    let sig = archived(UnsignedAttrsEncoding::ElementWise);
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = AttributeRegistry::cades_default();
    let priority = default_priority();
    let mut time = VerificationContext::new(now());

    let mut ctx = context(&sig, &policy, &tokens);
    ctx.archive_hash.fallback = false;
    let outcome = TimestampChainValidator::new(&registry, &priority).order_and_validate(&ctx, &mut time);

    assert!(outcome.records[0].is_valid());
    assert_eq!(time.main_time_reference(), utc(2027, 1, 1));
}

#[test]
fn archive_imprint_falls_back_to_the_other_encoding() {
    let sig = archived(UnsignedAttrsEncoding::TaggedBlob);
    let policy = StaticPolicy::default();
    let tokens = StubTokens;
    let registry = AttributeRegistry::cades_default();
    let priority = default_priority();

    let mut time = VerificationContext::new(now());
    let ctx = context(&sig, &policy, &tokens);
    assert_eq!(ctx.archive_hash.encoding, UnsignedAttrsEncoding::ElementWise);
    assert!(ctx.archive_hash.fallback);
    let outcome = TimestampChainValidator::new(&registry, &priority).order_and_validate(&ctx, &mut time);
    assert!(outcome.records[0].is_valid());

    let mut time = VerificationContext::new(now());
    let mut strict = context(&sig, &policy, &tokens);
    strict.archive_hash.fallback = false;
    let outcome = TimestampChainValidator::new(&registry, &priority).order_and_validate(&strict, &mut time);
    assert_eq!(outcome.records[0].status, TimeStampStatus::Invalid);
    assert_eq!(time.main_time_reference(), now());
}
