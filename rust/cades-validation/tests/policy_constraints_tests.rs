// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod common;

use cades_abstractions::{
    oids, AlgorithmPair, CertificateInclusion, ContentModeRequirement, DecodedSignature, MinKeyLength,
    PolicyConstraintSet, SignedContent, SigningPeriod,
};
use cades_validation::{check_certificate_inclusion, PolicyConstraint, PolicyConstraintChecker, VerificationError};
use cades_x509::RustCryptoIntegrityVerifier;
use common::{now, utc, Signer256};

fn open_period() -> Option<SigningPeriod> {
    Some(SigningPeriod {
        not_before: utc(2000, 1, 1),
        not_after: None,
    })
}

fn constraints(configure: impl FnOnce(&mut PolicyConstraintSet)) -> PolicyConstraintSet {
    let mut set = PolicyConstraintSet {
        signing_period: open_period(),
        ..PolicyConstraintSet::default()
    };
    configure(&mut set);
    set
}

fn violated(errors: &[VerificationError]) -> Vec<PolicyConstraint> {
    errors
        .iter()
        .map(|e| match e {
            VerificationError::PolicyConstraintViolation { constraint, .. } => *constraint,
            other => panic!("unexpected finding {other}"),
        })
        .collect()
}

fn rsa_signature(bytes: usize) -> DecodedSignature {
    DecodedSignature::new(vec![0x11; bytes])
        .with_signature_algorithm(oids::SHA256_WITH_RSA)
        .with_content(SignedContent::Embedded(b"x".to_vec()))
}

#[test]
fn compliant_signature_has_no_findings() {
    let signer = Signer256::generate();
    let sig = signer.basic_signature();
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);

    let set = constraints(|c| {
        c.accepted_algorithms = vec![AlgorithmPair::new(oids::SHA256, oids::ECDSA_WITH_SHA256)];
        c.min_key_lengths = vec![MinKeyLength {
            algorithm: None,
            bits: 2048,
        }];
        c.content_mode = ContentModeRequirement::Internal;
    });

    assert!(checker.check(&set, &sig, Some(signer.cert_der.as_slice()), now()).is_empty());
}

#[test]
fn content_mode_requirement_is_enforced() {
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);
    let attached = DecodedSignature::new(vec![1]).with_content(SignedContent::Embedded(b"x".to_vec()));
    let detached = DecodedSignature::new(vec![1]);

    let external = constraints(|c| c.content_mode = ContentModeRequirement::External);
    assert_eq!(
        violated(&checker.check(&external, &attached, None, now())),
        vec![PolicyConstraint::ContentMode]
    );
    assert!(checker.check(&external, &detached, None, now()).is_empty());

    let either = constraints(|_| {});
    assert!(checker.check(&either, &attached, None, now()).is_empty());
    assert!(checker.check(&either, &detached, None, now()).is_empty());
}

#[test]
fn signing_period_is_checked_at_the_time_reference() {
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);
    let sig = DecodedSignature::new(vec![1]);

    let bounded = constraints(|c| {
        c.signing_period = Some(SigningPeriod {
            not_before: utc(2020, 1, 1),
            not_after: Some(utc(2025, 1, 1)),
        })
    });
    assert!(checker.check(&bounded, &sig, None, utc(2024, 1, 1)).is_empty());
    assert_eq!(
        violated(&checker.check(&bounded, &sig, None, utc(2026, 1, 1))),
        vec![PolicyConstraint::SigningPeriod]
    );
    assert_eq!(
        violated(&checker.check(&bounded, &sig, None, utc(2019, 1, 1))),
        vec![PolicyConstraint::SigningPeriod]
    );
}

#[test]
fn missing_signing_period_is_a_violation() {
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);
    let sig = DecodedSignature::new(vec![1]);

    let set = constraints(|c| c.signing_period = None);
    assert_eq!(
        violated(&checker.check(&set, &sig, None, now())),
        vec![PolicyConstraint::SigningPeriod]
    );
}

#[test]
fn rsa_key_length_is_derived_from_the_signature_value() {
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);

    let set = constraints(|c| {
        c.min_key_lengths = vec![MinKeyLength {
            algorithm: None,
            bits: 2048,
        }]
    });
    assert_eq!(
        violated(&checker.check(&set, &rsa_signature(128), None, now())),
        vec![PolicyConstraint::KeyLength]
    );
    assert!(checker.check(&set, &rsa_signature(256), None, now()).is_empty());
}

#[test]
fn key_length_entries_for_other_algorithms_are_ignored() {
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);

    let set = constraints(|c| {
        c.min_key_lengths = vec![
            MinKeyLength {
                algorithm: Some(oids::SHA512_WITH_RSA.to_string()),
                bits: 4096,
            },
            MinKeyLength {
                algorithm: Some(oids::SHA256_WITH_RSA.to_string()),
                bits: 1024,
            },
        ]
    });
    assert!(checker.check(&set, &rsa_signature(128), None, now()).is_empty());
}

#[test]
fn key_length_does_not_apply_to_ecdsa() {
    let signer = Signer256::generate();
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);

    let set = constraints(|c| {
        c.min_key_lengths = vec![MinKeyLength {
            algorithm: None,
            bits: 4096,
        }]
    });
    assert!(checker
        .check(&set, &signer.basic_signature(), Some(signer.cert_der.as_slice()), now())
        .is_empty());
}

#[test]
fn signature_must_verify_under_an_accepted_algorithm() {
    let signer = Signer256::generate();
    let sig = signer.basic_signature();
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);

    let rsa_only = constraints(|c| {
        c.accepted_algorithms = vec![AlgorithmPair::new(oids::SHA256, oids::SHA256_WITH_RSA)]
    });
    assert_eq!(
        violated(&checker.check(&rsa_only, &sig, Some(signer.cert_der.as_slice()), now())),
        vec![PolicyConstraint::Algorithm]
    );

    let any_of = constraints(|c| {
        c.accepted_algorithms = vec![
            AlgorithmPair::new(oids::SHA256, oids::SHA256_WITH_RSA),
            AlgorithmPair::new(oids::SHA256, oids::ECDSA_WITH_SHA256),
        ]
    });
    assert!(checker.check(&any_of, &sig, Some(signer.cert_der.as_slice()), now()).is_empty());

    assert_eq!(
        violated(&checker.check(&any_of, &sig, None, now())),
        vec![PolicyConstraint::Algorithm]
    );
}

#[test]
fn all_violations_are_reported_together() {
    let verifier = RustCryptoIntegrityVerifier;
    let checker = PolicyConstraintChecker::new(&verifier, None);

    let set = PolicyConstraintSet {
        content_mode: ContentModeRequirement::External,
        min_key_lengths: vec![MinKeyLength {
            algorithm: None,
            bits: 2048,
        }],
        ..PolicyConstraintSet::default()
    };
    assert_eq!(
        violated(&checker.check(&set, &rsa_signature(128), None, now())),
        vec![
            PolicyConstraint::ContentMode,
            PolicyConstraint::KeyLength,
            PolicyConstraint::SigningPeriod,
        ]
    );
}

#[test]
fn inclusion_none_accepts_anything() {
    assert!(check_certificate_inclusion(CertificateInclusion::None, &[], None, &[]).is_empty());
}

#[test]
fn inclusion_signer_only_requires_exactly_the_signer() {
    let signer = vec![1, 2, 3];
    let other = vec![4, 5, 6];

    assert!(check_certificate_inclusion(
        CertificateInclusion::SignerOnly,
        &[signer.clone()],
        Some(signer.as_slice()),
        &[]
    )
    .is_empty());

    for embedded in [vec![], vec![other.clone()], vec![signer.clone(), other.clone()]] {
        assert_eq!(
            violated(&check_certificate_inclusion(
                CertificateInclusion::SignerOnly,
                &embedded,
                Some(signer.as_slice()),
                &[]
            )),
            vec![PolicyConstraint::CertificateInclusion]
        );
    }

    assert_eq!(
        check_certificate_inclusion(CertificateInclusion::SignerOnly, &[signer.clone()], None, &[]).len(),
        1
    );
}

#[test]
fn inclusion_full_path_requires_every_path_certificate() {
    let leaf = vec![1];
    let intermediate = vec![2];
    let root = vec![3];
    let path = vec![leaf.clone(), intermediate.clone(), root.clone()];

    assert!(check_certificate_inclusion(
        CertificateInclusion::FullPath,
        &[root.clone(), leaf.clone(), intermediate.clone()],
        Some(leaf.as_slice()),
        &path
    )
    .is_empty());

    assert_eq!(
        check_certificate_inclusion(
            CertificateInclusion::FullPath,
            &[leaf.clone(), intermediate.clone()],
            Some(leaf.as_slice()),
            &path
        )
        .len(),
        1
    );
    assert_eq!(
        check_certificate_inclusion(
            CertificateInclusion::FullPath,
            &[leaf.clone(), intermediate.clone(), vec![9]],
            Some(leaf.as_slice()),
            &path
        )
        .len(),
        1
    );
    assert_eq!(
        check_certificate_inclusion(CertificateInclusion::FullPath, &[leaf.clone()], Some(leaf.as_slice()), &[]).len(),
        1
    );
}
