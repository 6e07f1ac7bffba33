// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(dead_code)]

//! Shared fixtures for the `cades-validation` integration tests.
//!
//! Signatures are assembled with `DecodedSignature` and signed with a freshly
//! generated P-256 key. Time-stamp tokens use a small stand-in format understood by
//! [`StubTokens`]: `SEQUENCE { genTime GeneralizedTime, hashAlgorithm OID,
//! imprint OCTET STRING, status INTEGER }` where status 0 is valid, 1 is an expired
//! authority path and anything else is invalid.

use std::sync::{Arc, Mutex};

use cades_abstractions::asn1::{self, Tag};
use cades_abstractions::{
    oids, AttributeView, CertOracle, CertOracleError, CertValidationResult, DecodedSignature, PolicyOracle,
    RawAttribute, RevocationRequirement, SignedContent, SigningPeriod, StaticPolicy, TimeStampTokenError,
    TimeStampTokenInfo, TimeStampTokenVerifier, TokenVerification,
};
use cades_validation::{
    ArchiveHashOptions, AttributeContext, AttributeEntry, AttributeKind, AttributeRegistry, SignatureVerifier,
    VerificationContext, VerificationError,
};
use chrono::{DateTime, TimeZone, Utc};
use p256::ecdsa::signature::Signer;
use sha2::{Digest, Sha256};

pub const CONTENT: &[u8] = b"quarterly report";

pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// Wall clock used by every verification in the tests.
pub fn now() -> DateTime<Utc> {
    utc(2030, 1, 1)
}

pub fn sha256(bytes: &[u8]) -> Vec<u8> {
    let mut h = Sha256::new();
    h.update(bytes);
    h.finalize().to_vec()
}

pub fn attr(id: &str, value: Vec<u8>) -> RawAttribute {
    RawAttribute::new(id, &[value]).unwrap()
}

pub fn content_type_attr() -> RawAttribute {
    attr(oids::CONTENT_TYPE, asn1::encode_oid(oids::ID_DATA).unwrap())
}

pub fn message_digest_attr(content: &[u8]) -> RawAttribute {
    attr(oids::MESSAGE_DIGEST, asn1::encode_octet_string(&sha256(content)).unwrap())
}

pub fn signing_time_attr(time: DateTime<Utc>) -> RawAttribute {
    attr(oids::SIGNING_TIME, asn1::encode_generalized_time(&time).unwrap())
}

pub struct Signer256 {
    pub cert_der: Vec<u8>,
    pub key: p256::ecdsa::SigningKey,
}

impl Signer256 {
    pub fn generate() -> Self {
        Self::with_names(&[(rcgen::DnType::CommonName, "Test Signer")])
    }

    /// Self-signed signer whose subject (and issuer) has one RDN per entry, in order.
    pub fn with_names(names: &[(rcgen::DnType, &str)]) -> Self {
        use p256::pkcs8::DecodePrivateKey as _;

        let mut params = rcgen::CertificateParams::new(vec!["signer.example".to_string()]).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        for (kind, value) in names {
            params.distinguished_name.push(kind.clone(), *value);
        }
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key_pair).unwrap();
        let key = p256::ecdsa::SigningKey::from_pkcs8_der(&key_pair.serialize_der()).unwrap();
        Self {
            cert_der: cert.der().to_vec(),
            key,
        }
    }

    /// Builds an attached-content signature over `signed_attrs`, signed with this key.
    pub fn sign(&self, content: &[u8], signed_attrs: Vec<RawAttribute>) -> DecodedSignature {
        let set = asn1::encode_constructed(Tag::Set, signed_attrs.iter().map(RawAttribute::as_der)).unwrap();
        let signature: p256::ecdsa::Signature = self.key.sign(&set);

        let mut sig = DecodedSignature::new(signature.to_der().as_bytes().to_vec())
            .with_content(SignedContent::Embedded(content.to_vec()))
            .with_signer_certificate(self.cert_der.clone());
        for attribute in signed_attrs {
            sig = sig.with_signed_attribute(attribute);
        }
        sig
    }

    /// A signature carrying content type, message digest and signing time.
    pub fn basic_signature(&self) -> DecodedSignature {
        self.sign(
            CONTENT,
            vec![
                content_type_attr(),
                message_digest_attr(CONTENT),
                signing_time_attr(utc(2024, 6, 1)),
            ],
        )
    }
}

pub fn stub_token(time: DateTime<Utc>, imprint: &[u8], status: u8) -> Vec<u8> {
    let gen_time = asn1::encode_generalized_time(&time).unwrap();
    let algorithm = asn1::encode_oid(oids::SHA256).unwrap();
    let imprint = asn1::encode_octet_string(imprint).unwrap();
    let status = asn1::encode_tlv(Tag::Integer, &[status]).unwrap();
    asn1::encode_constructed(
        Tag::Sequence,
        [gen_time.as_slice(), algorithm.as_slice(), imprint.as_slice(), status.as_slice()],
    ).unwrap()
}

pub fn timestamp_attr(id: &str, time: DateTime<Utc>, imprint: &[u8], status: u8) -> RawAttribute {
    attr(id, stub_token(time, imprint, status))
}

/// Token decoder and verifier for [`stub_token`] tokens.
#[derive(Default)]
pub struct StubTokens;

impl StubTokens {
    fn fields(token: &[u8]) -> Result<(TimeStampTokenInfo, u8), TimeStampTokenError> {
        let malformed = |e: asn1::Error| TimeStampTokenError::Malformed(e.to_string());
        let seq = asn1::read_single(token).map_err(malformed)?;
        let parts = seq.children().map_err(malformed)?;
        let [time, algorithm, imprint, status] = parts.as_slice() else {
            return Err(TimeStampTokenError::Malformed("unexpected layout".to_string()));
        };

        let info = TimeStampTokenInfo {
            gen_time: time.time().map_err(malformed)?,
            imprint_algorithm: algorithm.oid().map_err(malformed)?,
            imprint: imprint.value.to_vec(),
            authority: Some("CN=Test TSA".to_string()),
        };
        Ok((info, status.value.first().copied().unwrap_or(2)))
    }
}

impl TimeStampTokenVerifier for StubTokens {
    fn decode(&self, token: &[u8]) -> Result<TimeStampTokenInfo, TimeStampTokenError> {
        Self::fields(token).map(|(info, _)| info)
    }

    fn verify(&self, token: &[u8], _at: DateTime<Utc>) -> Result<TokenVerification, TimeStampTokenError> {
        let (_, status) = Self::fields(token)?;
        Ok(match status {
            0 => TokenVerification::Valid,
            1 => TokenVerification::CertPathExpired {
                message: "authority certificate expired".to_string(),
            },
            _ => TokenVerification::Invalid {
                message: "token signature invalid".to_string(),
            },
        })
    }
}

/// Certificate oracle returning a fixed answer and recording the time references it was asked about.
pub struct StubCertOracle {
    answer: Result<CertValidationResult, CertOracleError>,
    pub seen: Mutex<Vec<DateTime<Utc>>>,
}

impl StubCertOracle {
    pub fn answering(answer: Result<CertValidationResult, CertOracleError>) -> Self {
        Self {
            answer,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn valid(path: Vec<Vec<u8>>) -> Self {
        Self::answering(Ok(CertValidationResult::valid(path)))
    }

    pub fn revoked_at(time: DateTime<Utc>) -> Self {
        Self::answering(Ok(CertValidationResult::revoked(time, Vec::new())))
    }

    pub fn last_time_reference(&self) -> Option<DateTime<Utc>> {
        self.seen.lock().unwrap().last().copied()
    }
}

impl CertOracle for StubCertOracle {
    fn validate(
        &self,
        _certificate: &[u8],
        _trust_anchors: &[Vec<u8>],
        _revocation: RevocationRequirement,
        time_reference: DateTime<Utc>,
    ) -> Result<CertValidationResult, CertOracleError> {
        self.seen.lock().unwrap().push(time_reference);
        self.answer.clone()
    }
}

/// Policy mandating the three basic signed attributes, open-ended signing period.
pub fn basic_policy() -> StaticPolicy {
    StaticPolicy::default().with_options(|p| {
        p.mandated_signed = vec![oids::CONTENT_TYPE.into(), oids::MESSAGE_DIGEST.into(), oids::SIGNING_TIME.into()];
        p.signing_period = Some(SigningPeriod {
            not_before: utc(2000, 1, 1),
            not_after: None,
        });
    })
}

pub fn verifier(policy: StaticPolicy, oracle: Arc<StubCertOracle>) -> SignatureVerifier {
    SignatureVerifier::new(
        Arc::new(policy),
        oracle,
        Arc::new(StubTokens),
        Arc::new(cades_x509::RustCryptoIntegrityVerifier),
    )
    .with_options(|o| o.verification_time = Some(now()))
}

pub fn accept(_ctx: &AttributeContext<'_>, _raw: &RawAttribute) -> Result<(), VerificationError> {
    Ok(())
}

/// Default registry with time-stamp imprint checks replaced by [`accept`].
pub fn registry_without_imprints() -> AttributeRegistry {
    let mut registry = AttributeRegistry::cades_default();
    registry
        .register(
            oids::SIGNATURE_TIMESTAMP,
            AttributeEntry::new("Signature Time Stamp", AttributeKind::TimeStamp, accept),
        )
        .register(
            oids::ESC_TIMESTAMP,
            AttributeEntry::new("CAdES-C Time Stamp", AttributeKind::TimeStamp, accept),
        )
        .register(
            oids::ARCHIVE_TIMESTAMP_V2,
            AttributeEntry::new("Archive Time Stamp V2", AttributeKind::TimeStamp, accept),
        );
    registry
}

pub fn context<'a>(
    signature: &'a dyn AttributeView,
    policy: &'a dyn PolicyOracle,
    tokens: &'a dyn TimeStampTokenVerifier,
) -> AttributeContext<'a> {
    AttributeContext {
        signature,
        policy,
        timestamps: tokens,
        time: VerificationContext::new(now()),
        external_content: None,
        archive_hash: ArchiveHashOptions::default(),
        integrity_verified: true,
    }
}

/// Routes verifier logs to the test harness output. Safe to call from every test.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
