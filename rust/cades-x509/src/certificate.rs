// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Certificate field extraction.

use chrono::{DateTime, Utc};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    #[error("invalid cert DER: {0}")]
    Parse(String),
    #[error("certificate validity out of range")]
    Validity,
}

/// The certificate fields used during signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub der: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    /// Raw `issuer` Name SEQUENCE.
    pub issuer_raw: Vec<u8>,
    /// Serial number content octets as encoded.
    pub serial: Vec<u8>,
    pub spki_der: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

pub fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, CertificateError> {
    let (_, cert) =
        x509_parser::parse_x509_certificate(der).map_err(|e| CertificateError::Parse(e.to_string()))?;

    let validity = cert.validity();
    let not_before =
        DateTime::from_timestamp(validity.not_before.timestamp(), 0).ok_or(CertificateError::Validity)?;
    let not_after =
        DateTime::from_timestamp(validity.not_after.timestamp(), 0).ok_or(CertificateError::Validity)?;

    Ok(CertificateInfo {
        der: der.to_vec(),
        subject: cert.tbs_certificate.subject.to_string(),
        issuer: cert.tbs_certificate.issuer.to_string(),
        issuer_raw: cert.tbs_certificate.issuer.as_raw().to_vec(),
        serial: cert.tbs_certificate.raw_serial().to_vec(),
        spki_der: cert.tbs_certificate.subject_pki.raw.to_vec(),
        not_before,
        not_after,
    })
}

/// Subject DN of a certificate, when it parses.
pub fn subject_name(der: &[u8]) -> Option<String> {
    parse_certificate(der).ok().map(|c| c.subject)
}

/// Certificates compare by their complete encoding.
pub fn same_certificate(a: &[u8], b: &[u8]) -> bool {
    a == b
}
