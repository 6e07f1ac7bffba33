// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute identifiers and well-known OIDs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Names an attribute kind (an OID in dotted-decimal form for CAdES).
///
/// Identifiers are trimmed on construction and compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AttributeId(String);

impl AttributeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AttributeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AttributeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<AttributeId> for String {
    fn from(value: AttributeId) -> Self {
        value.0
    }
}

impl PartialEq<str> for AttributeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AttributeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub mod oids {
    // PKCS#9 signed attributes.
    pub const CONTENT_TYPE: &str = "1.2.840.113549.1.9.3";
    pub const MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";
    pub const SIGNING_TIME: &str = "1.2.840.113549.1.9.5";
    pub const COUNTER_SIGNATURE: &str = "1.2.840.113549.1.9.6";

    // ESS / CAdES signed attributes.
    pub const CONTENT_HINT: &str = "1.2.840.113549.1.9.16.2.4";
    pub const SIGNING_CERTIFICATE: &str = "1.2.840.113549.1.9.16.2.12";
    pub const SIG_POLICY_ID: &str = "1.2.840.113549.1.9.16.2.15";
    pub const SIGNER_LOCATION: &str = "1.2.840.113549.1.9.16.2.17";
    pub const SIGNER_ATTR: &str = "1.2.840.113549.1.9.16.2.18";
    pub const SIGNING_CERTIFICATE_V2: &str = "1.2.840.113549.1.9.16.2.47";

    // CAdES unsigned attributes.
    pub const SIGNATURE_TIMESTAMP: &str = "1.2.840.113549.1.9.16.2.14";
    pub const CERTIFICATE_REFS: &str = "1.2.840.113549.1.9.16.2.21";
    pub const REVOCATION_REFS: &str = "1.2.840.113549.1.9.16.2.22";
    pub const CERT_VALUES: &str = "1.2.840.113549.1.9.16.2.23";
    pub const REVOCATION_VALUES: &str = "1.2.840.113549.1.9.16.2.24";
    pub const ESC_TIMESTAMP: &str = "1.2.840.113549.1.9.16.2.25";
    pub const ATTR_CERTIFICATE_REFS: &str = "1.2.840.113549.1.9.16.2.44";
    pub const ATTR_REVOCATION_REFS: &str = "1.2.840.113549.1.9.16.2.45";
    pub const ARCHIVE_TIMESTAMP_V2: &str = "1.2.840.113549.1.9.16.2.48";

    /// Adobe `adbe-revocationInfoArchival`.
    pub const REVOCATION_INFO_ARCHIVAL: &str = "1.2.840.113583.1.1.8";

    // Content types.
    pub const ID_DATA: &str = "1.2.840.113549.1.7.1";
    pub const ID_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";

    // Digest algorithms.
    pub const SHA1: &str = "1.3.14.3.2.26";
    pub const SHA224: &str = "2.16.840.1.101.3.4.2.4";
    pub const SHA256: &str = "2.16.840.1.101.3.4.2.1";
    pub const SHA384: &str = "2.16.840.1.101.3.4.2.2";
    pub const SHA512: &str = "2.16.840.1.101.3.4.2.3";

    // Signature algorithms.
    pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
    pub const SHA1_WITH_RSA: &str = "1.2.840.113549.1.1.5";
    pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
    pub const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
    pub const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";
    pub const SHA224_WITH_RSA: &str = "1.2.840.113549.1.1.14";
    pub const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
    pub const ECDSA_WITH_SHA1: &str = "1.2.840.10045.4.1";
    pub const ECDSA_WITH_SHA224: &str = "1.2.840.10045.4.3.1";
    pub const ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
    pub const ECDSA_WITH_SHA384: &str = "1.2.840.10045.4.3.3";
    pub const ECDSA_WITH_SHA512: &str = "1.2.840.10045.4.3.4";
}
