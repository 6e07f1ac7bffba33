// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! X.509 support for CAdES verification.
//!
//! - certificate field extraction (`x509-parser`)
//! - digests keyed by algorithm OID (`sha1`, `sha2`)
//! - the default signer signature verifier (`rsa`, `p256`, `p384`)

pub mod certificate;
pub mod digest;
pub mod integrity;

pub use certificate::{parse_certificate, same_certificate, subject_name, CertificateError, CertificateInfo};
pub use digest::{digest_by_oid, DigestAlgorithm};
pub use integrity::{is_rsa_signature_algorithm, RustCryptoIntegrityVerifier};
