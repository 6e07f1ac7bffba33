// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signer signature verification using the RustCrypto stack.
//!
//! Supported:
//! - RSASSA-PKCS1-v1_5 with SHA-1/224/256/384/512 (`rsaEncryption` or the combined OIDs)
//! - ECDSA over P-256 and P-384 (`id-ecPublicKey` or the combined OIDs), any supported digest
//!
//! CMS signs the DER of the signed attributes (or the content itself), so ECDSA is
//! verified over a prehash computed with the SignerInfo digest algorithm.

use cades_abstractions::{oids, AlgorithmPair, IntegrityError, IntegrityVerifier};
use p256::elliptic_curve::sec1::ToEncodedPoint as _;
use rsa::pkcs1v15;
use rsa::pkcs8::DecodePublicKey as _;
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use signature::hazmat::PrehashVerifier as _;
use signature::Verifier as _;

use crate::certificate::parse_certificate;
use crate::digest::DigestAlgorithm;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ecdsa,
}

/// Maps a signature algorithm OID to its key family and, for combined OIDs, the implied digest.
fn signature_scheme(oid: &str) -> Option<(KeyFamily, Option<DigestAlgorithm>)> {
    let scheme = match oid.trim() {
        oids::RSA_ENCRYPTION => (KeyFamily::Rsa, None),
        oids::SHA1_WITH_RSA => (KeyFamily::Rsa, Some(DigestAlgorithm::Sha1)),
        oids::SHA224_WITH_RSA => (KeyFamily::Rsa, Some(DigestAlgorithm::Sha224)),
        oids::SHA256_WITH_RSA => (KeyFamily::Rsa, Some(DigestAlgorithm::Sha256)),
        oids::SHA384_WITH_RSA => (KeyFamily::Rsa, Some(DigestAlgorithm::Sha384)),
        oids::SHA512_WITH_RSA => (KeyFamily::Rsa, Some(DigestAlgorithm::Sha512)),
        oids::EC_PUBLIC_KEY => (KeyFamily::Ecdsa, None),
        oids::ECDSA_WITH_SHA1 => (KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha1)),
        oids::ECDSA_WITH_SHA224 => (KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha224)),
        oids::ECDSA_WITH_SHA256 => (KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha256)),
        oids::ECDSA_WITH_SHA384 => (KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha384)),
        oids::ECDSA_WITH_SHA512 => (KeyFamily::Ecdsa, Some(DigestAlgorithm::Sha512)),
        _ => return None,
    };
    Some(scheme)
}

/// True when the OID names an RSA signature scheme.
pub fn is_rsa_signature_algorithm(oid: &str) -> bool {
    matches!(signature_scheme(oid), Some((KeyFamily::Rsa, _)))
}

fn rsa_public_key_from_spki(spki_der: &[u8]) -> Result<RsaPublicKey, IntegrityError> {
    RsaPublicKey::from_public_key_der(spki_der).map_err(|e| IntegrityError::InvalidKey(format!("bad RSA public key: {e}")))
}

fn verify_rsa(
    spki_der: &[u8],
    digest: DigestAlgorithm,
    signed_bytes: &[u8],
    signature: &[u8],
) -> Result<(), IntegrityError> {
    let key = rsa_public_key_from_spki(spki_der)?;
    let sig = pkcs1v15::Signature::try_from(signature)
        .map_err(|e| IntegrityError::InvalidSignatureEncoding(format!("bad RSA signature bytes: {e}")))?;

    let verified = match digest {
        DigestAlgorithm::Sha1 => pkcs1v15::VerifyingKey::<Sha1>::new(key).verify(signed_bytes, &sig),
        DigestAlgorithm::Sha224 => pkcs1v15::VerifyingKey::<Sha224>::new(key).verify(signed_bytes, &sig),
        DigestAlgorithm::Sha256 => pkcs1v15::VerifyingKey::<Sha256>::new(key).verify(signed_bytes, &sig),
        DigestAlgorithm::Sha384 => pkcs1v15::VerifyingKey::<Sha384>::new(key).verify(signed_bytes, &sig),
        DigestAlgorithm::Sha512 => pkcs1v15::VerifyingKey::<Sha512>::new(key).verify(signed_bytes, &sig),
    };
    verified.map_err(|_| IntegrityError::SignatureMismatch)
}

fn verify_ecdsa(
    spki_der: &[u8],
    digest: DigestAlgorithm,
    signed_bytes: &[u8],
    signature: &[u8],
) -> Result<(), IntegrityError> {
    let prehash = digest.digest(signed_bytes);

    if let Ok(pk) = p256::PublicKey::from_public_key_der(spki_der) {
        let ep = pk.to_encoded_point(false);
        let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(ep.as_bytes())
            .map_err(|e| IntegrityError::InvalidKey(format!("bad P-256 public key: {e}")))?;
        let sig = p256::ecdsa::Signature::from_der(signature)
            .map_err(|e| IntegrityError::InvalidSignatureEncoding(format!("bad ECDSA signature bytes: {e}")))?;
        return vk.verify_prehash(&prehash, &sig).map_err(|_| IntegrityError::SignatureMismatch);
    }

    if let Ok(pk) = p384::PublicKey::from_public_key_der(spki_der) {
        let ep = pk.to_encoded_point(false);
        let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(ep.as_bytes())
            .map_err(|e| IntegrityError::InvalidKey(format!("bad P-384 public key: {e}")))?;
        let sig = p384::ecdsa::Signature::from_der(signature)
            .map_err(|e| IntegrityError::InvalidSignatureEncoding(format!("bad ECDSA signature bytes: {e}")))?;
        return vk.verify_prehash(&prehash, &sig).map_err(|_| IntegrityError::SignatureMismatch);
    }

    Err(IntegrityError::InvalidKey("unsupported EC curve".to_string()))
}

/// Default [`IntegrityVerifier`] backed by `rsa`, `p256` and `p384`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoIntegrityVerifier;

impl IntegrityVerifier for RustCryptoIntegrityVerifier {
    fn verify(
        &self,
        signer_certificate: &[u8],
        algorithm: &AlgorithmPair,
        signed_bytes: &[u8],
        signature: &[u8],
    ) -> Result<(), IntegrityError> {
        let cert = parse_certificate(signer_certificate).map_err(|e| IntegrityError::InvalidKey(e.to_string()))?;

        let digest = DigestAlgorithm::from_oid(&algorithm.digest_algorithm)
            .ok_or_else(|| IntegrityError::UnsupportedAlgorithm(algorithm.digest_algorithm.clone()))?;
        let (family, implied) = signature_scheme(&algorithm.signature_algorithm)
            .ok_or_else(|| IntegrityError::UnsupportedAlgorithm(algorithm.signature_algorithm.clone()))?;

        if implied.is_some_and(|implied| implied != digest) {
            return Err(IntegrityError::AlgorithmMismatch {
                digest_algorithm: algorithm.digest_algorithm.clone(),
                signature_algorithm: algorithm.signature_algorithm.clone(),
            });
        }

        match family {
            KeyFamily::Rsa => verify_rsa(&cert.spki_der, digest, signed_bytes, signature),
            KeyFamily::Ecdsa => verify_ecdsa(&cert.spki_der, digest, signed_bytes, signature),
        }
    }
}
