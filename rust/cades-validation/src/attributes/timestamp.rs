// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Time-stamp imprint checks.
//!
//! These only check that a token covers the right bytes. Token signatures and
//! authority paths are checked by the time-stamp chain through the token verifier.

use cades_abstractions::{RawAttribute, TimeStampTokenInfo};
use tracing::debug;

use super::single_value;
use crate::error::VerificationError;
use crate::hash_chain::digest;
use crate::registry::AttributeContext;

/// The token (`ContentInfo`) carried by a time-stamp attribute.
pub(crate) fn token_bytes(raw: &RawAttribute) -> Result<Vec<u8>, VerificationError> {
    Ok(single_value(raw)?.raw.to_vec())
}

fn decode(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<TimeStampTokenInfo, VerificationError> {
    let token = token_bytes(raw)?;
    ctx.timestamps
        .decode(&token)
        .map_err(|e| VerificationError::build_failure(raw.id(), e))
}

fn imprint_mismatch(raw: &RawAttribute) -> VerificationError {
    VerificationError::invalid(raw.id(), "message imprint does not match the time-stamped data")
}

/// Covers the signature value.
pub fn signature_timestamp(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let info = decode(ctx, raw)?;
    let expected = digest(&info.imprint_algorithm, ctx.signature.signature_value())?;
    if info.imprint != expected {
        return Err(imprint_mismatch(raw));
    }
    Ok(())
}

/// Covers the signature value, signature time-stamp and complete references.
pub fn esc_timestamp(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let info = decode(ctx, raw)?;
    let expected = ctx.hash_chain().sig_and_refs_hash(&info.imprint_algorithm)?;
    if info.imprint != expected {
        return Err(imprint_mismatch(raw));
    }
    Ok(())
}

/// Covers the whole signature as it stood before this time-stamp was added.
pub fn archive_timestamp_v2(ctx: &AttributeContext<'_>, raw: &RawAttribute) -> Result<(), VerificationError> {
    let info = decode(ctx, raw)?;
    let chain = ctx.hash_chain();
    let encoding = ctx.archive_hash.encoding;

    let expected = chain.archive_timestamp_hash_before(&info.imprint_algorithm, info.gen_time, encoding)?;
    if info.imprint == expected {
        return Ok(());
    }

    if ctx.archive_hash.fallback {
        let alternate =
            chain.archive_timestamp_hash_before(&info.imprint_algorithm, info.gen_time, encoding.other())?;
        if info.imprint == alternate {
            debug!(encoding = ?encoding.other(), "archive time-stamp matched with the alternate unsigned attribute encoding");
            return Ok(());
        }
    }

    Err(imprint_mismatch(raw))
}
