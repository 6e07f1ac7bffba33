// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Attribute validators.
//!
//! Each validator decodes one attribute occurrence and checks it against the
//! signature and policy. Decoding problems surface as `AttributeBuildFailure`,
//! content problems as `InvalidAttribute` (or a more specific variant).

pub mod signed;
pub mod timestamp;
pub mod unsigned;

use cades_abstractions::asn1::{Error as DerError, Tag, Tlv};
use cades_abstractions::{AttributeId, RawAttribute};

use crate::error::VerificationError;

/// Attaches the attribute identifier to DER decoding failures.
pub(crate) trait Building<T> {
    fn building(self, id: &AttributeId) -> Result<T, VerificationError>;
}

impl<T> Building<T> for Result<T, DerError> {
    fn building(self, id: &AttributeId) -> Result<T, VerificationError> {
        self.map_err(|e| VerificationError::build_failure(id, e))
    }
}

/// The single value CAdES attributes carry.
pub(crate) fn single_value(raw: &RawAttribute) -> Result<Tlv<'_>, VerificationError> {
    let values = raw.values().building(raw.id())?;
    match values.as_slice() {
        [value] => Ok(*value),
        [] => Err(VerificationError::build_failure(raw.id(), "attribute has no value")),
        _ => Err(VerificationError::build_failure(
            raw.id(),
            format!("expected a single value, found {}", values.len()),
        )),
    }
}

/// Children of a constructed element, checking its tag.
pub(crate) fn fields<'a>(id: &AttributeId, tlv: Tlv<'a>, tag: Tag) -> Result<Vec<Tlv<'a>>, VerificationError> {
    tlv.expect_tag(tag).and_then(|t| t.children()).building(id)
}

/// Checks that optional context-tagged fields appear in ascending tag order within `allowed`.
pub(crate) fn ordered_context_fields(
    id: &AttributeId,
    items: &[Tlv<'_>],
    allowed: &[Tag],
) -> Result<(), VerificationError> {
    let mut last: Option<u8> = None;
    for item in items {
        if !allowed.contains(&item.tag) {
            return Err(VerificationError::build_failure(id, format!("unexpected field {}", item.tag)));
        }
        let octet = item.tag.octet();
        if last.is_some_and(|last| last >= octet) {
            return Err(VerificationError::build_failure(id, "fields out of order"));
        }
        last = Some(octet);
    }
    Ok(())
}
