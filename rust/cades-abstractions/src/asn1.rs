// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! DER element access for CMS structures, built on the RustCrypto `der` crate.
//!
//! The engine needs little more than walking SEQUENCE/SET children and reading OIDs,
//! times and octet strings, but it must keep every element's complete encoding so
//! LTV hashes can be rebuilt byte-for-byte. [`Tlv`] pairs a decoded `AnyRef` with
//! the slice it was read from.

use std::time::Duration;

use chrono::{DateTime, Utc};
use der::asn1::{AnyRef, GeneralizedTime, ObjectIdentifier, OctetStringRef, UtcTime};
use der::{Decode, Encode, ErrorKind, Header, Reader, SliceReader, Tagged};

pub use der::{Error, Tag, TagNumber};

/// Constructed, context-specific tag `[number]`.
pub const fn context_tag(number: u8) -> Tag {
    Tag::ContextSpecific {
        constructed: true,
        number: TagNumber::new(number),
    }
}

/// Primitive, context-specific tag `[number]`.
pub const fn context_primitive_tag(number: u8) -> Tag {
    Tag::ContextSpecific {
        constructed: false,
        number: TagNumber::new(number),
    }
}

/// One encoded element: its tag, its content octets and the complete encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: Tag,
    pub value: &'a [u8],
    pub raw: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Decodes the content octets as a list of elements (SEQUENCE / SET / explicit tags).
    pub fn children(&self) -> Result<Vec<Tlv<'a>>, Error> {
        let mut out = Vec::new();
        let mut rest = self.value;
        while !rest.is_empty() {
            let (child, tail) = read_tlv(rest)?;
            out.push(child);
            rest = tail;
        }
        Ok(out)
    }

    pub fn expect_tag(self, tag: Tag) -> Result<Self, Error> {
        self.tag.assert_eq(tag)?;
        Ok(self)
    }

    /// Interprets this element as an OBJECT IDENTIFIER, in dotted-decimal form.
    pub fn oid(&self) -> Result<String, Error> {
        Ok(ObjectIdentifier::from_der(self.raw)?.to_string())
    }

    /// Interprets this element as a UTCTime or GeneralizedTime.
    pub fn time(&self) -> Result<DateTime<Utc>, Error> {
        let since_epoch = match self.tag {
            Tag::UtcTime => UtcTime::from_der(self.raw)?.to_unix_duration(),
            Tag::GeneralizedTime => GeneralizedTime::from_der(self.raw)?.to_unix_duration(),
            other => return Err(other.unexpected_error(Some(Tag::GeneralizedTime))),
        };
        let secs = i64::try_from(since_epoch.as_secs()).map_err(|_| Error::from(ErrorKind::DateTime))?;
        DateTime::from_timestamp(secs, since_epoch.subsec_nanos()).ok_or_else(|| ErrorKind::DateTime.into())
    }
}

/// Reads one element from the front of `input`, returning it with the remaining bytes.
pub fn read_tlv(input: &[u8]) -> Result<(Tlv<'_>, &[u8]), Error> {
    let mut reader = SliceReader::new(input)?;
    let any: AnyRef<'_> = reader.decode()?;
    let consumed = usize::try_from(reader.position())?;
    let (raw, rest) = input.split_at(consumed);
    Ok((
        Tlv {
            tag: any.tag(),
            value: any.value(),
            raw,
        },
        rest,
    ))
}

/// Reads exactly one element; trailing bytes are an error.
pub fn read_single(input: &[u8]) -> Result<Tlv<'_>, Error> {
    let any = AnyRef::from_der(input)?;
    Ok(Tlv {
        tag: any.tag(),
        value: any.value(),
        raw: input,
    })
}

/// Tag and length octets for an element of `len` content octets.
pub fn encode_header(tag: Tag, len: usize) -> Result<Vec<u8>, Error> {
    Header::new(tag, len)?.to_der()
}

pub fn encode_tlv(tag: Tag, value: &[u8]) -> Result<Vec<u8>, Error> {
    AnyRef::new(tag, value)?.to_der()
}

/// Wraps already-encoded elements in a constructed element with the given tag.
pub fn encode_constructed<'a>(tag: Tag, elements: impl IntoIterator<Item = &'a [u8]>) -> Result<Vec<u8>, Error> {
    let body: Vec<u8> = elements.into_iter().flatten().copied().collect();
    encode_tlv(tag, &body)
}

pub fn encode_octet_string(value: &[u8]) -> Result<Vec<u8>, Error> {
    OctetStringRef::new(value)?.to_der()
}

/// Encodes a dotted-decimal OID as a complete OBJECT IDENTIFIER element.
pub fn encode_oid(dotted: &str) -> Result<Vec<u8>, Error> {
    ObjectIdentifier::new(dotted.trim())
        .map_err(|_| Error::from(ErrorKind::OidMalformed))?
        .to_der()
}

/// Encodes `time` as a GeneralizedTime element, truncated to whole seconds.
pub fn encode_generalized_time(time: &DateTime<Utc>) -> Result<Vec<u8>, Error> {
    let secs = u64::try_from(time.timestamp()).map_err(|_| Error::from(ErrorKind::DateTime))?;
    GeneralizedTime::from_unix_duration(Duration::from_secs(secs))?.to_der()
}
