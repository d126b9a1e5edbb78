//! # Attribute Codec
//!
//! Typed, nestable key-value attributes and their flat byte encoding.
//!
//! ## Wire Format
//! ```text
//! [Len(2)] [Slot(2)] [Kind(2)] [Payload(N)] [Pad to 4]
//! ```
//! `Len` covers header and payload, not the trailing padding. A nested
//! attribute's payload is itself a sequence of padded attributes, so the
//! encoding is self-describing and decode only needs a [`Policy`] for type
//! checking.
//!
//! ## Safety
//! - Every length is checked against the remaining buffer before use
//! - An attribute whose padded length runs past the buffer is `Truncated`
//! - Nesting is bounded by [`NESTING_LIMIT`] so hostile input cannot exhaust the stack

use bytes::Bytes;

use crate::config::MAX_MESSAGE_SIZE;
use crate::core::policy::Policy;
use crate::error::{constants, ProtocolError, Result};

/// Size of the attribute header in bytes
pub const ATTR_HDRLEN: usize = 6;

/// Attributes are padded to this boundary
pub const ATTR_ALIGNTO: usize = 4;

/// Largest encodable attribute (header + payload)
pub const MAX_ATTR_LEN: usize = u16::MAX as usize;

/// Deepest nesting accepted by the decoder
pub const NESTING_LIMIT: usize = 256;

/// Round `len` up to the attribute alignment
#[inline]
pub const fn align(len: usize) -> usize {
    (len + ATTR_ALIGNTO - 1) & !(ATTR_ALIGNTO - 1)
}

/// Encoded attribute type tag (netlink numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AttrKind {
    /// Opaque bytes, possibly empty
    Unspec = 0,
    /// Unsigned 16-bit integer
    U16 = 2,
    /// NUL-terminated UTF-8 string
    String = 5,
    /// Sequence of attributes
    Nested = 8,
}

impl AttrKind {
    /// Tag written on the wire
    #[inline]
    pub fn tag(self) -> u16 {
        self as u16
    }

    /// Resolve a wire tag
    pub fn from_tag(tag: u16) -> Result<Self> {
        match tag {
            0 => Ok(AttrKind::Unspec),
            2 => Ok(AttrKind::U16),
            5 => Ok(AttrKind::String),
            8 => Ok(AttrKind::Nested),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            AttrKind::Unspec => "unspec",
            AttrKind::U16 => "u16",
            AttrKind::String => "string",
            AttrKind::Nested => "nested",
        }
    }
}

/// Decoded attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Opaque(Bytes),
    U16(u16),
    String(String),
    Nested(Vec<Attribute>),
}

impl AttrValue {
    /// Type tag this value encodes with
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Opaque(_) => AttrKind::Unspec,
            AttrValue::U16(_) => AttrKind::U16,
            AttrValue::String(_) => AttrKind::String,
            AttrValue::Nested(_) => AttrKind::Nested,
        }
    }
}

/// A (slot, type, value) triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub slot: u16,
    pub value: AttrValue,
}

impl Attribute {
    pub fn opaque(slot: u16, data: impl Into<Bytes>) -> Self {
        Self {
            slot,
            value: AttrValue::Opaque(data.into()),
        }
    }

    /// Zero-length opaque attribute whose presence is the whole message
    pub fn marker(slot: u16) -> Self {
        Self::opaque(slot, Bytes::new())
    }

    pub fn u16(slot: u16, value: u16) -> Self {
        Self {
            slot,
            value: AttrValue::U16(value),
        }
    }

    pub fn string(slot: u16, value: impl Into<String>) -> Self {
        Self {
            slot,
            value: AttrValue::String(value.into()),
        }
    }

    pub fn nested(slot: u16, children: Vec<Attribute>) -> Self {
        Self {
            slot,
            value: AttrValue::Nested(children),
        }
    }

    #[inline]
    pub fn kind(&self) -> AttrKind {
        self.value.kind()
    }
}

/// Position of an open nested region, returned by [`AttrBuf::nest_start`]
#[must_use = "an open nest must be closed with nest_end"]
#[derive(Debug)]
pub struct NestToken {
    offset: usize,
}

/// Append-only attribute writer with a hard size limit
#[derive(Debug)]
pub struct AttrBuf {
    buf: Vec<u8>,
    limit: usize,
}

impl Default for AttrBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl AttrBuf {
    pub fn new() -> Self {
        Self::with_limit(MAX_MESSAGE_SIZE)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    /// Continue writing after bytes already in `buf` (e.g. a message header)
    pub(crate) fn from_vec(buf: Vec<u8>, limit: usize) -> Self {
        Self { buf, limit }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure_room(&self, additional: usize) -> Result<()> {
        let total = self.buf.len() + additional;
        if total > self.limit {
            return Err(ProtocolError::OversizedMessage(total));
        }
        Ok(())
    }

    fn put_header(&mut self, len: u16, slot: u16, kind: AttrKind) {
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(&slot.to_le_bytes());
        self.buf.extend_from_slice(&kind.tag().to_le_bytes());
    }

    fn pad(&mut self, len: usize) {
        let pad = align(len) - len;
        self.buf.resize(self.buf.len() + pad, 0);
    }

    fn put_raw(&mut self, slot: u16, kind: AttrKind, parts: &[&[u8]]) -> Result<()> {
        let len = ATTR_HDRLEN + parts.iter().map(|p| p.len()).sum::<usize>();
        if len > MAX_ATTR_LEN {
            return Err(ProtocolError::OversizedAttribute(len));
        }
        self.ensure_room(align(len))?;

        self.put_header(len as u16, slot, kind);
        for part in parts {
            self.buf.extend_from_slice(part);
        }
        self.pad(len);
        Ok(())
    }

    pub fn put_opaque(&mut self, slot: u16, data: &[u8]) -> Result<()> {
        self.put_raw(slot, AttrKind::Unspec, &[data])
    }

    pub fn put_marker(&mut self, slot: u16) -> Result<()> {
        self.put_raw(slot, AttrKind::Unspec, &[])
    }

    pub fn put_u16(&mut self, slot: u16, value: u16) -> Result<()> {
        self.put_raw(slot, AttrKind::U16, &[&value.to_le_bytes()])
    }

    pub fn put_string(&mut self, slot: u16, value: &str) -> Result<()> {
        self.put_raw(slot, AttrKind::String, &[value.as_bytes(), &[0]])
    }

    /// Open a nested region; subsequent puts land inside it until [`nest_end`](Self::nest_end)
    pub fn nest_start(&mut self, slot: u16) -> Result<NestToken> {
        self.ensure_room(ATTR_HDRLEN)?;
        let offset = self.buf.len();
        self.put_header(0, slot, AttrKind::Nested);
        Ok(NestToken { offset })
    }

    /// Close a nested region by patching its length
    pub fn nest_end(&mut self, token: NestToken) -> Result<()> {
        if token.offset + ATTR_HDRLEN > self.buf.len() {
            return Err(ProtocolError::Invalid(constants::ERR_NEST_UNBALANCED));
        }
        let len = self.buf.len() - token.offset;
        if len > MAX_ATTR_LEN {
            return Err(ProtocolError::OversizedAttribute(len));
        }
        self.buf[token.offset..token.offset + 2].copy_from_slice(&(len as u16).to_le_bytes());

        self.ensure_room(align(len) - len)?;
        self.pad(len);
        Ok(())
    }

    /// Write any attribute, recursing into nested values
    pub fn put_attr(&mut self, attr: &Attribute) -> Result<()> {
        match &attr.value {
            AttrValue::Opaque(data) => self.put_opaque(attr.slot, data),
            AttrValue::U16(value) => self.put_u16(attr.slot, *value),
            AttrValue::String(value) => self.put_string(attr.slot, value),
            AttrValue::Nested(children) => {
                let nest = self.nest_start(attr.slot)?;
                for child in children {
                    self.put_attr(child)?;
                }
                self.nest_end(nest)
            }
        }
    }

    pub(crate) fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn freeze(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Encode an ordered attribute sequence
pub fn encode(attrs: &[Attribute]) -> Result<Bytes> {
    let mut buf = AttrBuf::new();
    for attr in attrs {
        buf.put_attr(attr)?;
    }
    Ok(buf.freeze())
}

/// Structural decode: lengths, type tags and value shapes, no policy
///
/// A cut on an attribute boundary still parses as the shorter sequence. Top
/// level truncation is caught by the header length in `Message::parse`; only
/// a cut inside an attribute is reported here.
pub fn parse(buf: &[u8]) -> Result<Vec<Attribute>> {
    parse_level(buf, 0)
}

/// Decode `buf` and check every top-level slot against `policy`
///
/// Either the whole buffer is accepted or an error is returned; there is no
/// partially populated result.
pub fn decode(buf: &[u8], policy: &Policy) -> Result<AttrSet> {
    let attrs = parse(buf)?;
    policy.validate(&attrs)?;
    Ok(AttrSet::new(attrs))
}

fn parse_level(buf: &[u8], depth: usize) -> Result<Vec<Attribute>> {
    if depth > NESTING_LIMIT {
        return Err(ProtocolError::Invalid(constants::ERR_NEST_DEPTH));
    }

    let mut attrs = Vec::new();
    let mut rest = buf;

    while !rest.is_empty() {
        if rest.len() < ATTR_HDRLEN {
            return Err(ProtocolError::Truncated {
                needed: ATTR_HDRLEN,
                available: rest.len(),
            });
        }

        let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
        let slot = u16::from_le_bytes([rest[2], rest[3]]);
        let tag = u16::from_le_bytes([rest[4], rest[5]]);

        if len < ATTR_HDRLEN {
            return Err(ProtocolError::Invalid(constants::ERR_ATTR_LENGTH));
        }
        let padded = align(len);
        if padded > rest.len() {
            return Err(ProtocolError::Truncated {
                needed: padded,
                available: rest.len(),
            });
        }

        let kind = AttrKind::from_tag(tag)?;
        let value = parse_value(slot, kind, &rest[ATTR_HDRLEN..len], depth)?;
        attrs.push(Attribute { slot, value });

        rest = &rest[padded..];
    }

    Ok(attrs)
}

fn parse_value(slot: u16, kind: AttrKind, payload: &[u8], depth: usize) -> Result<AttrValue> {
    match kind {
        AttrKind::Unspec => Ok(AttrValue::Opaque(Bytes::copy_from_slice(payload))),
        AttrKind::U16 => {
            let bytes: [u8; 2] = payload.try_into().map_err(|_| ProtocolError::PolicyViolation {
                slot,
                reason: constants::ERR_U16_LENGTH,
            })?;
            Ok(AttrValue::U16(u16::from_le_bytes(bytes)))
        }
        AttrKind::String => {
            let (&last, text) = payload.split_last().ok_or(ProtocolError::PolicyViolation {
                slot,
                reason: constants::ERR_STRING_NUL,
            })?;
            if last != 0 {
                return Err(ProtocolError::PolicyViolation {
                    slot,
                    reason: constants::ERR_STRING_NUL,
                });
            }
            let text = std::str::from_utf8(text).map_err(|_| ProtocolError::PolicyViolation {
                slot,
                reason: constants::ERR_STRING_UTF8,
            })?;
            Ok(AttrValue::String(text.to_owned()))
        }
        AttrKind::Nested => Ok(AttrValue::Nested(parse_level(payload, depth + 1)?)),
    }
}

/// Ordered result of a policy-checked decode
///
/// Lookups by slot return the last occurrence, matching netlink parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrSet {
    attrs: Vec<Attribute>,
}

impl AttrSet {
    pub fn new(attrs: Vec<Attribute>) -> Self {
        Self { attrs }
    }

    /// Validate the children of a nested attribute against `policy`
    pub fn from_nested(children: &[Attribute], policy: &Policy) -> Result<Self> {
        policy.validate(children)?;
        Ok(Self::new(children.to_vec()))
    }

    pub fn get(&self, slot: u16) -> Option<&AttrValue> {
        self.attrs
            .iter()
            .rev()
            .find(|attr| attr.slot == slot)
            .map(|attr| &attr.value)
    }

    pub fn contains(&self, slot: u16) -> bool {
        self.get(slot).is_some()
    }

    pub fn get_u16(&self, slot: u16) -> Option<u16> {
        match self.get(slot)? {
            AttrValue::U16(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_str(&self, slot: u16) -> Option<&str> {
        match self.get(slot)? {
            AttrValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_nested(&self, slot: u16) -> Option<&[Attribute]> {
        match self.get(slot)? {
            AttrValue::Nested(children) => Some(children),
            _ => None,
        }
    }

    pub fn get_opaque(&self, slot: u16) -> Option<&Bytes> {
        match self.get(slot)? {
            AttrValue::Opaque(data) => Some(data),
            _ => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn as_slice(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn into_vec(self) -> Vec<Attribute> {
        self.attrs
    }
}
