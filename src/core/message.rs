//! Message envelope: fixed header followed by attributes.
//!
//! ```text
//! [Len(4)] [Family(2)] [Flags(2)] [Seq(4)] [Port(4)] [Cmd(2)] [Ver(1)] [Rsvd(1)] [Attributes...]
//! ```
//! All fields little-endian. `Len` covers the whole message.

use bytes::Bytes;

use crate::core::attr::{AttrBuf, NestToken};
use crate::error::{constants, ProtocolError, Result};

/// Size of the message header in bytes
pub const HEADER_LEN: usize = 20;

/// Header flag set on requests
pub const FLAG_REQUEST: u16 = 0x1;

/// Endpoint identity of a requester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub port_id: u32,
    pub sequence: u32,
}

impl Endpoint {
    pub fn new(port_id: u32, sequence: u32) -> Self {
        Self { port_id, sequence }
    }
}

/// Decoded message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub length: u32,
    pub family: u16,
    pub flags: u16,
    pub sequence: u32,
    pub port_id: u32,
    pub command: u16,
    pub version: u8,
}

impl MessageHeader {
    /// Header for an outbound message; `length` is patched by [`MessageBuffer::finish`]
    pub fn new(family: u16, command: u16, version: u8, endpoint: Endpoint, flags: u16) -> Self {
        Self {
            length: HEADER_LEN as u32,
            family,
            flags,
            sequence: endpoint.sequence,
            port_id: endpoint.port_id,
            command,
            version,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..6].copy_from_slice(&self.family.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..12].copy_from_slice(&self.sequence.to_le_bytes());
        buf[12..16].copy_from_slice(&self.port_id.to_le_bytes());
        buf[16..18].copy_from_slice(&self.command.to_le_bytes());
        buf[18] = self.version;
        buf
    }

    /// Decode the header at the front of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::Invalid(constants::ERR_HEADER_TOO_SHORT));
        }
        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        Ok(Self {
            length: u32_at(0),
            family: u16_at(4),
            flags: u16_at(6),
            sequence: u32_at(8),
            port_id: u32_at(12),
            command: u16_at(16),
            version: buf[18],
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.port_id, self.sequence)
    }

    pub fn is_request(&self) -> bool {
        self.flags & FLAG_REQUEST != 0
    }
}

/// Overwrite the port id of an encoded message in place
///
/// Host runtimes use this to stamp the sender's real port on inbound frames.
pub fn stamp_port_id(raw: &mut [u8], port_id: u32) -> Result<()> {
    if raw.len() < HEADER_LEN {
        return Err(ProtocolError::Invalid(constants::ERR_HEADER_TOO_SHORT));
    }
    raw[12..16].copy_from_slice(&port_id.to_le_bytes());
    Ok(())
}

/// A parsed message borrowing its attribute payload
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    pub header: MessageHeader,
    pub payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// Split a raw buffer into header and attribute payload
    ///
    /// Bytes past the header's length belong to the next message and are ignored.
    pub fn parse(raw: &'a [u8]) -> Result<Self> {
        let header = MessageHeader::decode(raw)?;
        let length = header.length as usize;
        if length < HEADER_LEN {
            return Err(ProtocolError::Invalid(constants::ERR_HEADER_LENGTH));
        }
        if length > raw.len() {
            return Err(ProtocolError::Truncated {
                needed: length,
                available: raw.len(),
            });
        }
        Ok(Self {
            header,
            payload: &raw[HEADER_LEN..length],
        })
    }

    /// Endpoint identity of the sender; port 0 is never a valid requester
    pub fn endpoint(&self) -> Result<Endpoint> {
        if self.header.port_id == 0 {
            return Err(ProtocolError::Invalid(constants::ERR_ZERO_PORT));
        }
        Ok(self.header.endpoint())
    }
}

/// Outbound message under construction
///
/// The buffer is reserved up front at a fixed capacity so building nested
/// payloads never reallocates; writes past that capacity fail.
#[derive(Debug)]
pub struct MessageBuffer {
    attrs: AttrBuf,
}

impl MessageBuffer {
    /// Reserve `capacity` bytes and write `header`
    pub fn new(header: MessageHeader, capacity: usize) -> Result<Self> {
        if capacity < HEADER_LEN {
            return Err(ProtocolError::OversizedMessage(HEADER_LEN));
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| ProtocolError::AllocationFailure(capacity))?;
        buf.extend_from_slice(&header.encode());

        Ok(Self {
            attrs: AttrBuf::from_vec(buf, capacity),
        })
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.len() <= HEADER_LEN
    }

    pub fn put_marker(&mut self, slot: u16) -> Result<()> {
        self.attrs.put_marker(slot)
    }

    pub fn put_opaque(&mut self, slot: u16, data: &[u8]) -> Result<()> {
        self.attrs.put_opaque(slot, data)
    }

    pub fn put_u16(&mut self, slot: u16, value: u16) -> Result<()> {
        self.attrs.put_u16(slot, value)
    }

    pub fn put_string(&mut self, slot: u16, value: &str) -> Result<()> {
        self.attrs.put_string(slot, value)
    }

    pub fn put_attr(&mut self, attr: &crate::core::attr::Attribute) -> Result<()> {
        self.attrs.put_attr(attr)
    }

    pub fn nest_start(&mut self, slot: u16) -> Result<NestToken> {
        self.attrs.nest_start(slot)
    }

    pub fn nest_end(&mut self, token: NestToken) -> Result<()> {
        self.attrs.nest_end(token)
    }

    /// Patch the length field and hand out the finished bytes
    pub fn finish(mut self) -> Bytes {
        let length = self.attrs.len() as u32;
        self.attrs.as_mut_vec()[0..4].copy_from_slice(&length.to_le_bytes());
        self.attrs.freeze()
    }
}
