//! Stream framing for control messages.
//!
//! Byte streams (Unix sockets) carry messages back to back; the header's
//! length field delimits them. Frames are passed through whole, header
//! included, so the dispatcher sees exactly what a datagram transport would.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_MESSAGE_SIZE;
use crate::core::message::HEADER_LEN;
use crate::error::{constants, ProtocolError};

pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let length = (&src[..4]).get_u32_le() as usize;
        if length < HEADER_LEN {
            return Err(ProtocolError::Invalid(constants::ERR_HEADER_LENGTH));
        }
        if length > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::OversizedMessage(length));
        }

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        Ok(Some(src.split_to(length)))
    }
}

impl Encoder<Bytes> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::OversizedMessage(item.len()));
        }
        dst.extend_from_slice(&item);
        Ok(())
    }
}
