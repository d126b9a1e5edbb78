//! # Core Protocol Components
//!
//! Attribute encoding, validation policies and the message envelope.
//!
//! ## Components
//! - **Attr**: typed, nestable attributes and their byte encoding
//! - **Policy**: per-slot type contracts applied during decode
//! - **Message**: fixed header plus attribute payload, outbound message builder
//! - **Codec**: Tokio codec for framing messages over byte streams
//!
//! ## Wire Format
//! ```text
//! [Header(20)] [Attr] [Attr] ...
//! Attr = [Len(2)] [Slot(2)] [Kind(2)] [Payload(N)] [Pad to 4]
//! ```
//!
//! ## Safety
//! - Maximum message size: 64KB
//! - Every declared length is validated before it is sliced
//! - Slot 0 is reserved in every attribute namespace

pub mod attr;
pub mod codec;
pub mod message;
pub mod policy;
