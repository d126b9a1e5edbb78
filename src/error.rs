//! # Error Types
//!
//! Error handling for the control protocol.
//!
//! This module defines every error variant that can occur while decoding,
//! validating, dispatching or answering a control message, plus the errors
//! surfaced by the host runtimes that carry those messages.
//!
//! ## Error Categories
//! - **Codec Errors**: truncated buffers, unknown attribute type tags, oversized attributes
//! - **Validation Errors**: policy violations, missing attributes, invalid headers
//! - **Dispatch Errors**: unknown commands, requests outside the registration window
//! - **Delivery Errors**: unicast failures, buffer allocation failures
//! - **Runtime Errors**: registration, configuration, I/O and timeouts
//!
//! Decode and validation errors abort a single inbound message and never
//! produce a confirm. None of these errors is meant to terminate the process.
//!
//! ## Example Usage
//! ```rust
//! use genl_control::error::{ProtocolError, Result};
//! use tracing::{error, info};
//!
//! fn level_from(raw: &[u8]) -> Result<u16> {
//!     let bytes: [u8; 2] = raw
//!         .try_into()
//!         .map_err(|_| ProtocolError::Invalid("expected two bytes"))?;
//!     Ok(u16::from_le_bytes(bytes))
//! }
//!
//! fn main() {
//!     match level_from(&[2, 0]) {
//!         Ok(level) => info!(level, "Parsed debug level"),
//!         Err(e) => error!(error = %e, "Failed to parse debug level"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Header validation errors
    pub const ERR_HEADER_TOO_SHORT: &str = "message shorter than header";
    pub const ERR_HEADER_LENGTH: &str = "header length smaller than header size";
    pub const ERR_ZERO_PORT: &str = "request carries no port id";
    pub const ERR_FAMILY_MISMATCH: &str = "message addressed to another family";

    /// Attribute validation errors
    pub const ERR_ATTR_LENGTH: &str = "attribute length smaller than attribute header";
    pub const ERR_SLOT_NOT_IN_POLICY: &str = "slot not declared by policy";
    pub const ERR_KIND_MISMATCH: &str = "attribute type does not match policy";
    pub const ERR_U16_LENGTH: &str = "u16 payload must be exactly 2 bytes";
    pub const ERR_STRING_NUL: &str = "string payload is not NUL terminated";
    pub const ERR_STRING_UTF8: &str = "string payload is not valid UTF-8";
    pub const ERR_NEST_UNBALANCED: &str = "nest token does not match buffer";
    pub const ERR_NEST_DEPTH: &str = "attribute nesting too deep";

    /// Response building errors
    pub const ERR_NO_CONFIRM: &str = "command has no confirm counterpart";

    /// Registration errors
    pub const ERR_FAMILY_NAME_EMPTY: &str = "family name cannot be empty";
    pub const ERR_FAMILY_NAME_LONG: &str = "family name exceeds 16 bytes";
    pub const ERR_GROUP_NAME_LONG: &str = "multicast group name exceeds 16 bytes";
}

/// ProtocolError is the primary error type for all control-plane operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated buffer: need {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Unknown attribute type tag: {0}")]
    UnknownType(u16),

    #[error("Policy violation at slot {slot}: {reason}")]
    PolicyViolation { slot: u16, reason: &'static str },

    #[error("Missing attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("Invalid message: {0}")]
    Invalid(&'static str),

    #[error("Unknown command: {0}")]
    UnknownCommand(u16),

    #[error("Unicast to port {port_id} failed: {reason}")]
    SendFailure { port_id: u32, reason: String },

    #[error("Could not allocate a {0} byte message buffer")]
    AllocationFailure(usize),

    #[error("Attribute too large: {0} bytes")]
    OversizedAttribute(usize),

    #[error("Message too large: {0} bytes")]
    OversizedMessage(usize),

    #[error("Family registration failed: {0}")]
    Registration(String),

    #[error("Family is not registered")]
    NotRegistered,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Synchronization primitive poisoned")]
    LockPoisoned,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,
}

impl ProtocolError {
    /// True for errors raised while decoding or validating an inbound message.
    ///
    /// These are the "silent" failures: the requester gets no confirm.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ProtocolError::Truncated { .. }
                | ProtocolError::UnknownType(_)
                | ProtocolError::PolicyViolation { .. }
                | ProtocolError::MissingAttribute(_)
                | ProtocolError::Invalid(_)
                | ProtocolError::UnknownCommand(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
