//! # Control Protocol
//!
//! Command taxonomy, request handlers, the static command registry, the
//! family dispatcher and the confirm builder.
//!
//! ## Flow
//! ```text
//! raw bytes -> Message::parse -> registry::lookup -> attr::decode(policy)
//!           -> handler -> ResponseBuilder -> Transport::unicast(port_id)
//! ```
//!
//! Requests that fail to decode or validate are dropped without a confirm;
//! the requester is expected to time out.

pub mod command;
pub mod dispatcher;
pub mod handlers;
pub mod registry;
pub mod response;
pub mod state;

pub use command::Command;
pub use dispatcher::Family;
pub use state::{ControlState, DebugLevel};

#[cfg(test)]
mod tests;
