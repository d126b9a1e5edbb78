//! # genl-control
//!
//! A control-plane protocol in the generic-netlink style. User space sends
//! typed requests to a named family; the family validates them against
//! static attribute policies, applies them to its state and answers each
//! accepted request with exactly one confirm, unicast to the requester.
//!
//! ## Layers
//! - [`core`]: attribute codec, policies, message header and stream framing
//! - [`protocol`]: commands, handlers, confirm builder and the family dispatcher
//! - [`transport`]: the host runtime interface plus loopback and Unix socket runtimes
//! - [`service`]: the requesting side (request builder, confirm parser, client)
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use genl_control::config::ControlConfig;
//! use genl_control::core::message::Endpoint;
//! use genl_control::protocol::Family;
//! use genl_control::service::{parse_confirm, Confirm, RequestBuilder};
//! use genl_control::transport::LoopbackRuntime;
//! use genl_control::ProtocolError;
//!
//! # fn main() -> genl_control::Result<()> {
//! let runtime = Arc::new(LoopbackRuntime::new());
//! let family = Family::register(Arc::clone(&runtime), &ControlConfig::default())?;
//! runtime.bind(42)?;
//!
//! let id = family.id().ok_or(ProtocolError::NotRegistered)?;
//! let requests = RequestBuilder::new(id, 0);
//! family.handle(&requests.get_info_request(Endpoint::new(42, 1))?)?;
//!
//! let reply = runtime.recv(42)?.ok_or(ProtocolError::ConnectionClosed)?;
//! let (_, confirm) = parse_confirm(&reply)?;
//! assert_eq!(
//!     confirm,
//!     Confirm::Info { debug_level: 4, module_version: "0.0.0".to_string() }
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

#[doc(hidden)]
pub use tracing as __tracing;

pub use config::ControlConfig;
pub use error::{ProtocolError, Result};
pub use protocol::Family;
pub use transport::Transport;
