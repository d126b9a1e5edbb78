//! # User-Space Service Layer
//!
//! The requesting side of the control family: building requests, decoding
//! confirms and an async client for the local socket runtime.

pub mod client;

pub use client::{parse_confirm, Confirm, RequestBuilder};

#[cfg(unix)]
pub use client::LocalClient;
