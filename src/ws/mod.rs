//! Session gateway: the WebSocket connection lifecycle controller.
//!
//! A connection moves Connecting → Authenticated → Active → Closed.
//! `handler` authenticates the upgrade, `actor` owns an active connection,
//! and `protocol` decodes and dispatches its inbound events.

pub mod actor;
pub mod handler;
pub mod protocol;
