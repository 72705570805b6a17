//! Network Module Implementation
//!
//! This module provides the core networking functionality for the framing
//! layer: per-connection state machines that turn a TCP byte stream into
//! discrete [`crate::message::Message`]s and back, and the thread-safe queue
//! that bridges the I/O tasks and the application.
//!
//! # Components
//!
//! - `Connection`: owns one socket and runs the read and write loops
//! - `FrameReader` / `FrameWriter`: the per-direction framing state machines
//! - `MessageQueue`: paired inbound/outbound FIFOs behind a single lock
//!
//! Neither direction ever has more than one outstanding I/O operation, and
//! short transfers are resumed from an explicit byte cursor rather than
//! restarted.

pub use connection::{Connection, ConnectionRef};
pub use frame::{FrameReader, FrameWriter};
pub use message_queue::MessageQueue;

mod connection;
mod frame;
mod message_queue;
