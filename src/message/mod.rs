//! Wire Message Implementation
//!
//! This module defines the binary envelope exchanged between peers: a
//! fixed-size header followed by a body of 8-byte words. The header declares
//! the body length, which is all the framing layer needs to recover discrete
//! messages from a continuous byte stream.

pub use wire_message::{Header, Message, WireTag, HEADER_LEN, WORD_LEN};

mod wire_message;
