// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{AppError, AppResult};

/// Width of one body word in bytes.
pub const WORD_LEN: usize = 8;

/// Byte width of the fixed header: size, from, dest (u64 each) plus the tag (u32).
pub const HEADER_LEN: usize = 3 * 8 + 4;

/// The application-defined message kind carried in every header.
///
/// Implementors map their tag enumeration to and from the `u32` that travels
/// on the wire. `from_u32` returns `None` for a raw value the application does
/// not know, which the framing layer reports as a malformed frame.
pub trait WireTag: Copy + Eq + Send + Sync + fmt::Debug + 'static {
    fn to_u32(self) -> u32;
    fn from_u32(raw: u32) -> Option<Self>;
}

/// Fixed-layout message header.
///
/// Fields are serialized in declared order (size, from, dest, tag), each in
/// network byte order. `size_words` is derived from the body and never set
/// directly by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<T: WireTag> {
    size_words: u64,
    from_id: u64,
    dest_id: u64,
    tag: T,
}

impl<T: WireTag> Header<T> {
    pub fn size_words(&self) -> u64 {
        self.size_words
    }

    pub fn from_id(&self) -> u64 {
        self.from_id
    }

    pub fn dest_id(&self) -> u64 {
        self.dest_id
    }

    pub fn tag(&self) -> T {
        self.tag
    }

    /// Expected body byte length declared by this header.
    pub fn body_len(&self) -> usize {
        self.size_words as usize * WORD_LEN
    }

    /// Serializes the header into `out`, which must hold at least
    /// [`HEADER_LEN`] bytes.
    pub fn write_to(&self, out: &mut [u8]) {
        let mut out = out;
        out.put_u64(self.size_words);
        out.put_u64(self.from_id);
        out.put_u64(self.dest_id);
        out.put_u32(self.tag.to_u32());
    }

    /// Parses a header from exactly [`HEADER_LEN`] bytes.
    pub fn parse(raw: &[u8]) -> AppResult<Header<T>> {
        if raw.len() < HEADER_LEN {
            return Err(AppError::MalformedProtocol(format!(
                "header needs {} bytes, got {}",
                HEADER_LEN,
                raw.len()
            )));
        }
        let mut raw = raw;
        let size_words = raw.get_u64();
        // size_words must describe a byte length representable as usize,
        // otherwise body_len would wrap
        if size_words
            .checked_mul(WORD_LEN as u64)
            .and_then(|len| usize::try_from(len).ok())
            .is_none()
        {
            return Err(AppError::MalformedProtocol(format!(
                "size_words {} exceeds the addressable body length",
                size_words
            )));
        }
        let from_id = raw.get_u64();
        let dest_id = raw.get_u64();
        let raw_tag = raw.get_u32();
        let tag = T::from_u32(raw_tag)
            .ok_or_else(|| AppError::MalformedProtocol(format!("unknown tag {}", raw_tag)))?;
        Ok(Header {
            size_words,
            from_id,
            dest_id,
            tag,
        })
    }
}

/// A discrete message: header plus `size_words` 8-byte body words.
///
/// `header.size_words == body.len()` holds for every message the constructors
/// produce, so the framing layer can trust the header when sizing reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<T: WireTag> {
    header: Header<T>,
    body: Vec<u64>,
}

impl<T: WireTag> Message<T> {
    /// Creates an empty message with the given tag, unrouted.
    pub fn new(tag: T) -> Message<T> {
        Message::with_body(tag, Vec::new())
    }

    /// Creates a message from a tag and body, recomputing `size_words` from
    /// the body length.
    pub fn with_body(tag: T, body: Vec<u64>) -> Message<T> {
        Message {
            header: Header {
                size_words: body.len() as u64,
                from_id: 0,
                dest_id: 0,
                tag,
            },
            body,
        }
    }

    /// Stamps the sender and destination ids.
    pub fn route(mut self, from_id: u64, dest_id: u64) -> Message<T> {
        self.header.from_id = from_id;
        self.header.dest_id = dest_id;
        self
    }

    /// Appends one word to the body, keeping `size_words` in sync.
    pub fn push(&mut self, word: u64) {
        self.body.push(word);
        self.header.size_words = self.body.len() as u64;
    }

    pub fn header(&self) -> &Header<T> {
        &self.header
    }

    pub fn tag(&self) -> T {
        self.header.tag
    }

    pub fn from_id(&self) -> u64 {
        self.header.from_id
    }

    pub fn dest_id(&self) -> u64 {
        self.header.dest_id
    }

    pub fn size_words(&self) -> u64 {
        self.header.size_words
    }

    pub fn body(&self) -> &[u64] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u64> {
        self.body
    }

    /// Encodes the full message (header + body) in network byte order.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.body.len() * WORD_LEN);
        buf.put_u64(self.header.size_words);
        buf.put_u64(self.header.from_id);
        buf.put_u64(self.header.dest_id);
        buf.put_u32(self.header.tag.to_u32());
        for word in &self.body {
            buf.put_u64(*word);
        }
        buf.freeze()
    }

    /// Decodes one message from the front of `buffer`, consuming its bytes.
    ///
    /// Returns `Ok(None)` if the buffer does not yet hold a complete message.
    pub fn decode(buffer: &mut BytesMut) -> AppResult<Option<Message<T>>> {
        if buffer.remaining() < HEADER_LEN {
            return Ok(None);
        }
        let header: Header<T> = Header::parse(&buffer[..HEADER_LEN])?;
        if buffer.remaining() < HEADER_LEN + header.body_len() {
            return Ok(None);
        }
        buffer.advance(HEADER_LEN);
        let body_bytes = buffer.split_to(header.body_len());
        Message::from_parts(header, &body_bytes).map(Some)
    }

    /// Assembles a message from an already-parsed header and raw body bytes.
    pub fn from_parts(header: Header<T>, body_bytes: &[u8]) -> AppResult<Message<T>> {
        if body_bytes.len() != header.body_len() {
            return Err(AppError::MalformedProtocol(format!(
                "body is {} bytes, header declares {}",
                body_bytes.len(),
                header.body_len()
            )));
        }
        let body = body_bytes
            .chunks_exact(WORD_LEN)
            .map(|chunk| {
                let mut chunk = chunk;
                chunk.get_u64()
            })
            .collect();
        Ok(Message { header, body })
    }
}

/// Human-readable projection for logging and tests; not part of the wire
/// contract.
impl<T: WireTag> fmt::Display for Message<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} -> {} ({} words)",
            self.header.tag, self.header.from_id, self.header.dest_id, self.header.size_words
        )
    }
}
