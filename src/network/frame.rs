use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::message::{Header, Message, WireTag, HEADER_LEN, WORD_LEN};
use crate::{AppError, AppResult};

/// The read-direction framing state machine.
///
/// Alternates between a header stage and a body stage, each with its own fill
/// cursor. A short read advances the cursor and requests the remaining bytes;
/// a stage is never restarted, since discarding partially received bytes
/// would corrupt the stream. All accumulation state lives in the struct, so
/// an in-flight `read_message` can be cancelled (for example by a shutdown
/// signal racing it in a `select!`) and resumed later without byte loss.
#[derive(Debug)]
pub struct FrameReader<T: WireTag> {
    state: ReadState<T>,
    header_buf: [u8; HEADER_LEN],
    body_buf: Vec<u8>,
    filled: usize,
    max_frame_words: u64,
}

#[derive(Debug)]
enum ReadState<T: WireTag> {
    Header,
    Body(Header<T>),
}

impl<T: WireTag> FrameReader<T> {
    pub fn new(max_frame_words: u64) -> FrameReader<T> {
        FrameReader {
            state: ReadState::Header,
            header_buf: [0; HEADER_LEN],
            body_buf: Vec::new(),
            filled: 0,
            max_frame_words,
        }
    }

    /// Reads the next complete message from `reader`.
    ///
    /// Returns `Ok(None)` when the peer closed the stream at a message
    /// boundary. EOF inside a header is a connection reset; EOF inside a body
    /// drops the partial message (logged at warn) and then reports the close,
    /// so framing state stays aligned to header boundaries.
    pub async fn read_message<R>(&mut self, reader: &mut R) -> AppResult<Option<Message<T>>>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let expected_body = match &self.state {
                ReadState::Header => None,
                ReadState::Body(header) => Some(header.body_len()),
            };
            match expected_body {
                None => {
                    if self.filled == HEADER_LEN {
                        let header: Header<T> = Header::parse(&self.header_buf)?;
                        if header.size_words() > self.max_frame_words {
                            return Err(AppError::MalformedProtocol(format!(
                                "frame of {} words exceeds the limit of {}",
                                header.size_words(),
                                self.max_frame_words
                            )));
                        }
                        self.body_buf.clear();
                        self.body_buf.resize(header.body_len(), 0);
                        self.filled = 0;
                        self.state = ReadState::Body(header);
                        continue;
                    }
                    let n = reader.read(&mut self.header_buf[self.filled..]).await?;
                    if n == 0 {
                        if self.filled == 0 {
                            // clean close at a message boundary
                            return Ok(None);
                        }
                        return Err(AppError::DetailedIoError(format!(
                            "connection reset with {} of {} header bytes received",
                            self.filled, HEADER_LEN
                        )));
                    }
                    self.filled += n;
                }
                Some(expected) => {
                    if self.filled == expected {
                        let header = match std::mem::replace(&mut self.state, ReadState::Header) {
                            ReadState::Body(header) => header,
                            ReadState::Header => unreachable!(),
                        };
                        self.filled = 0;
                        let message = Message::from_parts(header, &self.body_buf[..expected])?;
                        return Ok(Some(message));
                    }
                    let n = reader.read(&mut self.body_buf[self.filled..expected]).await?;
                    if n == 0 {
                        // The stream ended short of the declared body length.
                        // Policy: drop the incomplete message and resume at
                        // the next header boundary, which here is the close.
                        warn!(
                            "dropping message with {} of {} body bytes received",
                            self.filled, expected
                        );
                        self.state = ReadState::Header;
                        self.filled = 0;
                        return Ok(None);
                    }
                    self.filled += n;
                }
            }
        }
    }
}

/// The write-direction framing state machine.
///
/// Writes the header bytes and then the body bytes, each stage resuming short
/// writes from an offset cursor. The caller peeks (not pops) the message it
/// hands in, so a message is only discarded from its queue once
/// `write_message` has returned success.
#[derive(Debug)]
pub struct FrameWriter {
    header_buf: [u8; HEADER_LEN],
    body_buf: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> FrameWriter {
        FrameWriter {
            header_buf: [0; HEADER_LEN],
            body_buf: Vec::new(),
        }
    }

    /// Writes one complete message to `writer`, flushing at the end.
    pub async fn write_message<T, W>(
        &mut self,
        writer: &mut W,
        message: &Message<T>,
    ) -> AppResult<()>
    where
        T: WireTag,
        W: AsyncWrite + Unpin,
    {
        message.header().write_to(&mut self.header_buf);
        Self::write_all_from_cursor(writer, &self.header_buf, "header").await?;

        self.body_buf.clear();
        self.body_buf.reserve(message.body().len() * WORD_LEN);
        for word in message.body() {
            self.body_buf.extend_from_slice(&word.to_be_bytes());
        }
        Self::write_all_from_cursor(writer, &self.body_buf, "body").await?;

        writer.flush().await?;
        Ok(())
    }

    async fn write_all_from_cursor<W>(writer: &mut W, bytes: &[u8], stage: &str) -> AppResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0;
        while written < bytes.len() {
            let n = writer.write(&bytes[written..]).await?;
            if n == 0 {
                return Err(AppError::DetailedIoError(format!(
                    "socket closed with {} of {} {} bytes written",
                    written,
                    bytes.len(),
                    stage
                )));
            }
            written += n;
        }
        Ok(())
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestTag {
        Data,
    }

    impl WireTag for TestTag {
        fn to_u32(self) -> u32 {
            1
        }
        fn from_u32(raw: u32) -> Option<Self> {
            (raw == 1).then_some(TestTag::Data)
        }
    }

    fn sample_message() -> Message<TestTag> {
        Message::with_body(TestTag::Data, vec![1, 2, 3, u64::MAX]).route(1000, 1001)
    }

    /// Drives one message through a duplex pipe whose internal buffer forces
    /// transfers of at most `chunk` bytes per operation.
    async fn round_trip_through_pipe(chunk: usize) -> Message<TestTag> {
        let (mut tx, mut rx) = tokio::io::duplex(chunk);
        let reader = tokio::spawn(async move {
            let mut frames: FrameReader<TestTag> = FrameReader::new(64);
            frames.read_message(&mut rx).await
        });

        let message = sample_message();
        FrameWriter::new()
            .write_message(&mut tx, &message)
            .await
            .unwrap();
        drop(tx);

        reader.await.unwrap().unwrap().unwrap()
    }

    #[tokio::test]
    async fn split_transfer_equals_unsplit_transfer() {
        // 3-byte chunks split both the header and the body mid-stage
        let split = round_trip_through_pipe(3).await;
        let unsplit = round_trip_through_pipe(4096).await;
        assert_eq!(split, unsplit);
        assert_eq!(split, sample_message());
    }

    #[tokio::test]
    async fn short_writes_resume_from_cursor() {
        // a 1-byte pipe makes every write short
        let received = round_trip_through_pipe(1).await;
        assert_eq!(received, sample_message());
    }

    #[tokio::test]
    async fn empty_body_round_trips() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        let message = Message::new(TestTag::Data).route(1, 2);
        FrameWriter::new()
            .write_message(&mut tx, &message)
            .await
            .unwrap();
        drop(tx);

        let mut frames: FrameReader<TestTag> = FrameReader::new(64);
        let received = frames.read_message(&mut rx).await.unwrap().unwrap();
        assert_eq!(received, message);
        // the next read observes the clean close
        assert!(frames.read_message(&mut rx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn two_messages_back_to_back() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        let first = Message::with_body(TestTag::Data, vec![1]);
        let second = Message::with_body(TestTag::Data, vec![2, 3]);
        let mut writer = FrameWriter::new();
        writer.write_message(&mut tx, &first).await.unwrap();
        writer.write_message(&mut tx, &second).await.unwrap();
        drop(tx);

        let mut frames: FrameReader<TestTag> = FrameReader::new(64);
        assert_eq!(frames.read_message(&mut rx).await.unwrap().unwrap(), first);
        assert_eq!(frames.read_message(&mut rx).await.unwrap().unwrap(), second);
        assert!(frames.read_message(&mut rx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        let message = Message::with_body(TestTag::Data, vec![0; 32]);
        FrameWriter::new()
            .write_message(&mut tx, &message)
            .await
            .unwrap();

        let mut frames: FrameReader<TestTag> = FrameReader::new(8);
        let result = frames.read_message(&mut rx).await;
        assert!(matches!(result, Err(AppError::MalformedProtocol(_))));
    }

    #[tokio::test]
    async fn eof_inside_header_is_a_reset() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        tx.write_all(&sample_message().encode()[..10]).await.unwrap();
        drop(tx);

        let mut frames: FrameReader<TestTag> = FrameReader::new(64);
        let result = frames.read_message(&mut rx).await;
        assert!(matches!(result, Err(AppError::DetailedIoError(_))));
    }

    #[tokio::test]
    async fn eof_inside_body_drops_the_message() {
        let (mut tx, mut rx) = tokio::io::duplex(4096);
        let encoded = sample_message().encode();
        tx.write_all(&encoded[..HEADER_LEN + WORD_LEN]).await.unwrap();
        drop(tx);

        let mut frames: FrameReader<TestTag> = FrameReader::new(64);
        // partial body is discarded, the close is reported cleanly
        assert!(frames.read_message(&mut rx).await.unwrap().is_none());
    }
}
