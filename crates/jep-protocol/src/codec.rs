//! Streaming, self-delimited message codec (spec §4.B).
//!
//! Messages are not length-prefixed: framing relies entirely on MessagePack
//! objects being self-delimiting. The decoder therefore works like
//! `jep.protocol.MessageSerializer` (`enqueue_data` appends to an internal
//! buffer; a message is only removed once a complete object parses from the
//! front of it) — any parse failure against the current buffer contents is
//! read as "not enough bytes yet", never as a real error, and the bytes are
//! kept for the next `push`.

use rmpv::decode::read_value;
use rmpv::encode::write_value;
use thiserror::Error;

use crate::error::DecodeError;
use crate::schema::Message;

/// Failure decoding a complete frame into a [`Message`].
///
/// Framing incompleteness is deliberately not a variant here: an
/// incomplete buffer is represented by [`Decoder::pull`] returning
/// `Ok(None)`, per spec §4.B ("on any decode error it treats the buffer as
/// incomplete ... this condition is never surfaced to callers").
#[derive(Debug, Error)]
pub enum CodecError {
    /// A complete structural value was found but did not match the schema.
    #[error(transparent)]
    Schema(#[from] DecodeError),
}

/// Accumulates inbound bytes and yields complete [`Message`]s as they
/// become available.
#[derive(Debug, Default)]
pub struct Decoder {
    buffer: Vec<u8>,
}

impl Decoder {
    /// Builds an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly received bytes to the internal buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Attempts to parse one complete structural value from the front of
    /// the buffer, consuming only the bytes it occupied. Returns `None`
    /// when the buffer holds no complete value yet, retaining every byte
    /// for the next attempt.
    fn pull_value(&mut self) -> Option<rmpv::Value> {
        let mut cursor = self.buffer.as_slice();
        let before = cursor.len();
        match read_value(&mut cursor) {
            Ok(value) => {
                let consumed = before - cursor.len();
                self.buffer.drain(..consumed);
                Some(value)
            }
            Err(_) => None,
        }
    }

    /// Pulls and decodes the next available message, if any.
    ///
    /// # Errors
    ///
    /// Returns `Ok(None)` when the buffer holds no complete frame yet.
    /// Returns `Err` when a complete frame was found but failed schema
    /// decoding — this is a real, surfaced error per spec §7, distinct
    /// from framing incompleteness.
    pub fn pull(&mut self) -> Result<Option<Message>, CodecError> {
        match self.pull_value() {
            Some(value) => Message::from_value(value).map(Some).map_err(CodecError::from),
            None => Ok(None),
        }
    }

    /// Drains every complete message currently buffered.
    ///
    /// # Errors
    ///
    /// Stops and returns `Err` at the first frame that fails schema
    /// decoding; messages already drained are not recoverable from this
    /// call alone but remain consumed from the buffer.
    pub fn drain(&mut self) -> Result<Vec<Message>, CodecError> {
        let mut messages = Vec::new();
        while let Some(message) = self.pull()? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// `true` when no bytes are currently buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Encodes a message to its self-delimited wire bytes.
#[must_use]
#[expect(
    clippy::expect_used,
    reason = "writing rmpv::Value to a growable in-memory Vec has no failure mode"
)]
pub fn encode(message: &Message) -> Vec<u8> {
    let mut bytes = Vec::new();
    write_value(&mut bytes, &message.to_value())
        .expect("encoding to an in-memory buffer cannot fail");
    bytes
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use super::*;
    use crate::messages::{BackendAlive, ContentSync, OutOfSync};

    #[test]
    fn incomplete_buffer_yields_no_message() {
        let full = encode(&Message::OutOfSync(OutOfSync {
            file: "a.rs".to_string(),
        }));
        let mut decoder = Decoder::new();
        decoder.push(&full[..full.len() - 1]);
        assert_eq!(decoder.pull().expect("not an error"), None);
    }

    #[test]
    fn pulls_exactly_one_message_per_call_and_keeps_the_rest() {
        let first = encode(&Message::BackendAlive(BackendAlive));
        let second = encode(&Message::ContentSync(ContentSync {
            file: "b.py".to_string(),
            data: "hi".to_string(),
            start: 0,
            end: None,
        }));

        let mut decoder = Decoder::new();
        decoder.push(&first);
        decoder.push(&second);

        let pulled_first = decoder.pull().expect("decode").expect("present");
        assert_eq!(pulled_first, Message::BackendAlive(BackendAlive));

        let pulled_second = decoder.pull().expect("decode").expect("present");
        assert_eq!(
            pulled_second,
            Message::ContentSync(ContentSync {
                file: "b.py".to_string(),
                data: "hi".to_string(),
                start: 0,
                end: None,
            })
        );

        assert!(decoder.is_empty());
    }

    #[test]
    fn drain_collects_every_buffered_message() {
        let messages = vec![
            Message::BackendAlive(BackendAlive),
            Message::OutOfSync(OutOfSync {
                file: "c.rs".to_string(),
            }),
        ];
        let mut decoder = Decoder::new();
        for message in &messages {
            decoder.push(&encode(message));
        }
        assert_eq!(decoder.drain().expect("decode"), messages);
    }

    #[test]
    fn partial_trailing_frame_is_retained_after_drain() {
        let whole = encode(&Message::BackendAlive(BackendAlive));
        let partial = encode(&Message::OutOfSync(OutOfSync {
            file: "d.rs".to_string(),
        }));

        let mut decoder = Decoder::new();
        decoder.push(&whole);
        decoder.push(&partial[..partial.len() - 1]);

        let drained = decoder.drain().expect("decode");
        assert_eq!(drained, vec![Message::BackendAlive(BackendAlive)]);
        assert!(!decoder.is_empty());
    }
}
