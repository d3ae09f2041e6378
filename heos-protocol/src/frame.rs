//! CRLF framing for both channels.
//!
//! The command channel may split one message across any number of reads, so
//! [`CommandFramer`] accumulates bytes until a read ends on the delimiter and
//! then hands the buffer over as whole JSON documents. CRLF inside a document
//! (pretty-printed responses) does not end it.
//! The event channel always delivers whole messages, possibly several per
//! read, which [`EventFramer`] simply splits.

use crate::error::ProtocolError;
use crate::{DEFAULT_MAX_MESSAGE_SIZE, DELIMITER};
use bytes::{Bytes, BytesMut};
use serde::de::IgnoredAny;

/// Splits `data` on CRLF, skipping empty and whitespace-only fragments.
pub fn split_messages(data: &Bytes) -> Vec<Bytes> {
    let mut messages = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i + DELIMITER.len() <= data.len() {
        if &data[i..i + DELIMITER.len()] == DELIMITER {
            push_fragment(&mut messages, data.slice(start..i));
            i += DELIMITER.len();
            start = i;
        } else {
            i += 1;
        }
    }
    push_fragment(&mut messages, data.slice(start..));

    messages
}

fn push_fragment(messages: &mut Vec<Bytes>, fragment: Bytes) {
    if !fragment.iter().all(u8::is_ascii_whitespace) {
        messages.push(fragment);
    }
}

/// Splits `data` into its top-level JSON documents.
///
/// Whitespace between and inside documents is ignored, CRLF included. From
/// the first byte that does not parse, the rest falls back to CRLF splitting
/// so the malformed text still reaches the decoder and gets reported.
pub fn split_documents(data: &Bytes) -> Vec<Bytes> {
    let (mut messages, unfinished) = take_documents(data);
    if let Some(start) = unfinished {
        messages.extend(split_messages(&data.slice(start..)));
    }
    messages
}

/// Like [`split_documents`], but stops at a trailing document that ends
/// early and returns its offset instead.
fn take_documents(data: &Bytes) -> (Vec<Bytes>, Option<usize>) {
    let mut messages = Vec::new();
    let mut stream = serde_json::Deserializer::from_slice(data).into_iter::<IgnoredAny>();
    let mut start = 0;

    loop {
        match stream.next() {
            Some(Ok(_)) => {
                let end = stream.byte_offset();
                let skip = data[start..end]
                    .iter()
                    .take_while(|b| b.is_ascii_whitespace())
                    .count();
                messages.push(data.slice(start + skip..end));
                start = end;
            }
            Some(Err(e)) if e.is_eof() => return (messages, Some(start)),
            Some(Err(_)) => {
                messages.extend(split_messages(&data.slice(start..)));
                break;
            }
            None => break,
        }
    }

    (messages, None)
}

/// Accumulating framer for the command channel.
#[derive(Debug)]
pub struct CommandFramer {
    buffer: BytesMut,
    max_message_size: usize,
    discarding: bool,
}

impl CommandFramer {
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_message_size,
            discarding: false,
        }
    }

    /// Feeds one read into the framer and returns any completed messages.
    ///
    /// The buffer is only taken when the chunk itself ends with CRLF, and is
    /// then split into JSON documents. A chunk that ends with a sentinel and
    /// the final response yields both. A document cut off at one of its own
    /// line breaks stays buffered until the rest arrives.
    ///
    /// Exceeding the size limit clears the buffer and returns
    /// [`ProtocolError::MessageTooLarge`] once; the rest of that message is
    /// discarded up to the next chunk ending on the delimiter.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>, ProtocolError> {
        let complete = chunk.ends_with(DELIMITER);

        if self.discarding {
            if complete {
                self.discarding = false;
            }
            return Ok(Vec::new());
        }

        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() > self.max_message_size {
            let size = self.buffer.len();
            self.buffer.clear();
            self.discarding = !complete;
            return Err(ProtocolError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }

        if !complete {
            return Ok(Vec::new());
        }

        let data = self.buffer.split().freeze();
        let (messages, unfinished) = take_documents(&data);
        if let Some(start) = unfinished {
            self.buffer.extend_from_slice(&data[start..]);
        }
        Ok(messages)
    }

    /// Returns the number of bytes waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

impl Default for CommandFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateless framer for the event channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventFramer;

impl EventFramer {
    pub fn new() -> Self {
        Self
    }

    /// Splits one read into its messages.
    pub fn split(&self, chunk: &[u8]) -> Vec<Bytes> {
        split_messages(&Bytes::copy_from_slice(chunk))
    }
}
