//! Wire message framing and typed field access.
//!
//! A message on the wire is a fixed 8-byte header followed by a body whose
//! length is a whole number of 8-byte words:
//!
//! ```text
//! [u32 words_le][u8 type][u8 flags][u16 reserved][body: words*8 bytes]
//! ```
//!
//! `FrameHeader` is the zero-copy view of those first 8 bytes, in the style
//! of a `PacketHeader`: a packed `repr(C)` struct read directly out of the
//! wire bytes rather than parsed field-by-field.
//!
//! The body itself is accessed through [`MessageWriter`]/[`MessageReader`],
//! built fresh over a message for each encode or decode pass rather than
//! shared across calls.

pub mod primitive;

use crate::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const HEADER_LEN: usize = 8;

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct FrameHeader {
    pub words_le: u32,
    pub message_type: u8,
    pub flags: u8,
    pub reserved: u16,
}

impl FrameHeader {
    pub fn new(message_type: u8, flags: u8, body_words: u32) -> Self {
        Self {
            words_le: body_words,
            message_type,
            flags,
            reserved: 0,
        }
    }

    pub fn body_len(&self) -> usize {
        self.words_le as usize * primitive::WORD
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let (header, _) = Self::read_from_prefix(bytes)
            .map_err(|_| Error::Protocol("short frame header".into()))?;
        Ok(header)
    }
}

/// A decoded or to-be-encoded message: a type tag, flags, and a body of
/// whole 8-byte words.
#[derive(Debug, Clone)]
pub struct Message {
    pub message_type: u8,
    pub flags: u8,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(message_type: u8) -> Self {
        Self {
            message_type,
            flags: 0,
            body: Vec::new(),
        }
    }

    pub fn writer(&mut self) -> MessageWriter<'_> {
        MessageWriter { body: &mut self.body }
    }

    pub fn reader(&self) -> MessageReader<'_> {
        MessageReader { body: &self.body, offset: 0 }
    }

    /// Serialize header + body into a single frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.body.len() % primitive::WORD != 0 {
            return Err(Error::Protocol("message body is not word-aligned".into()));
        }
        let words = u32::try_from(self.body.len() / primitive::WORD)
            .map_err(|_| Error::Protocol("message body too large".into()))?;
        let header = FrameHeader::new(self.message_type, self.flags, words);
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.body);
        Ok(out)
    }

    /// Parse a complete frame (header + body) out of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(bytes)?;
        let body = bytes
            .get(HEADER_LEN..HEADER_LEN + header.body_len())
            .ok_or_else(|| Error::Protocol("frame shorter than declared body length".into()))?
            .to_vec();
        Ok(Self {
            message_type: header.message_type,
            flags: header.flags,
            body,
        })
    }
}

/// Appends typed fields to a message body, padding text to word boundaries.
pub struct MessageWriter<'a> {
    body: &'a mut Vec<u8>,
}

impl MessageWriter<'_> {
    pub fn put_uint8(&mut self, value: u8) -> &mut Self {
        primitive::write_uint8(self.body, value);
        self
    }

    pub fn put_uint32(&mut self, value: u32) -> &mut Self {
        primitive::write_uint32(self.body, value);
        self
    }

    pub fn put_uint64(&mut self, value: u64) -> &mut Self {
        primitive::write_uint64(self.body, value);
        self
    }

    pub fn put_int64(&mut self, value: i64) -> &mut Self {
        primitive::write_int64(self.body, value);
        self
    }

    pub fn put_double(&mut self, value: f64) -> &mut Self {
        primitive::write_double(self.body, value);
        self
    }

    pub fn put_text(&mut self, value: &str) -> &mut Self {
        primitive::write_text(self.body, value);
        self
    }

    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.body.extend_from_slice(bytes);
        primitive::pad_to_word(self.body);
        self
    }

    /// Zero-pad the body out to the next word boundary without appending a
    /// field. Used after a run of sub-word values, e.g. nibble-packed
    /// row-type headers.
    pub fn align(&mut self) -> &mut Self {
        primitive::pad_to_word(self.body);
        self
    }
}

/// The outcome of reading the last field successfully deserialized from a
/// message body: `More` means the cursor has not yet reached the declared
/// end, `Last` means this read consumed exactly up to it. Either way the
/// value is valid; `Last` is not an error, just a signal that no further
/// reads should be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    More(T),
    Last(T),
}

impl<T> ReadOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            ReadOutcome::More(v) | ReadOutcome::Last(v) => v,
        }
    }

    pub fn is_last(&self) -> bool {
        matches!(self, ReadOutcome::Last(_))
    }
}

/// Reads typed fields out of a message body, tracking the cursor.
pub struct MessageReader<'a> {
    body: &'a [u8],
    offset: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self { body, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.body.len() - self.offset
    }

    /// Skip zero padding up to the next 8-byte boundary, e.g. after a run
    /// of sub-word fields such as parameter type tags.
    pub fn align(&mut self) -> Result<()> {
        let padded = self.offset + primitive::pad_len(self.offset);
        if padded > self.body.len() {
            return Err(Error::Protocol("alignment padding runs past end of message body".into()));
        }
        self.offset = padded;
        Ok(())
    }

    fn finish<T>(&mut self, value: T, next_offset: usize) -> Result<ReadOutcome<T>> {
        self.offset = next_offset;
        if self.offset == self.body.len() {
            Ok(ReadOutcome::Last(value))
        } else if self.offset < self.body.len() {
            Ok(ReadOutcome::More(value))
        } else {
            Err(Error::Protocol("read past end of message body".into()))
        }
    }

    pub fn get_uint8(&mut self) -> Result<ReadOutcome<u8>> {
        let (v, next) = primitive::read_uint8(self.body, self.offset)?;
        self.finish(v, next)
    }

    pub fn get_uint32(&mut self) -> Result<ReadOutcome<u32>> {
        let (v, next) = primitive::read_uint32(self.body, self.offset)?;
        self.finish(v, next)
    }

    pub fn get_uint64(&mut self) -> Result<ReadOutcome<u64>> {
        let (v, next) = primitive::read_uint64(self.body, self.offset)?;
        self.finish(v, next)
    }

    pub fn get_int64(&mut self) -> Result<ReadOutcome<i64>> {
        let (v, next) = primitive::read_int64(self.body, self.offset)?;
        self.finish(v, next)
    }

    pub fn get_double(&mut self) -> Result<ReadOutcome<f64>> {
        let (v, next) = primitive::read_double(self.body, self.offset)?;
        self.finish(v, next)
    }

    pub fn get_text(&mut self) -> Result<ReadOutcome<String>> {
        let (v, next) = primitive::read_text(self.body, self.offset)?;
        self.finish(v, next)
    }

    /// Read `len` raw bytes, then skip zero padding up to the next 8-byte
    /// boundary, the binary-safe counterpart to [`Self::get_text`] for
    /// length-prefixed fields such as blobs.
    pub fn get_raw(&mut self, len: usize) -> Result<ReadOutcome<Vec<u8>>> {
        let (v, next) = primitive::read_raw(self.body, self.offset, len)?;
        self.finish(v, next)
    }
}
