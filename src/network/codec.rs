//! Line codec for the chat wire format.
//!
//! Lines end with `\n`; a trailing `\r` is stripped. Bytes that are not
//! valid UTF-8 are replaced with U+FFFD instead of failing the stream, so one
//! bad byte never costs a client its connection.

use bytes::{BufMut, BytesMut};
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder, LinesCodecError};

/// Newline-terminated line codec with a length limit.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Longest accepted line, excluding the delimiter
    max_len: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(usize::MAX)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    fn take_line(&mut self, src: &mut BytesMut, len: usize, delimited: bool) -> String {
        let mut line = src.split_to(len + usize::from(delimited));
        self.next_index = 0;
        if delimited {
            line.truncate(len);
        }
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        String::from_utf8_lossy(&line).into_owned()
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let len = self.next_index + offset;
            let content = if len > 0 && src[len - 1] == b'\r' { len - 1 } else { len };
            if content > self.max_len {
                return Err(LinesCodecError::MaxLineLengthExceeded);
            }
            return Ok(Some(self.take_line(src, len, true)));
        }

        self.next_index = src.len();
        // A pending `\r` may still turn out to be part of the delimiter.
        let pending = src.len() - usize::from(src.last() == Some(&b'\r'));
        if pending > self.max_len {
            return Err(LinesCodecError::MaxLineLengthExceeded);
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                let len = src.len();
                Ok(Some(self.take_line(src, len, false)))
            }
        }
    }
}

impl Encoder<Arc<str>> for LineCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: Arc<str>, dst: &mut BytesMut) -> Result<(), LinesCodecError> {
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
