//! # Stream Framing
//!
//! Reassembles discrete frames from an arbitrarily chunked TCP byte stream.
//!
//! | Strategy | Wire form |
//! |----------|-----------|
//! | `NewlineDelimited` | `payload \n` |
//! | `LengthPrefixed` | `u32 little-endian length` then `payload` |
//!
//! Unterminated trailing bytes stay buffered and are prefixed to the next read.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default frame size limit (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

const DELIMITER: u8 = b'\n';
const LENGTH_PREFIX_LEN: usize = 4;

/// Frame boundary rule for the reliable transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingStrategy {
    /// One frame per line. Blank lines are skipped.
    #[default]
    NewlineDelimited,
    /// Four-byte little-endian length prefix.
    LengthPrefixed,
}

impl FromStr for FramingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "newline" | "newline_delimited" => Ok(Self::NewlineDelimited),
            "length" | "length_prefixed" => Ok(Self::LengthPrefixed),
            other => Err(format!("unknown framing strategy: {other}")),
        }
    }
}

/// Wrap a payload for the wire.
pub fn encode_frame(
    strategy: FramingStrategy,
    payload: &[u8],
    max_frame_len: usize,
) -> Result<Vec<u8>, FrameError> {
    if payload.len() > max_frame_len {
        return Err(FrameError::Oversized {
            len: payload.len(),
            max: max_frame_len,
        });
    }

    match strategy {
        FramingStrategy::NewlineDelimited => {
            if payload.contains(&DELIMITER) {
                return Err(FrameError::DelimiterInPayload);
            }
            let mut out = Vec::with_capacity(payload.len() + 1);
            out.extend_from_slice(payload);
            out.push(DELIMITER);
            Ok(out)
        }
        FramingStrategy::LengthPrefixed => {
            let len = u32::try_from(payload.len()).map_err(|_| FrameError::Oversized {
                len: payload.len(),
                max: u32::MAX as usize,
            })?;
            let mut out = Vec::with_capacity(payload.len() + LENGTH_PREFIX_LEN);
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(payload);
            Ok(out)
        }
    }
}

/// Incremental frame decoder for one connection.
#[derive(Debug)]
pub struct FrameDecoder {
    strategy: FramingStrategy,
    max_frame_len: usize,
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no delimiter.
    scanned: usize,
}

impl FrameDecoder {
    /// Create a decoder.
    pub fn new(strategy: FramingStrategy, max_frame_len: usize) -> Self {
        Self {
            strategy,
            max_frame_len,
            buffer: Vec::new(),
            scanned: 0,
        }
    }

    /// Append bytes read from the socket.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete frame, if any.
    ///
    /// # Errors
    ///
    /// `Oversized` when a frame exceeds `max_frame_len`. For newline framing
    /// the pending bytes are discarded and decoding can continue; a length
    /// prefixed stream cannot be resynchronised, see [`FrameDecoder::is_recoverable`].
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        match self.strategy {
            FramingStrategy::NewlineDelimited => self.next_line(),
            FramingStrategy::LengthPrefixed => self.next_prefixed(),
        }
    }

    /// Whether decoding can continue after an `Oversized` error.
    pub fn is_recoverable(&self) -> bool {
        self.strategy == FramingStrategy::NewlineDelimited
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        loop {
            let found = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == DELIMITER)
                .map(|offset| self.scanned + offset);
            let Some(pos) = found else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_frame_len {
                    let len = self.buffer.len();
                    self.buffer.clear();
                    self.scanned = 0;
                    return Err(FrameError::Oversized {
                        len,
                        max: self.max_frame_len,
                    });
                }
                return Ok(None);
            };

            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            self.scanned = 0;

            if line.len() > self.max_frame_len {
                return Err(FrameError::Oversized {
                    len: line.len(),
                    max: self.max_frame_len,
                });
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(line));
        }
    }

    fn next_prefixed(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.buffer.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_LEN]);
        let len = u32::from_le_bytes(prefix) as usize;

        if len > self.max_frame_len {
            return Err(FrameError::Oversized {
                len,
                max: self.max_frame_len,
            });
        }
        if self.buffer.len() < LENGTH_PREFIX_LEN + len {
            return Ok(None);
        }

        let frame = self.buffer[LENGTH_PREFIX_LEN..LENGTH_PREFIX_LEN + len].to_vec();
        self.buffer.drain(..LENGTH_PREFIX_LEN + len);
        Ok(Some(frame))
    }
}
