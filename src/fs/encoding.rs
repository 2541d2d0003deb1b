//! Buffer Encodings
//!
//! Text decodings for file content, named by the same labels the host
//! platform's file APIs accept (`utf8`, `latin1`, `base64`, ...).

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use thiserror::Error;

/// Returned when an encoding label is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown encoding: {0}")]
pub struct UnknownEncoding(pub String);

/// Supported buffer encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
    Base64,
    Base64Url,
    Hex,
    Utf16Le,
}

impl BufferEncoding {
    /// Canonical label for this encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin1",
            Self::Base64 => "base64",
            Self::Base64Url => "base64url",
            Self::Hex => "hex",
            Self::Utf16Le => "utf16le",
        }
    }
}

impl FromStr for BufferEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "ascii" => Ok(Self::Ascii),
            "latin1" | "binary" => Ok(Self::Latin1),
            "base64" => Ok(Self::Base64),
            "base64url" => Ok(Self::Base64Url),
            "hex" => Ok(Self::Hex),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            _ => Err(UnknownEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for BufferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a complete buffer to text.
pub fn decode(buffer: &[u8], encoding: BufferEncoding) -> String {
    match encoding {
        BufferEncoding::Utf8 => String::from_utf8_lossy(buffer).into_owned(),
        BufferEncoding::Ascii => buffer.iter().map(|&b| (b & 0x7f) as char).collect(),
        BufferEncoding::Latin1 => buffer.iter().map(|&b| b as char).collect(),
        BufferEncoding::Base64 => STANDARD.encode(buffer),
        BufferEncoding::Base64Url => URL_SAFE_NO_PAD.encode(buffer),
        BufferEncoding::Hex => buffer.iter().map(|b| format!("{:02x}", b)).collect(),
        BufferEncoding::Utf16Le => {
            let units = buffer
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
    }
}

// ============================================================================
// Incremental decoding
// ============================================================================

/// Decodes a byte stream chunk by chunk without splitting multi-byte
/// sequences across chunk boundaries.
#[derive(Debug)]
pub struct ChunkDecoder {
    encoding: BufferEncoding,
    pending: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new(encoding: BufferEncoding) -> Self {
        Self { encoding, pending: Vec::new() }
    }

    /// Decode as much of `chunk` as forms complete units, holding back the rest.
    pub fn write(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let keep = match self.encoding {
            BufferEncoding::Utf8 => incomplete_utf8_tail(&self.pending),
            BufferEncoding::Utf16Le => incomplete_utf16_tail(&self.pending),
            BufferEncoding::Base64 | BufferEncoding::Base64Url => self.pending.len() % 3,
            BufferEncoding::Ascii | BufferEncoding::Latin1 | BufferEncoding::Hex => 0,
        };
        let split = self.pending.len() - keep;
        let tail = self.pending.split_off(split);
        let text = decode(&self.pending, self.encoding);
        self.pending = tail;
        text
    }

    /// Flush whatever is still held back. An odd trailing UTF-16 byte is
    /// dropped, as whole-buffer decoding does.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        if rest.is_empty() {
            return String::new();
        }
        decode(&rest, self.encoding)
    }
}

/// Number of trailing bytes that start a UTF-8 sequence not yet complete.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for i in 1..=len.min(3) {
        let b = bytes[len - i];
        if b & 0xC0 == 0x80 {
            continue;
        }
        if b >= 0xC0 {
            let needed = if b >= 0xF0 {
                4
            } else if b >= 0xE0 {
                3
            } else {
                2
            };
            return if needed > i { i } else { 0 };
        }
        return 0;
    }
    0
}

fn incomplete_utf16_tail(bytes: &[u8]) -> usize {
    let odd = bytes.len() % 2;
    let even = bytes.len() - odd;
    if even >= 2 {
        let last = u16::from_le_bytes([bytes[even - 2], bytes[even - 1]]);
        if (0xD800..=0xDBFF).contains(&last) {
            return odd + 2;
        }
    }
    odd
}

// ============================================================================
// Tests
// ============================================================================
