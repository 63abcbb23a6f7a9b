//! Incremental UTF-8 validation for text messages and Close reasons.

use bytes::Bytes;
use std::{fmt, str};

/// A payload known to hold valid UTF-8.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub struct Utf8Bytes(Bytes);

impl Utf8Bytes {
    /// Creates from a static str.
    #[inline]
    pub const fn from_static(str: &'static str) -> Self {
        Self(Bytes::from_static(str.as_bytes()))
    }

    /// Returns as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        // SAFETY: constructed only from validated UTF-8 (the `TryFrom` impls) or a static str.
        unsafe { str::from_utf8_unchecked(&self.0) }
    }
}

impl TryFrom<Vec<u8>> for Utf8Bytes {
    type Error = str::Utf8Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        str::from_utf8(&bytes)?;
        Ok(Self(Bytes::from(bytes)))
    }
}

impl std::ops::Deref for Utf8Bytes {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<[u8]> for Utf8Bytes {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<str> for Utf8Bytes {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Utf8Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payload was not valid UTF-8. Callers map this straight onto
/// [`crate::error::ProtocolError::InvalidUtf8`], so the invalid byte range isn't tracked.
#[derive(Debug)]
pub struct InvalidUtf8;

/// An incremental UTF-8 decoder, used to validate a fragmented text message as bytes
/// arrive rather than buffering the whole message before validating it once.
///
/// Grounded on the teacher's `protocol::message::string_collect::StringCollector`, which
/// wraps the same `utf8::Decoder` this does.
#[derive(Debug)]
pub struct StringCollector {
    data: String,
    decoder: utf8::Decoder,
}

impl Default for StringCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StringCollector {
    pub fn new() -> Self {
        StringCollector { data: String::new(), decoder: utf8::Decoder::new() }
    }

    /// Feed more bytes in. Returns an error as soon as invalid UTF-8 is detected.
    pub fn extend(&mut self, tail: &[u8]) -> Result<(), InvalidUtf8> {
        let (sym, text, result) = self.decoder.decode(tail);
        self.data.push_str(sym);
        self.data.push_str(text);
        match result {
            utf8::Result::Ok | utf8::Result::Incomplete => Ok(()),
            utf8::Result::Error { remaining_input_after_error: _ } => Err(InvalidUtf8),
        }
    }

    /// Finish the message. Fails if a truncated multi-byte sequence is still pending.
    pub fn finish(self) -> Result<String, InvalidUtf8> {
        if self.decoder.has_incomplete_sequence() {
            Err(InvalidUtf8)
        } else {
            Ok(self.data)
        }
    }
}
