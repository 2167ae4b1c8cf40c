// Immutable byte string. Not Unicode text: equality and ordering are
// lexicographic over raw bytes.

#[derive(Debug, PartialEq, Eq)]
pub struct LumaStr {
    bytes: Box<[u8]>,
}

impl LumaStr {
    pub fn new(bytes: &[u8]) -> Self {
        LumaStr {
            bytes: bytes.into(),
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow as UTF-8 text when the payload happens to be valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Lossy text rendering for diagnostics and `print`.
    pub fn display(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}
