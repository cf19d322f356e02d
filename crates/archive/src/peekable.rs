//! Look at the start of a stream without losing it.
//!
//! Detection reads a few hundred bytes (possibly through a decoder) to decide
//! what a file is; extraction then wants the whole stream from byte zero.

use std::io::{self, Chain, Cursor, Read};

pub struct PeekableReader<R> {
    inner: R,
    head: Vec<u8>,
}

impl<R: Read> PeekableReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, head: Vec::new() }
    }

    /// The first `len` bytes of the stream, or all of it if it is shorter.
    ///
    /// Bytes already peeked are kept, so asking again (for more or fewer) only
    /// reads what is missing.
    pub fn peek(&mut self, len: usize) -> io::Result<&[u8]> {
        if let Some(missing) = len.checked_sub(self.head.len())
            && missing > 0
        {
            let missing = u64::try_from(missing).unwrap_or(u64::MAX);
            (&mut self.inner).take(missing).read_to_end(&mut self.head)?;
        }
        Ok(&self.head[..len.min(self.head.len())])
    }

    /// The whole stream again, starting with the peeked bytes.
    pub fn rewind(self) -> Chain<Cursor<Vec<u8>>, R> {
        Cursor::new(self.head).chain(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &[u8] = b"0123456789abcdef";

    #[test]
    fn test_peek_grows_and_shrinks() {
        let mut reader = PeekableReader::new(DATA);
        assert_eq!(reader.peek(4).unwrap(), b"0123");
        assert_eq!(reader.peek(10).unwrap(), b"0123456789");
        assert_eq!(reader.peek(2).unwrap(), b"01");
    }

    #[test]
    fn test_rewind_replays_head() {
        let mut reader = PeekableReader::new(DATA);
        reader.peek(6).unwrap();
        let mut all = Vec::new();
        reader.rewind().read_to_end(&mut all).unwrap();
        assert_eq!(all, DATA);
    }

    #[test]
    fn test_short_stream() {
        let mut reader = PeekableReader::new(&b"abc"[..]);
        assert_eq!(reader.peek(512).unwrap(), b"abc");
    }
}
