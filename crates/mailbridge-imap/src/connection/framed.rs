//! Line framing with literal support.
//!
//! A server response is one CRLF-terminated line, except that a line ending
//! in `{n}` is followed by exactly `n` bytes of literal data and then the
//! rest of the response.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 8192;

/// Longest accepted line, literals excluded.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest accepted literal.
pub const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered reader/writer speaking IMAP framing.
#[derive(Debug)]
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a transport.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
        }
    }

    /// Reads one complete response including any literals.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = BytesMut::with_capacity(256);
        loop {
            let start = response.len();
            self.read_line_into(&mut response).await?;

            let Some(length) = literal_length(&response[start..]) else {
                return Ok(response.to_vec());
            };
            if length > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal of {length} bytes exceeds {MAX_LITERAL_SIZE}"
                )));
            }
            let mut literal = vec![0u8; length];
            self.reader.read_exact(&mut literal).await?;
            response.put_slice(&literal);
        }
    }

    async fn read_line_into(&mut self, out: &mut BytesMut) -> Result<()> {
        let mut taken = 0usize;
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                out.put_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                return Ok(());
            }

            let len = buf.len();
            out.put_slice(buf);
            self.reader.consume(len);
            taken += len;
            if taken > MAX_LINE_LENGTH {
                return Err(Error::Protocol("response line too long".to_string()));
            }
        }
    }

    /// Writes and flushes raw bytes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns the transport. Buffered unread bytes are discarded.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Returns `n` if the line ends with `{n}` or `{n+}` before its line ending.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\n")?;
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"* 1 FETCH (BODY[] {42}\r\n"), Some(42));
        assert_eq!(literal_length(b"A1 APPEND {7+}\r\n"), Some(7));
        assert_eq!(literal_length(b"* OK done\r\n"), None);
        assert_eq!(literal_length(b"* OK {}\r\n"), None);
        assert_eq!(literal_length(b"* OK {12}"), None);
    }

    #[tokio::test]
    async fn test_reads_lines_in_order() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n* 3 EXI")
            .read(b"STS\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"* 3 EXISTS\r\n");
    }

    #[tokio::test]
    async fn test_reads_literal_and_tail() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (UID 9 BODY[] {5}\r\nhel")
            .read(b"lo)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* 1 FETCH (UID 9 BODY[] {5}\r\nhello)\r\n"
        );
    }

    #[tokio::test]
    async fn test_eof_is_error() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(framed.read_response().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_write_all() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);
        framed.write_all(b"A0001 NOOP\r\n").await.unwrap();
    }
}
