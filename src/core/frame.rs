//! Newline framing for the ingestion stream.
//!
//! A frame is everything up to a `\n`. A `\r` right before the terminator is
//! dropped, and a UTF-8 byte-order-mark at the start of the first frame of a
//! stream is stripped. Blank lines carry no frame.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;
const INITIAL_BUFFER_SIZE: usize = 8 * 1024;
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
}

/// Splits a growing byte buffer into line frames.
#[derive(Debug)]
pub struct LineFramer {
    max_frame_len: usize,
    /// Bytes at the head of the buffer already known to hold no terminator.
    scanned: usize,
    first_frame_seen: bool,
}

impl LineFramer {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            scanned: 0,
            first_frame_seen: false,
        }
    }

    /// Removes and returns the next complete frame from `buf`.
    ///
    /// Returns `Ok(None)` when `buf` holds no terminator yet; the partial
    /// line is left in place for the next read to complete.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        loop {
            let Some(offset) = buf[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = buf.len();
                if buf.len() > self.max_frame_len {
                    return Err(FrameError::FrameTooLarge {
                        limit: self.max_frame_len,
                    });
                }
                return Ok(None);
            };

            let end = self.scanned + offset;
            self.scanned = 0;

            let mut line = buf.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            if !self.first_frame_seen && line.starts_with(UTF8_BOM) {
                line.advance(UTF8_BOM.len());
            }

            if line.len() > self.max_frame_len {
                return Err(FrameError::FrameTooLarge {
                    limit: self.max_frame_len,
                });
            }

            // Blank lines do not count as the first frame.
            if line.is_empty() {
                continue;
            }

            self.first_frame_seen = true;
            return Ok(Some(line.freeze()));
        }
    }
}

/// Lazily yields frames from an async byte source until it is exhausted.
///
/// Bytes left over after the last terminator when the source closes are
/// treated as a partial frame and discarded.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    framer: LineFramer,
    finished: bool,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            framer: LineFramer::new(max_frame_len),
            finished: false,
        }
    }

    /// Returns the next frame, or `Ok(None)` once the source has closed.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            if let Some(frame) = self.framer.decode(&mut self.buf)? {
                return Ok(Some(frame));
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if !self.buf.is_empty() {
                    debug!(
                        bytes = self.buf.len(),
                        "discarding unterminated bytes at end of stream"
                    );
                    self.buf.clear();
                }
                self.finished = true;
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const TWO_FRAMES: &[u8] = b"{\"Id\":1,\"Name\":\"a\"}\n{\"Id\":2,\"Name\":\"b\"}\n";

    #[test]
    fn frames_split_at_every_offset() {
        for split in 0..=TWO_FRAMES.len() {
            let mut framer = LineFramer::new(DEFAULT_MAX_FRAME_LEN);
            let mut buf = BytesMut::new();
            let mut frames = Vec::new();

            buf.extend_from_slice(&TWO_FRAMES[..split]);
            while let Some(frame) = framer.decode(&mut buf).unwrap() {
                frames.push(frame);
            }
            buf.extend_from_slice(&TWO_FRAMES[split..]);
            while let Some(frame) = framer.decode(&mut buf).unwrap() {
                frames.push(frame);
            }

            assert_eq!(
                frames,
                vec![
                    Bytes::from_static(b"{\"Id\":1,\"Name\":\"a\"}"),
                    Bytes::from_static(b"{\"Id\":2,\"Name\":\"b\"}"),
                ],
                "split at {split}"
            );
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn partial_line_waits_for_terminator() {
        let mut framer = LineFramer::new(DEFAULT_MAX_FRAME_LEN);
        let mut buf = BytesMut::from(&b"{\"Id\":1"[..]);
        assert!(framer.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"{\"Id\":1");

        buf.extend_from_slice(b"}\r\n");
        assert_eq!(framer.decode(&mut buf).unwrap().unwrap(), &b"{\"Id\":1}"[..]);
    }

    #[test]
    fn carriage_return_is_dropped() {
        let mut framer = LineFramer::new(DEFAULT_MAX_FRAME_LEN);
        let mut buf = BytesMut::from(&b"abc\r\n"[..]);
        assert_eq!(framer.decode(&mut buf).unwrap().unwrap(), &b"abc"[..]);
    }

    #[test]
    fn bom_is_stripped_from_first_frame_only() {
        let mut framer = LineFramer::new(DEFAULT_MAX_FRAME_LEN);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(UTF8_BOM);
        buf.extend_from_slice(b"first\n");
        buf.extend_from_slice(UTF8_BOM);
        buf.extend_from_slice(b"second\n");

        assert_eq!(framer.decode(&mut buf).unwrap().unwrap(), &b"first"[..]);
        let second = framer.decode(&mut buf).unwrap().unwrap();
        assert!(second.starts_with(UTF8_BOM));
    }

    #[test]
    fn bom_after_leading_blank_line_is_stripped() {
        let mut framer = LineFramer::new(DEFAULT_MAX_FRAME_LEN);
        let mut buf = BytesMut::from(&b"\r\n"[..]);
        buf.extend_from_slice(UTF8_BOM);
        buf.extend_from_slice(b"{\"Id\":1}\n");

        assert_eq!(framer.decode(&mut buf).unwrap().unwrap(), &b"{\"Id\":1}"[..]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut framer = LineFramer::new(DEFAULT_MAX_FRAME_LEN);
        let mut buf = BytesMut::from(&b"\n\r\nx\n"[..]);
        assert_eq!(framer.decode(&mut buf).unwrap().unwrap(), &b"x"[..]);
        assert!(framer.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_unterminated_line_is_rejected() {
        let mut framer = LineFramer::new(8);
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        assert!(matches!(
            framer.decode(&mut buf),
            Err(FrameError::FrameTooLarge { limit: 8 })
        ));
    }

    #[test]
    fn oversized_terminated_line_is_rejected() {
        let mut framer = LineFramer::new(4);
        let mut buf = BytesMut::from(&b"ok\ntoo long\n"[..]);
        assert_eq!(framer.decode(&mut buf).unwrap().unwrap(), &b"ok"[..]);
        assert!(framer.decode(&mut buf).is_err());
    }

    #[tokio::test]
    async fn reader_yields_frames_then_end_of_stream() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(server, DEFAULT_MAX_FRAME_LEN);

        let writer = tokio::spawn(async move {
            client.write_all(&TWO_FRAMES[..7]).await.unwrap();
            tokio::task::yield_now().await;
            client.write_all(&TWO_FRAMES[7..]).await.unwrap();
        });

        assert_eq!(
            reader.next_frame().await.unwrap().unwrap(),
            &b"{\"Id\":1,\"Name\":\"a\"}"[..]
        );
        assert_eq!(
            reader.next_frame().await.unwrap().unwrap(),
            &b"{\"Id\":2,\"Name\":\"b\"}"[..]
        );
        writer.await.unwrap();
        assert!(reader.next_frame().await.unwrap().is_none());
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unterminated_tail_is_discarded() {
        let source: &[u8] = b"{\"Id\":1}\n{\"Id\":2";
        let mut reader = FrameReader::new(source, DEFAULT_MAX_FRAME_LEN);

        assert_eq!(reader.next_frame().await.unwrap().unwrap(), &b"{\"Id\":1}"[..]);
        assert!(reader.next_frame().await.unwrap().is_none());
    }
}
