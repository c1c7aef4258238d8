//! Length-prefixed framing over an async byte stream.
//!
//! ## Wire Format
//!
//! ```text
//! [length: u32 big-endian][payload: exactly `length` bytes]
//!
//! Example:
//! 00 00 00 05 68 65 6c 6c 6f    ("hello")
//! ```
//!
//! Handles, chat text and the quit sentinel all travel as ordinary frames.
//! The codec knows nothing about chat semantics.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 4;

/// Upper bound on a single read into the payload buffer.
const READ_CHUNK: usize = 8 * 1024;

/// Errors produced while sending or receiving a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream cleanly on a frame boundary.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The stream ended partway through a header or payload.
    #[error("truncated frame: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    /// The declared or supplied length exceeds the allowed ceiling.
    #[error("frame of {declared} bytes exceeds limit of {limit} bytes")]
    TooLarge { declared: usize, limit: usize },

    /// The underlying transport failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write one frame: the big-endian payload length followed by the payload.
///
/// The stream is flushed once the payload has been written in full.
pub async fn send_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        declared: payload.len(),
        limit: u32::MAX as usize,
    })?;

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_u32(len);
    frame.extend_from_slice(payload);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and return its payload.
///
/// Partial deliveries are accumulated until the full header and payload have
/// arrived. With `limit` set, a declared length above it is rejected before
/// any payload is read; `None` honours any length the header declares.
pub async fn recv_frame<R>(reader: &mut R, limit: Option<usize>) -> Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                FrameError::ConnectionClosed
            } else {
                FrameError::Truncated {
                    expected: HEADER_LEN,
                    received: filled,
                }
            });
        }
        filled += n;
    }

    let declared = u32::from_be_bytes(header) as usize;
    if let Some(limit) = limit {
        if declared > limit {
            return Err(FrameError::TooLarge { declared, limit });
        }
    }

    // Grow the buffer as bytes arrive rather than trusting the header
    // with one large up-front allocation.
    let mut payload = BytesMut::with_capacity(declared.min(READ_CHUNK));
    while payload.len() < declared {
        let want = (declared - payload.len()).min(READ_CHUNK);
        let start = payload.len();
        payload.resize(start + want, 0);

        let n = reader.read(&mut payload[start..]).await?;
        payload.truncate(start + n);
        if n == 0 {
            return Err(FrameError::Truncated {
                expected: declared,
                received: payload.len(),
            });
        }
    }

    Ok(payload.freeze())
}
