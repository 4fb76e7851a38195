//! Length-prefixed framing over an async byte stream.
//!
//! Each frame is `length : u32 (big-endian) | header | body`, where `length`
//! covers header+body+itself. The reader guarantees a complete frame is
//! buffered before returning it to the dispatcher.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum total frame size (header + body), guarding against a hostile
/// length prefix forcing an unbounded allocation.
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;
/// How long a read/write on one frame may take before the connection is
/// torn down.
pub const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors reading or writing a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The peer closed the connection cleanly mid-frame.
    #[error("connection closed")]
    Closed,
    /// The claimed frame length is smaller than the length word itself.
    #[error("frame length {0} is smaller than the length prefix")]
    TooSmall(u32),
    /// The claimed frame length exceeds [`MAX_FRAME_SIZE`].
    #[error("frame length {0} exceeds the {MAX_FRAME_SIZE} byte limit")]
    TooLarge(u32),
    /// The frame did not arrive within [`IO_TIMEOUT`].
    #[error("timed out waiting for a complete frame")]
    Timeout,
}

/// Read one complete frame (header + body, length prefix stripped) from
/// `stream`, or `None` on a clean EOF before any bytes were read.
pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(IO_TIMEOUT, read_frame_inner(stream)).await {
        Ok(result) => result,
        Err(_) => Err(FrameError::Timeout),
    }
}

async fn read_frame_inner<R>(stream: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0_u8; 4];
    match stream.read_exact(&mut len_bytes).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(FrameError::Io(err)),
    }
    let length = u32::from_be_bytes(len_bytes);
    if (length as usize) < 4 {
        return Err(FrameError::TooSmall(length));
    }
    if length as usize > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(length));
    }
    let body_len = length as usize - 4;
    let mut body = vec![0_u8; body_len];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => FrameError::Closed,
            _ => FrameError::Io(err),
        })?;
    Ok(Some(body))
}

/// Write one complete frame, prefixing `payload` (header + body already
/// encoded) with its big-endian length word.
pub async fn write_frame<W>(stream: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let total_len = u32::try_from(payload.len() + 4).map_err(|_| FrameError::TooLarge(u32::MAX))?;
    tokio::time::timeout(IO_TIMEOUT, async {
        stream.write_all(&total_len.to_be_bytes()).await?;
        stream.write_all(payload).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| FrameError::Timeout)?
    .map_err(FrameError::Io)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();
        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(frame, b"hello");
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_is_none() {
        let mut cursor = Cursor::new(Vec::new());
        let frame = read_frame(&mut cursor).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn oversized_length_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_SIZE as u32 + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge(_)));
    }

    #[tokio::test]
    async fn truncated_body_is_closed_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&20_u32.to_be_bytes());
        buf.extend_from_slice(b"short");
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::Closed));
    }
}
