use serde::Serialize;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::errors::{NetError, NetResult};

/// Maximum allowed record size (4 KiB, excluding the newline) to prevent
/// unbounded buffering of a peer that never sends a delimiter.
pub const MAX_RECORD_SIZE: usize = 4 * 1024;

/// Read one newline-delimited record.
///
/// Returns `Ok(None)` on a clean end-of-stream. A trailing `\r` is dropped.
/// Bytes that aren't UTF-8 become replacement characters, so a garbled
/// record fails to decode instead of failing the read.
///
/// # Errors
///
/// - `InvalidData` if the record exceeds [`MAX_RECORD_SIZE`]
/// - `UnexpectedEof` if the stream ends in the middle of a record
pub async fn read_delimited<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = MAX_RECORD_SIZE as u64 + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() != Some(&b'\n') {
        if buf.len() > MAX_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("record exceeds maximum allowed size of {MAX_RECORD_SIZE} bytes"),
            ));
        }
        return Err(io::ErrorKind::UnexpectedEof.into());
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Serialize `value` as JSON and write it as one newline-terminated record.
///
/// # Errors
///
/// - [`NetError::MessageTooLarge`] if the encoded record exceeds [`MAX_RECORD_SIZE`]
/// - [`NetError::Io`] if serialization or the write fails
pub async fn write_delimited<T, W>(writer: &mut W, value: &T) -> NetResult<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut record = serde_json::to_vec(value)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
    if record.len() > MAX_RECORD_SIZE {
        return Err(NetError::MessageTooLarge {
            actual: record.len(),
            max: MAX_RECORD_SIZE,
        });
    }

    // Write the record and its delimiter in one chunk.
    record.push(b'\n');
    writer.write_all(&record).await?;
    writer.flush().await?;
    Ok(())
}
