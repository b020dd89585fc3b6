//! Varint length-delimited protobuf framing.

use bytes::BytesMut;
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{WireError, WireResult};

/// Frames larger than this are rejected as malformed.
pub const MAX_FRAME_SIZE: u64 = 16 * 1024 * 1024;

/// Write one length-delimited message and flush.
pub async fn write_frame<M, S>(stream: &mut S, message: &M) -> WireResult<()>
where
    M: Message,
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(message.encoded_len() + 5);
    message
        .encode_length_delimited(&mut buf)
        .map_err(|e| WireError::Protocol(e.to_string()))?;
    stream.write_all(&buf).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one length-delimited message.
///
/// Returns `Ok(None)` on a clean end of stream (EOF before the first
/// length byte). EOF inside a frame, an oversized length, or a decode
/// failure are protocol errors.
pub async fn read_frame<M, S>(stream: &mut S) -> WireResult<Option<M>>
where
    M: Message + Default,
    S: AsyncRead + Unpin + ?Sized,
{
    let mut len: u64 = 0;
    let mut shift = 0u32;
    let mut first = true;
    loop {
        let mut byte = [0u8; 1];
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            if first {
                return Ok(None);
            }
            return Err(WireError::Protocol("stream ended inside frame length".into()));
        }
        first = false;
        len |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 63 {
            return Err(WireError::Protocol("frame length varint too long".into()));
        }
    }
    if len > MAX_FRAME_SIZE {
        return Err(WireError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_SIZE}-byte limit"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            WireError::Protocol("stream ended inside frame body".into())
        } else {
            WireError::Io(e)
        }
    })?;
    M::decode(buf.as_slice())
        .map(Some)
        .map_err(|e| WireError::Protocol(e.to_string()))
}
