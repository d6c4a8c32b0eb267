//! NUL-terminated message framing.
//!
//! Every Varlink message is a single JSON document followed by one `\0` byte:
//!
//! ```text
//! {"method":"org.varlink.service.GetInfo"}\0
//! ```
//!
//! JSON text never contains a raw NUL, so the terminator is unambiguous.
use super::TransportError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum message size (16 MiB) to avoid unbounded buffering of a misbehaving peer.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const TERMINATOR: u8 = 0;

/// Reads one message, returning its payload without the terminator.
///
/// # Errors
///
/// * [`TransportError::ConnectionClosed`] if the stream ends before any byte is read.
/// * [`TransportError::Truncated`] if the stream ends in the middle of a message.
/// * [`TransportError::FrameTooLarge`] if no terminator shows up within [`MAX_FRAME_SIZE`] bytes.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let limit = MAX_FRAME_SIZE as u64 + 1;

    let read = (&mut *reader)
        .take(limit)
        .read_until(TERMINATOR, &mut frame)
        .await?;

    if read == 0 {
        return Err(TransportError::ConnectionClosed);
    }

    if frame.last() != Some(&TERMINATOR) {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(MAX_FRAME_SIZE));
        }
        return Err(TransportError::Truncated);
    }

    frame.pop();
    tracing::trace!(bytes = frame.len(), "received message");
    Ok(frame)
}

/// Writes one message followed by the terminator and flushes the stream.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload).await?;
    writer.write_all(&[TERMINATOR]).await?;
    writer.flush().await?;

    tracing::trace!(bytes = payload.len(), "sent message");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_consecutive_frames() {
        let (client, mut server) = tokio::io::duplex(64);

        server.write_all(b"{\"a\":1}\0{\"b\":2}\0").await.unwrap();
        drop(server);

        let mut reader = BufReader::new(client);
        assert_eq!(read_frame(&mut reader).await.unwrap(), b"{\"a\":1}");
        assert_eq!(read_frame(&mut reader).await.unwrap(), b"{\"b\":2}");
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn eof_inside_a_frame_is_truncation() {
        let (client, mut server) = tokio::io::duplex(64);

        server.write_all(b"{\"a\":").await.unwrap();
        drop(server);

        let mut reader = BufReader::new(client);
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(TransportError::Truncated)
        ));
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected() {
        let oversized = vec![b' '; MAX_FRAME_SIZE + 10];
        let mut reader = BufReader::new(oversized.as_slice());

        assert!(matches!(
            read_frame(&mut reader).await,
            Err(TransportError::FrameTooLarge(MAX_FRAME_SIZE))
        ));
    }

    #[tokio::test]
    async fn writes_terminator() {
        let mut written = Vec::new();

        write_frame(&mut written, b"{}").await.unwrap();

        assert_eq!(written, b"{}\0");
    }
}
