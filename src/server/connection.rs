//! Connection Handler
//!
//! Request/reply loop for a single client.

use std::sync::Arc;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::CacheError;

/// Longest request line accepted, newline excluded
const MAX_LINE_BYTES: usize = 64 * 1024;

/// One framed read from the client
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    /// A complete line without its terminator
    Line(Vec<u8>),
    /// A line over `MAX_LINE_BYTES`, already discarded up to its newline
    TooLong,
    /// Peer closed the stream
    Eof,
}

/// Serves one client until it closes the stream or an I/O error occurs.
///
/// Lines are handled strictly in arrival order; every line gets exactly one
/// reply line, including malformed ones (bad UTF-8, oversized lines).
pub async fn handle_connection<S>(stream: S, peer: String, dispatcher: Arc<Dispatcher>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(%peer, "client connected");

    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%peer, "read failed: {}", e);
                break;
            }
        };

        let mut reply = match frame {
            Frame::Eof => break,
            Frame::TooLong => {
                warn!(%peer, "request line over {} bytes rejected", MAX_LINE_BYTES);
                CacheError::InvalidArgument(format!(
                    "request line exceeds {} bytes",
                    MAX_LINE_BYTES
                ))
                .reply_text()
            }
            Frame::Line(bytes) => match String::from_utf8(bytes) {
                Ok(line) => {
                    debug!(%peer, command = line.trim(), "received");
                    dispatcher.execute(&line).await
                }
                Err(_) => {
                    debug!(%peer, "request line is not valid UTF-8");
                    CacheError::InvalidArgument("request is not valid UTF-8".to_string())
                        .reply_text()
                }
            },
        };
        reply.push('\n');

        if let Err(e) = write_reply(&mut writer, &reply).await {
            warn!(%peer, "write failed: {}", e);
            break;
        }
    }

    let _ = writer.shutdown().await;
    info!(%peer, "client disconnected");
}

/// Reads the next newline-terminated line, never buffering more than
/// `MAX_LINE_BYTES + 1` bytes of it.
///
/// A final line without a newline before EOF is still returned. `\r\n`
/// endings are accepted.
async fn read_frame<R>(reader: &mut R) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_BYTES as u64 + 1;
    let mut buf = Vec::new();

    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(Frame::Line(buf));
    }

    if buf.len() <= MAX_LINE_BYTES {
        // Unterminated last line
        return Ok(Frame::Line(buf));
    }

    // Oversized: drop the rest of the line in bounded chunks
    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            return Ok(Frame::TooLong);
        }
    }
}

async fn write_reply<W>(writer: &mut W, reply: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.as_bytes()).await?;
    writer.flush().await
}
