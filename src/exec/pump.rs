// src/exec/pump.rs

//! Output pumps: drain one child stream line by line.

use std::borrow::Cow;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::LineHandler;
use crate::types::StreamKind;

/// Spawn a pump for one stream of `command`.
///
/// The returned handle resolves to the number of lines dispatched once the
/// stream reaches end-of-file (or a read fails).
pub fn spawn_pump<R>(
    reader: R,
    stream: StreamKind,
    command: Arc<str>,
    handler: Option<LineHandler>,
) -> JoinHandle<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move { drain_lines(reader, stream, &command, handler.as_ref()).await })
}

/// Read `reader` until end-of-stream, dispatching every line in order.
///
/// A final line without a trailing newline is still dispatched; reaching
/// end-of-stream never produces an extra empty line.
pub async fn drain_lines<R>(
    reader: R,
    stream: StreamKind,
    command: &str,
    handler: Option<&LineHandler>,
) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0u64;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                dispatch(stream, command, &line, handler);
                count += 1;
            }
            Err(err) => {
                warn!(
                    command = %command,
                    stream = %stream,
                    error = %err,
                    "failed to read output; stopping pump"
                );
                break;
            }
        }
    }

    debug!(command = %command, stream = %stream, lines = count, "reached end of stream");
    count
}

fn decode_line(buf: &[u8]) -> Cow<'_, str> {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}

fn dispatch(stream: StreamKind, command: &str, line: &str, handler: Option<&LineHandler>) {
    match stream {
        StreamKind::Stdout => info!(command = %command, stream = %stream, "{}", line),
        StreamKind::Stderr => error!(command = %command, stream = %stream, "{}", line),
    }

    if let Some(handler) = handler {
        handler(line);
    }
}
