//! Accumulates bytes from a socket into one complete HTTP request.

use super::error::{HttpError, HttpResult};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Read chunk size when the remaining budget allows it.
const READ_CHUNK: usize = 4096;

/// Read one request from `reader`.
///
/// Reading stops once the header block is complete and at least
/// `Content-Length` body bytes have arrived, when `max_size` bytes have been
/// buffered, when the peer closes, or when a single read exceeds
/// `read_timeout`. In the last three cases whatever was buffered is returned
/// for best-effort parsing.
///
/// Fails with [`HttpError::ConnectionClosed`] if the peer closed without
/// sending anything.
pub async fn read_request<R>(
    reader: &mut R,
    max_size: usize,
    read_timeout: Duration,
) -> HttpResult<BytesMut>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(max_size.min(READ_CHUNK));

    while buf.len() < max_size {
        let budget = (max_size - buf.len()).min(READ_CHUNK);
        buf.reserve(budget);

        let mut limited = (&mut *reader).take(budget as u64);
        let read = limited.read_buf(&mut buf);
        let n = match tokio::time::timeout(read_timeout, read).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(HttpError::Io(e)),
            Err(_) => {
                if buf.is_empty() {
                    return Err(HttpError::Timeout(format!(
                        "no data within {read_timeout:?}"
                    )));
                }
                debug!(buffered = buf.len(), "Read timed out, parsing partial request");
                break;
            },
        };

        if n == 0 {
            break;
        }
        if is_complete(&buf) {
            break;
        }
    }

    if buf.is_empty() {
        return Err(HttpError::ConnectionClosed);
    }
    Ok(buf)
}

/// Whether `buf` holds a full header block and its declared body.
#[must_use]
pub fn is_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find_subsequence(buf, HEADER_TERMINATOR) else {
        return false;
    };
    let body_len = buf.len() - (header_end + HEADER_TERMINATOR.len());
    body_len >= declared_content_length(&buf[..header_end])
}

/// `Content-Length` from a raw header block, matched case-insensitively.
/// Missing or unparseable values count as zero.
fn declared_content_length(headers: &[u8]) -> usize {
    String::from_utf8_lossy(headers)
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
