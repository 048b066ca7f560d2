//! Copy an upload body into a temp object while hashing it.

use sha2::{Digest, Sha256};
use storedge_core::constants::STREAM_BUFFER_SIZE;
use storedge_core::{AppError, Checksum};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug)]
pub(crate) struct StreamSummary {
    pub bytes: u64,
    pub checksum: Checksum,
}

/// Stream `reader` into `writer` through a fixed buffer, feeding a SHA-256 digest.
///
/// Fails with `TooLarge` as soon as more than `limit` bytes have been read; the
/// offending chunk is never written. The writer is shut down once the body ends.
pub(crate) async fn copy_with_digest<R, W>(
    reader: &mut R,
    writer: &mut W,
    limit: u64,
) -> Result<StreamSummary, AppError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; STREAM_BUFFER_SIZE];
    let mut hasher = Sha256::new();
    let mut total: u64 = 0;

    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| AppError::InternalWithSource {
                message: "Failed to read upload body".to_string(),
                source: e.into(),
            })?;
        if n == 0 {
            break;
        }

        total += n as u64;
        if total > limit {
            return Err(AppError::TooLarge { limit });
        }

        hasher.update(&buf[..n]);
        writer
            .write_all(&buf[..n])
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write temp object: {}", e)))?;
    }

    writer
        .shutdown()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to close temp object: {}", e)))?;

    let checksum = Checksum::parse(&hex::encode(hasher.finalize()))?;
    Ok(StreamSummary {
        bytes: total,
        checksum,
    })
}
