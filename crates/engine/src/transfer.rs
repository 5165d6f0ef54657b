//! Streamed audio transfer: writes a stream URL's bytes to a destination
//! file, chunk by chunk, discarding partial output on any failure so a
//! retry never resumes into a corrupt file.

use std::path::Path;

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::client::ProviderClient;
use crate::error::ResolveError;
use crate::models::StreamInfo;

/// Download the stream to `dest`. Returns the number of bytes written.
///
/// When the response carries a content length, a short write is a transfer
/// error; the partial file is removed before the error is returned.
pub async fn transfer_to_file(
    client: &ProviderClient,
    stream: &StreamInfo,
    dest: &Path,
) -> Result<u64, ResolveError> {
    debug!(url = %stream.stream_url, dest = %dest.display(), "starting transfer");

    let result = write_stream(client, stream, dest).await;
    if result.is_err() {
        discard_partial(dest).await;
    }
    result
}

async fn write_stream(
    client: &ProviderClient,
    stream: &StreamInfo,
    dest: &Path,
) -> Result<u64, ResolveError> {
    let response = client
        .http()
        .get(&stream.stream_url)
        .timeout(client.download_timeout())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ResolveError::http_status(
            status,
            stream.stream_url.clone(),
            "transfer",
        ));
    }

    let expected = response.content_length().or(stream.expected_bytes);
    if let Some(total) = expected {
        debug!(size_mib = total / 1024 / 1024, "transfer size known");
    }

    let mut file = fs::File::create(dest).await?;
    let mut body = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if written == 0 {
        return Err(ResolveError::transfer("empty response body"));
    }
    if let Some(total) = expected
        && written != total
    {
        return Err(ResolveError::transfer(format!(
            "short transfer: {written} of {total} bytes"
        )));
    }

    info!(
        dest = %dest.display(),
        size_mib = format!("{:.2}", written as f64 / 1024.0 / 1024.0).as_str(),
        "transfer complete"
    );
    Ok(written)
}

/// Best-effort removal of a partially written file.
async fn discard_partial(dest: &Path) {
    match fs::remove_file(dest).await {
        Ok(()) => debug!(dest = %dest.display(), "partial file discarded"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(dest = %dest.display(), error = %err, "could not discard partial file"),
    }
}
