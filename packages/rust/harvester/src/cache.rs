//! Fetch-once cache for the prebuilt corpus file.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};
use uuid::Uuid;

use oireachtas_shared::{OireachtasError, Result};

/// Make sure `path` exists, downloading it from `url` when it does not.
///
/// The body is streamed to a sibling temp file and renamed into place, so an
/// interrupted fetch never leaves a truncated corpus at `path`. Returns
/// `true` when a download happened.
///
/// `timeout_secs` bounds connecting, waiting for the response head and each
/// gap between body chunks. The transfer as a whole is unbounded.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn ensure_cached(url: &str, path: &Path, timeout_secs: u64) -> Result<bool> {
    if tokio::fs::try_exists(path)
        .await
        .map_err(|e| OireachtasError::io(path, e))?
    {
        info!("corpus already cached");
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| OireachtasError::io(parent, e))?;
    }

    let idle = Duration::from_secs(timeout_secs);
    let client = Client::builder()
        .connect_timeout(idle)
        .build()
        .map_err(|e| OireachtasError::Network(format!("failed to build HTTP client: {e}")))?;

    let mut response = tokio::time::timeout(idle, client.get(url).send())
        .await
        .map_err(|_| OireachtasError::Network(format!("{url}: no response within {idle:?}")))?
        .map_err(|e| OireachtasError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(OireachtasError::Network(format!("{url}: HTTP {status}")));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".into());
    let tmp = path.with_file_name(format!(".{file_name}.{}.part", Uuid::now_v7()));

    let written = match stream_to(&mut response, &tmp, url, idle).await {
        Ok(n) => n,
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
    };

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| OireachtasError::io(path, e))?;

    info!(bytes = written, "corpus downloaded");
    Ok(true)
}

async fn stream_to(
    response: &mut reqwest::Response,
    tmp: &Path,
    url: &str,
    idle: Duration,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(tmp)
        .await
        .map_err(|e| OireachtasError::io(tmp, e))?;
    let mut written = 0u64;

    while let Some(chunk) = tokio::time::timeout(idle, response.chunk())
        .await
        .map_err(|_| OireachtasError::Network(format!("{url}: body stalled for {idle:?}")))?
        .map_err(|e| OireachtasError::Network(format!("{url}: body read failed: {e}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| OireachtasError::io(tmp, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| OireachtasError::io(tmp, e))?;
    Ok(written)
}
