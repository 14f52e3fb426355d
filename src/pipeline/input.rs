//! Input resolution: turn a user-supplied path or URL into document bytes.
//!
//! Everything downstream works on an in-memory buffer, so URLs are fetched
//! straight into memory and local files are read whole. The upload limit is
//! checked before the bytes are read wherever the size is known up front
//! (file metadata, `Content-Length`) and again on the received body.
//!
//! Content is not checked for `%PDF` magic here. Non-PDF bytes are a valid
//! input to the classifier, which answers with its safe default.

use crate::error::TriageError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Document bytes plus the name used for instruction lookup and logging.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download a URL.
pub async fn load_input(
    input: &str,
    timeout_secs: u64,
    max_upload_size: usize,
) -> Result<LoadedInput, TriageError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || (trimmed.contains("://") && !is_url(trimmed)) {
        return Err(TriageError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(trimmed) {
        download_url(trimmed, timeout_secs, max_upload_size).await
    } else {
        load_local(Path::new(trimmed), max_upload_size).await
    }
}

fn check_size(size: usize, max: usize) -> Result<(), TriageError> {
    if size > max {
        return Err(TriageError::FileTooLarge { size, max });
    }
    Ok(())
}

async fn load_local(path: &Path, max_upload_size: usize) -> Result<LoadedInput, TriageError> {
    let io_err = |e: std::io::Error, path: PathBuf| match e.kind() {
        std::io::ErrorKind::PermissionDenied => TriageError::PermissionDenied { path },
        _ => TriageError::FileNotFound { path },
    };

    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| io_err(e, path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(TriageError::InvalidInput {
            input: path.display().to_string(),
        });
    }
    check_size(meta.len() as usize, max_upload_size)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| io_err(e, path.to_path_buf()))?;
    check_size(bytes.len(), max_upload_size)?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    debug!("Loaded local document {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedInput { bytes, filename })
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_upload_size: usize,
) -> Result<LoadedInput, TriageError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| TriageError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            TriageError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    if let Some(len) = response.content_length() {
        check_size(len as usize, max_upload_size)?;
    }

    let filename = filename_from_url(url);
    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            TriageError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;
    check_size(bytes.len(), max_upload_size)?;

    info!("Downloaded {} ({} bytes)", filename, bytes.len());
    Ok(LoadedInput {
        bytes: bytes.to_vec(),
        filename,
    })
}

/// Last non-empty URL path segment containing a dot, else `downloaded.pdf`.
pub fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            if let Some(last) = segments.filter(|s| !s.is_empty()).last() {
                if last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}
