//! Background clip fetching.
//!
//! Stock-footage search returns clip URLs; this module pulls them into the
//! job workspace. `file://` URLs and plain paths are copied, which lets
//! manifests point at footage already on disk.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_if_exists;

/// Fetches a referenced clip to a local file.
#[async_trait]
pub trait ClipFetcher: Send + Sync {
    /// Fetch `reference` into `dest`, returning the written path.
    async fn fetch(&self, reference: &str, dest: &Path) -> MediaResult<PathBuf>;
}

/// Fetcher for `http(s)://`, `file://` and local path references.
#[derive(Debug, Clone)]
pub struct HttpClipFetcher {
    client: Client,
}

impl HttpClipFetcher {
    /// Create a fetcher with a per-request timeout.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vgen-media/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn download(&self, url: &Url, dest: &Path) -> MediaResult<PathBuf> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::download_failed(format!("{} returned {}", url, status)));
        }

        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    remove_if_exists(dest).await?;
                    return Err(e.into());
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            remove_if_exists(dest).await?;
            return Err(MediaError::download_failed(format!("{} returned an empty body", url)));
        }

        debug!(url = %url, bytes = written, "Downloaded clip");
        Ok(dest.to_path_buf())
    }

    async fn copy_local(&self, src: &Path, dest: &Path) -> MediaResult<PathBuf> {
        if !src.is_file() {
            return Err(MediaError::FileNotFound(src.to_path_buf()));
        }
        fs::copy(src, dest).await?;
        Ok(dest.to_path_buf())
    }
}

#[async_trait]
impl ClipFetcher for HttpClipFetcher {
    async fn fetch(&self, reference: &str, dest: &Path) -> MediaResult<PathBuf> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                info!(url = %url, "Fetching clip");
                self.download(&url, dest).await
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| MediaError::download_failed(format!("bad file URL {}", url)))?;
                self.copy_local(&path, dest).await
            }
            Ok(url) => Err(MediaError::download_failed(format!(
                "unsupported scheme in {}",
                url
            ))),
            Err(_) => self.copy_local(Path::new(reference), dest).await,
        }
    }
}

/// File extension to keep for a clip reference, defaulting to `mp4`.
pub fn clip_extension(reference: &str) -> String {
    let path = Url::parse(reference)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| reference.to_string());

    Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "mp4".to_string())
}
