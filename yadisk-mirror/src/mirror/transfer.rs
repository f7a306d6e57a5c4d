use std::io;
use std::path::Path;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("upload rejected with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Streams file bodies to the pre-signed hrefs handed out by the disk API.
#[derive(Clone, Default)]
pub struct TransferClient {
    http: Client,
}

impl TransferClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upload_from_path(&self, href: &str, source: &Path) -> Result<(), TransferError> {
        let url = Url::parse(href)?;
        let file = tokio::fs::File::open(source).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .http
            .put(url)
            .body(body)
            .send()
            .await?;

        // 200/201 on completion, 202 when the disk finishes processing later.
        let status = response.status();
        if matches!(
            status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED
        ) {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransferError::Rejected { status, body })
    }
}
