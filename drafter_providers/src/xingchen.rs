use async_trait::async_trait;
use drafter_core::protocol::{ChatRequest, ResumeRequest};
use drafter_core::{FrameSource, GenerationBackend, ImageUploader, TurnError};
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::stream::HttpFrameSource;

const DEFAULT_BASE_URL: &str = "https://xingchen-api.xf-yun.com/workflow/v1";

/// Client for the workflow engine that drives document generation.
pub struct XingchenClient {
    client: Client,
    api_key: String,
    api_secret: String,
    api_url: String,
    resume_url: String,
    upload_url: String,
    upload_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<UploadData>,
}

impl XingchenClient {
    /// Build a client whose calls are bounded by `timeout`.
    ///
    /// Generation runs for minutes, so `timeout` should be generous.
    pub fn new(api_key: String, api_secret: String, timeout: Duration) -> anyhow::Result<Self> {
        info!("Creating XingchenClient with timeout {}s", timeout.as_secs());
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            api_secret,
            api_url: format!("{DEFAULT_BASE_URL}/chat/completions"),
            resume_url: format!("{DEFAULT_BASE_URL}/resume"),
            upload_url: format!("{DEFAULT_BASE_URL}/upload_file"),
            upload_dir: None,
        })
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    #[must_use]
    pub fn with_resume_url(mut self, resume_url: String) -> Self {
        self.resume_url = resume_url;
        self
    }

    #[must_use]
    pub fn with_upload_url(mut self, upload_url: String) -> Self {
        self.upload_url = upload_url;
        self
    }

    /// Directory that image references are resolved against.
    #[must_use]
    pub fn with_upload_dir(mut self, upload_dir: PathBuf) -> Self {
        self.upload_dir = Some(upload_dir);
        self
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}:{}", self.api_key, self.api_secret)
    }

    /// Open one streaming call. The request is sent exactly once.
    async fn open_stream<T: Serialize + Sync>(
        &self,
        url: &str,
        body: &T,
        cancel: CancellationToken,
    ) -> Result<Box<dyn FrameSource>, TurnError> {
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "text/event-stream")
            .json(body);

        debug!("Opening upstream stream: {url}");
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(TurnError::Cancelled),
            response = request.send() => response
                .map_err(|e| TurnError::UpstreamUnavailable(format!("failed to call {url}: {e}")))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TurnError::UpstreamUnavailable(format!(
                "{url} returned {status}, body: {body}"
            )));
        }

        info!("Upstream stream established: {url}");
        Ok(Box::new(HttpFrameSource::new(response.bytes_stream(), cancel)))
    }

    /// Upload a local file and return the URL the engine can fetch it from.
    pub async fn upload_file(&self, path: &Path) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();

        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(&self.upload_url)
            .header(AUTHORIZATION, self.auth_header())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json::<UploadResponse>()
            .await?;

        if response.code != 0 {
            anyhow::bail!(
                "Upload of {} failed: code={}, message={}",
                path.display(),
                response.code,
                response.message
            );
        }

        let url = response
            .data
            .map(|data| data.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Invalid upload response: missing url"))?;

        info!("Uploaded {} to {url}", path.display());
        Ok(url)
    }
}

#[async_trait]
impl GenerationBackend for XingchenClient {
    async fn open_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn FrameSource>, TurnError> {
        self.open_stream(&self.api_url, request, cancel).await
    }

    async fn open_resume(
        &self,
        request: &ResumeRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn FrameSource>, TurnError> {
        self.open_stream(&self.resume_url, request, cancel).await
    }
}

#[async_trait]
impl ImageUploader for XingchenClient {
    async fn upload_image(&self, reference_id: &str) -> anyhow::Result<String> {
        let upload_dir = self
            .upload_dir
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No upload directory configured"))?;
        let file_name = Path::new(reference_id)
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid reference id: {reference_id}"))?;
        self.upload_file(&upload_dir.join(file_name)).await
    }
}
