use async_std::fs::{self, File};
use async_trait::async_trait;
use futures::channel::mpsc::UnboundedSender;
use futures::io::{AsyncReadExt, AsyncWriteExt};
use modelsync_core::protocol::{DownloadTask, Fetched, TransferEvent};
use modelsync_core::{Result, SyncError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use surf::http::headers::AUTHORIZATION;
use surf::{StatusCode, Url};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CHUNK_SIZE: usize = 8192;
const MAX_REDIRECTS: u8 = 5;

/// Something that can bring one file onto local disk.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Downloads `task.url` into `task.destination`. An existing destination
    /// is left alone unless `overwrite` is set.
    async fn fetch(&self, task: &DownloadTask, overwrite: bool) -> Result<Fetched>;
}

/// Bearer token scoped to a single origin.
#[derive(Clone)]
struct ScopedToken {
    origin: Url,
    value: String,
}

impl std::fmt::Debug for ScopedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedToken")
            .field("origin", &self.origin.as_str())
            .field("value", &"***")
            .finish()
    }
}

/// Streaming HTTP downloads through surf.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: surf::Client,
    token: Option<ScopedToken>,
    events: Option<UnboundedSender<TransferEvent>>,
}

impl HttpFetcher {
    /// `timeout` bounds the wait for response headers; body streaming is
    /// not capped.
    pub fn new(timeout: Duration) -> Result<Self> {
        let config = surf::Config::new().set_timeout(Some(timeout));
        let client = surf::Client::try_from(config)
            .map_err(|e| SyncError::Config(format!("failed to build http client: {}", e)))?
            .with(RedirectMiddleware::new(MAX_REDIRECTS));
        Ok(Self {
            client,
            token: None,
            events: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` to URLs on `host` only.
    pub fn with_token(mut self, token: impl Into<String>, host: &str) -> Result<Self> {
        let origin = Url::parse(host)
            .map_err(|e| SyncError::Config(format!("invalid token host '{}': {}", host, e)))?;
        self.token = Some(ScopedToken {
            origin,
            value: token.into(),
        });
        Ok(self)
    }

    pub fn with_events(mut self, events: UnboundedSender<TransferEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(events) = &self.events {
            let _ = events.unbounded_send(event);
        }
    }

    fn authorization_for(&self, url: &Url) -> Option<String> {
        self.token
            .as_ref()
            .filter(|t| same_origin(&t.origin, url))
            .map(|t| format!("Bearer {}", t.value))
    }

    async fn transfer(&self, task: &DownloadTask) -> Result<u64> {
        let url = Url::parse(&task.url).map_err(|e| SyncError::fetch_failed(&task.url, e))?;

        let mut request = surf::Request::new(surf::http::Method::Get, url.clone());
        if let Some(auth) = self.authorization_for(&url) {
            request.insert_header(AUTHORIZATION, auth);
        }

        log::debug!("GET {}", task.url);
        let mut response = self
            .client
            .send(request)
            .await
            .map_err(|e| SyncError::fetch_failed(&task.url, e))?;

        let status = response.status();
        if status == StatusCode::NotFound {
            return Err(SyncError::FetchNotFound {
                url: task.url.clone(),
            });
        }
        if !status.is_success() {
            return Err(SyncError::fetch_failed(&task.url, format!("HTTP {}", status)));
        }

        let total = response.len().map(|n| n as u64);
        self.emit(TransferEvent::Started(task.file.clone(), total));

        let mut part = PartialFile::create(&task.destination)
            .await
            .map_err(|e| SyncError::fetch_failed(&task.url, e))?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut received: u64 = 0;

        loop {
            let n = response
                .read(&mut buf)
                .await
                .map_err(|e| SyncError::fetch_failed(&task.url, e))?;
            if n == 0 {
                break;
            }
            part.write(&buf[..n])
                .await
                .map_err(|e| SyncError::fetch_failed(&task.url, e))?;
            received += n as u64;
            self.emit(TransferEvent::Progress(task.file.clone(), received, total));
        }

        if let Some(total) = total {
            if received < total {
                return Err(SyncError::fetch_failed(
                    &task.url,
                    format!("connection closed after {} of {} bytes", received, total),
                ));
            }
        }

        part.commit()
            .await
            .map_err(|e| SyncError::fetch_failed(&task.url, e))?;
        Ok(received)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, task: &DownloadTask, overwrite: bool) -> Result<Fetched> {
        if !overwrite && task.destination.is_file() {
            log::debug!("Skipping {}, already present", task.destination.display());
            return Ok(Fetched::AlreadyPresent);
        }

        if let Some(parent) = task.destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::fetch_failed(&task.url, e))?;
        }

        match self.transfer(task).await {
            Ok(bytes) => {
                self.emit(TransferEvent::Complete(task.file.clone()));
                Ok(Fetched::Downloaded(bytes))
            }
            Err(e) => {
                self.emit(TransferEvent::Error(task.file.clone(), e.to_string()));
                Err(e)
            }
        }
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// `<destination>.part` while bytes stream in. The file is deleted when the
/// guard drops unless [`commit`](PartialFile::commit) moved it into place,
/// so an abandoned or failed transfer never leaves a truncated artifact.
struct PartialFile {
    path: PathBuf,
    destination: PathBuf,
    file: File,
    committed: bool,
}

impl PartialFile {
    async fn create(destination: &Path) -> std::io::Result<Self> {
        let mut name = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        let path = destination.with_file_name(name);
        let file = File::create(&path).await?;
        Ok(Self {
            path,
            destination: destination.to_path_buf(),
            file,
            committed: false,
        })
    }

    async fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes).await
    }

    async fn commit(mut self) -> std::io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        replace(&self.path, &self.destination).await?;
        self.committed = true;
        Ok(())
    }
}

#[cfg(not(windows))]
async fn replace(from: &PathBuf, to: &PathBuf) -> std::io::Result<()> {
    fs::rename(from, to).await
}

// Windows refuses to rename over an existing file.
#[cfg(windows)]
async fn replace(from: &PathBuf, to: &PathBuf) -> std::io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) if to.is_file() && from.is_file() => {
            fs::remove_file(to).await?;
            fs::rename(from, to).await
        }
        Err(e) => Err(e),
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Follows redirects (Hugging Face resolves to a CDN). The authorization
/// header only travels to the origin it was issued for.
struct RedirectMiddleware {
    max_attempts: u8,
}

impl RedirectMiddleware {
    pub fn new(max_attempts: u8) -> Self {
        Self { max_attempts }
    }
}

#[surf::utils::async_trait]
impl surf::middleware::Middleware for RedirectMiddleware {
    async fn handle(
        &self,
        req: surf::Request,
        client: surf::Client,
        next: surf::middleware::Next<'_>,
    ) -> surf::Result<surf::Response> {
        let mut attempts = 0;
        let mut current_req = req;

        loop {
            if attempts > self.max_attempts {
                return Err(surf::Error::from_str(
                    StatusCode::LoopDetected,
                    "Too many redirects",
                ));
            }

            let response = next.run(current_req.clone(), client.clone()).await?;

            if !response.status().is_redirection() {
                return Ok(response);
            }

            let location = match response.header("Location") {
                Some(location) => location.last().as_str().to_string(),
                None => return Ok(response),
            };

            let new_url = match Url::parse(&location) {
                Ok(u) => u,
                Err(_) => current_req.url().join(&location).map_err(|_| {
                    surf::Error::from_str(StatusCode::BadGateway, "Invalid redirect location")
                })?,
            };

            let mut next_req = surf::Request::new(current_req.method(), new_url.clone());
            if same_origin(current_req.url(), &new_url) {
                if let Some(auth) = current_req.header(AUTHORIZATION) {
                    next_req.insert_header(AUTHORIZATION, auth.last().as_str());
                }
            }

            log::debug!("Redirected to {}", new_url);
            current_req = next_req;
            attempts += 1;
        }
    }
}
