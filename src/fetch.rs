use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::error::SraError;

pub trait HttpTransport: Send + Sync {
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, SraError>;
    fn download(&self, url: &str, destination: &Path) -> Result<(), SraError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, SraError> {
        (**self).get_text(url, timeout)
    }

    fn download(&self, url: &str, destination: &Path) -> Result<(), SraError> {
        (**self).download(url, destination)
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, SraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sradownload/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SraError::Http(err.to_string()))?,
        );
        // Read files run to many gigabytes, so only the connect phase is bounded here.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| SraError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn check_status(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(SraError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}

impl HttpTransport for HttpClient {
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, SraError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|err| SraError::Http(err.to_string()))?;
        Self::check_status(url, response)?
            .text()
            .map_err(|err| SraError::Http(err.to_string()))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<(), SraError> {
        let transfer_url = transfer_url(url);
        let response = self
            .client
            .get(&transfer_url)
            .send()
            .map_err(|err| SraError::Http(err.to_string()))?;
        let mut response = Self::check_status(&transfer_url, response)?;
        let mut file =
            File::create(destination).map_err(|err| SraError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| SraError::Http(err.to_string()))?;
        Ok(())
    }
}

/// The archives serve their FTP trees over HTTPS as well, which the HTTP client can reach.
pub fn transfer_url(url: &str) -> String {
    match url.strip_prefix("ftp://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Downloads single files with a fixed number of attempts and a fixed pause between them.
///
/// A failed attempt may leave a partial file behind; the next attempt truncates it.
#[derive(Clone)]
pub struct FileFetcher<T: HttpTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> FileFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn fetch(&self, url: &str, destination: &Path) -> Option<PathBuf> {
        for attempt in 1..=self.policy.attempts {
            debug!(url, attempt, "downloading {}", destination.display());
            match self.transport.download(url, destination) {
                Ok(()) => return Some(destination.to_path_buf()),
                Err(err) => {
                    warn!(url, attempt, "download failed: {err}");
                    thread::sleep(self.policy.delay);
                }
            }
        }
        None
    }
}
