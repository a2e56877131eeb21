//! Where VAST text comes from: an uploaded file, pasted text or a URL.

use std::time::Duration;

use reqwest::{redirect, Client};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{VastError, VastResult};

/// Upload extensions accepted for VAST files.
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["xml", "txt"];

/// Timeout for fetching a remote VAST document.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Redirect hops followed while fetching.
pub const MAX_FETCH_REDIRECTS: usize = 10;

/// A VAST document source supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VastSource {
    /// Uploaded file contents
    Upload { filename: String, contents: Vec<u8> },
    /// XML pasted directly
    Pasted(String),
    /// http(s) URL to fetch the document from
    Remote(Url),
}

impl VastSource {
    /// Pick the source from the two form fields.
    ///
    /// An upload with an allowed extension wins; otherwise non-empty text
    /// input is used, as a URL when it starts with `http://` or `https://`.
    pub fn from_form(upload: Option<(String, Vec<u8>)>, input: Option<&str>) -> VastResult<Self> {
        let input = input.map(str::trim).filter(|s| !s.is_empty());

        if let Some((filename, contents)) = upload.filter(|(name, _)| !name.is_empty()) {
            if is_allowed_upload(&filename) {
                return Ok(Self::Upload { filename, contents });
            }
            if input.is_none() {
                return Err(VastError::UnsupportedUpload(filename));
            }
        }

        match input {
            Some(text) if text.starts_with("http://") || text.starts_with("https://") => {
                let url = Url::parse(text)
                    .map_err(|e| VastError::fetch_failed(format!("invalid URL: {e}")))?;
                Ok(Self::Remote(url))
            }
            Some(text) => Ok(Self::Pasted(text.to_string())),
            None => Err(VastError::EmptyInput),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::Pasted(_) => "pasted",
            Self::Remote(_) => "remote",
        }
    }

    /// Produce the VAST text, fetching it when the source is remote.
    pub async fn load(self, fetcher: &VastFetcher) -> VastResult<String> {
        let text = match self {
            Self::Upload { filename, contents } => {
                debug!(filename = %filename, bytes = contents.len(), "Reading uploaded VAST");
                String::from_utf8(contents)
                    .map_err(|_| VastError::malformed("uploaded file is not valid UTF-8"))?
            }
            Self::Pasted(text) => text,
            Self::Remote(url) => fetcher.fetch(&url).await?,
        };

        if text.trim().is_empty() {
            return Err(VastError::EmptyInput);
        }
        Ok(text)
    }
}

/// Check the upload's extension against [`ALLOWED_UPLOAD_EXTENSIONS`].
pub fn is_allowed_upload(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_UPLOAD_EXTENSIONS.contains(&ext.as_str()))
}

/// HTTP client for remote VAST documents.
#[derive(Debug, Clone)]
pub struct VastFetcher {
    http: Client,
}

/// A redirect target rejected by the fetcher's URL guard.
#[derive(Debug, Error)]
#[error("redirect to {url} refused: {reason}")]
pub(crate) struct BlockedRedirect {
    url: String,
    reason: String,
}

impl VastFetcher {
    /// Create a fetcher with the given request timeout.
    pub fn new(timeout: Duration) -> VastResult<Self> {
        Self::build(timeout, redirect::Policy::limited(MAX_FETCH_REDIRECTS))
    }

    /// Create a fetcher that checks every redirect target with `guard`
    /// before following it. A rejected hop fails the fetch with
    /// [`VastError::BlockedUrl`].
    pub fn with_url_guard<G>(timeout: Duration, guard: G) -> VastResult<Self>
    where
        G: Fn(&Url) -> Result<(), String> + Send + Sync + 'static,
    {
        let policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_FETCH_REDIRECTS {
                return attempt.error("too many redirects");
            }
            match guard(attempt.url()) {
                Ok(()) => attempt.follow(),
                Err(reason) => {
                    let url = attempt.url().to_string();
                    warn!(url = %url, reason = %reason, "Refusing VAST redirect");
                    attempt.error(BlockedRedirect { url, reason })
                }
            }
        });
        Self::build(timeout, policy)
    }

    fn build(timeout: Duration, policy: redirect::Policy) -> VastResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(policy)
            .build()?;
        Ok(Self { http })
    }

    /// Fetch a document; non-2xx statuses are failures.
    pub async fn fetch(&self, url: &Url) -> VastResult<String> {
        info!(url = %url, "Fetching remote VAST");
        let response = self.http.get(url.clone()).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}
