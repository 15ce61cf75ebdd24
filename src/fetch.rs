//! Direct-link downloads
//!
//! Streams a remote file into a temporary file on disk. The returned
//! [`DownloadedFile`] owns the temporary path and removes it when dropped, so
//! callers never have to clean up by hand, whatever path they leave through.

use futures_util::StreamExt;
use lazy_regex::regex_captures;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

/// Name used when nothing better can be inferred
pub const FALLBACK_FILE_NAME: &str = "file.bin";

/// Host serving Google Drive downloads
pub const DRIVE_BASE_URL: &str = "https://drive.google.com";

/// Errors that can occur while downloading a file
#[derive(Debug, Error)]
pub enum FetchError {
    /// The link is not a valid absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Connection, timeout or body transfer failure
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    /// The server answered with a non-success status
    #[error("Server returned status {0}")]
    Status(u16),
    /// Writing the temporary file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A downloaded file living in a temporary location
#[derive(Debug)]
pub struct DownloadedFile {
    path: TempPath,
    file_name: String,
    size: u64,
}

impl DownloadedFile {
    /// Location of the temporary file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inferred file name
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Number of bytes written
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

/// Streaming HTTP downloader
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    temp_dir: Option<PathBuf>,
    drive_base: String,
}

impl Fetcher {
    /// Create a fetcher with a fixed request timeout.
    ///
    /// The cookie store stays enabled so the two-step Google Drive download
    /// carries the warning cookie back.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Request` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            temp_dir: None,
            drive_base: DRIVE_BASE_URL.to_string(),
        })
    }

    /// Store temporary files in `dir` instead of the system temp directory
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Send Google Drive downloads to `base` instead of [`DRIVE_BASE_URL`]
    #[must_use]
    pub fn with_drive_base(mut self, base: impl Into<String>) -> Self {
        self.drive_base = base.into();
        self
    }

    /// Download `link` into a temporary file.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` on invalid URLs, network failures, timeouts,
    /// non-2xx responses and local write failures. No file is left behind.
    pub async fn fetch(&self, link: &str) -> Result<DownloadedFile, FetchError> {
        let url = Url::parse(link).map_err(|e| FetchError::InvalidUrl(format!("{link}: {e}")))?;

        let response = match drive_file_id(&url) {
            Some(id) => self.fetch_drive(&id).await?,
            None => self.client.get(url).send().await?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let file_name = infer_file_name(response.headers(), response.url());
        self.stream_to_temp(response, file_name).await
    }

    async fn fetch_drive(&self, id: &str) -> Result<Response, FetchError> {
        let first_url = drive_download_url(&self.drive_base, id, None);
        debug!(id, "Fetching Google Drive file");
        let first = self.client.get(&first_url).send().await?;

        let token = first
            .cookies()
            .find_map(|c| confirm_token_from_cookie(c.name(), c.value()));

        match token {
            Some(token) => {
                debug!(id, "Google Drive returned a download warning, confirming");
                drop(first);
                let confirmed = drive_download_url(&self.drive_base, id, Some(&token));
                Ok(self.client.get(confirmed).send().await?)
            }
            None => Ok(first),
        }
    }

    async fn stream_to_temp(
        &self,
        response: Response,
        file_name: String,
    ) -> Result<DownloadedFile, FetchError> {
        let suffix = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix("filegate-").suffix(&suffix);
        let named = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        // The TempPath guard removes the file on every early return below
        let (std_file, path) = named.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let mut size = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        info!(file_name = %file_name, size, "Downloaded file");
        Ok(DownloadedFile {
            path,
            file_name,
            size,
        })
    }
}

/// Infers a file name from response headers and the final URL.
///
/// Order: Content-Disposition, URL path, Content-Type, fallback.
///
/// # Examples
///
/// ```
/// use filegate_bot::fetch::infer_file_name;
/// use reqwest::header::HeaderMap;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/files/report.pdf?dl=1").expect("valid url");
/// assert_eq!(infer_file_name(&HeaderMap::new(), &url), "report.pdf");
/// ```
#[must_use]
pub fn infer_file_name(headers: &HeaderMap, url: &Url) -> String {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(file_name_from_disposition)
        .or_else(|| file_name_from_url(url))
        .or_else(|| {
            headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(extension_for_content_type)
                .map(|ext| format!("file.{ext}"))
        })
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

fn file_name_from_disposition(value: &str) -> Option<String> {
    if let Some((_, encoded)) = regex_captures!(r#"(?i)filename\*\s*=\s*[\w-]+'[^']*'([^;]+)"#, value)
    {
        if let Some(name) = sanitize_file_name(&decode_component(encoded.trim_matches('"'))) {
            return Some(name);
        }
    }
    let (_, quoted, bare) = regex_captures!(r#"(?i)filename\s*=\s*(?:"([^"]*)"|([^;]+))"#, value)?;
    let raw = if quoted.is_empty() { bare } else { quoted };
    sanitize_file_name(raw.trim())
}

fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let name = sanitize_file_name(&decode_component(segment))?;
    Path::new(&name).extension().is_some().then_some(name)
}

fn decode_component(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn extension_for_content_type(value: &str) -> Option<&'static str> {
    let mime = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let ext = match mime.as_str() {
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/x-rar-compressed" | "application/vnd.rar" => "rar",
        "application/vnd.android.package-archive" => "apk",
        "video/mp4" => "mp4",
        "video/x-matroska" => "mkv",
        "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/mp4" => "m4a",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "text/plain" => "txt",
        _ => return None,
    };
    Some(ext)
}

/// Extracts the Google Drive file id from a sharing or download URL
#[must_use]
pub fn drive_file_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if host != "drive.google.com" && host != "docs.google.com" {
        return None;
    }

    let segments: Vec<&str> = url.path_segments()?.collect();
    if let Some(pos) = segments.iter().position(|s| *s == "d") {
        if segments.get(pos.wrapping_sub(1)) == Some(&"file") {
            return segments.get(pos + 1).map(|id| (*id).to_string());
        }
    }

    if segments.first() == Some(&"uc") || segments.first() == Some(&"open") {
        return url
            .query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned());
    }
    None
}

/// Direct download URL for a Drive file on `base`, optionally confirming the
/// warning page
#[must_use]
pub fn drive_download_url(base: &str, id: &str, confirm: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let id = urlencoding::encode(id);
    match confirm {
        Some(token) => format!(
            "{base}/uc?export=download&id={id}&confirm={}",
            urlencoding::encode(token)
        ),
        None => format!("{base}/uc?export=download&id={id}"),
    }
}

/// Returns the confirmation token if the cookie is Drive's download warning
#[must_use]
pub fn confirm_token_from_cookie(name: &str, value: &str) -> Option<String> {
    (name.starts_with("download_warning") && !value.is_empty()).then(|| value.to_string())
}
