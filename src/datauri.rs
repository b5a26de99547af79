//! `data:` URI encoding for images sent to and received from the model.
//!
//! Everything here is a pure transform of bytes, except the two loaders which
//! read a file or fetch a URL first. Loaders never return errors: a source that
//! can't be read comes back as `None` so a batch can carry on without it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

use crate::constants::{DEFAULT_IMAGE_MIME, MAX_REMOTE_IMAGE_BYTES};

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// Errors from parsing a `data:` URI.
#[derive(Debug)]
pub enum DataUriError {
    /// Doesn't start with `data:`
    MissingPrefix,
    /// No `,` between the header and the payload
    MissingSeparator,
    /// Header isn't `<mime>;base64`
    NotBase64,
    /// Payload isn't valid base64
    Decode(base64::DecodeError),
}

impl fmt::Display for DataUriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPrefix => write!(f, "data URI must start with 'data:'"),
            Self::MissingSeparator => write!(f, "data URI has no ',' before the payload"),
            Self::NotBase64 => write!(f, "data URI must be '<mime>;base64' encoded"),
            Self::Decode(err) => write!(f, "data URI payload is not valid base64: {err}"),
        }
    }
}

impl std::error::Error for DataUriError {}

/// A decoded `data:<mime>;base64,<payload>` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUri {
    mime: String,
    bytes: Vec<u8>,
}

impl DataUri {
    /// Wraps raw bytes with a MIME type.
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Parses a base64 data URI.
    pub fn parse(value: &str) -> Result<Self, DataUriError> {
        let rest = value
            .strip_prefix(DATA_PREFIX)
            .ok_or(DataUriError::MissingPrefix)?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or(DataUriError::MissingSeparator)?;
        let mime = header
            .strip_suffix(BASE64_MARKER)
            .filter(|mime| mime.contains('/'))
            .ok_or(DataUriError::NotBase64)?;
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(DataUriError::Decode)?;
        Ok(Self {
            mime: mime.to_string(),
            bytes,
        })
    }

    /// The MIME type from the header.
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// The decoded payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The payload re-encoded as base64, without the header.
    pub fn base64_payload(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{DATA_PREFIX}{}{BASE64_MARKER},{}",
            self.mime,
            self.base64_payload()
        )
    }
}

/// Builds `data:<mime>;base64,<bytes>`.
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!(
        "{DATA_PREFIX}{mime}{BASE64_MARKER},{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Cheap check used by the schema validator; doesn't decode the payload.
pub fn looks_like_data_uri(value: &str) -> bool {
    value
        .strip_prefix(DATA_PREFIX)
        .and_then(|rest| rest.split_once(','))
        .is_some_and(|(header, payload)| {
            header
                .strip_suffix(BASE64_MARKER)
                .is_some_and(|mime| mime.contains('/'))
                && !payload.is_empty()
        })
}

/// Picks a MIME type: file extension first, then magic bytes, then the default.
pub fn mime_for(path: Option<&Path>, bytes: &[u8]) -> &'static str {
    path.and_then(|path| image::ImageFormat::from_path(path).ok())
        .or_else(|| image::guess_format(bytes).ok())
        .map(|format| format.to_mime_type())
        .unwrap_or(DEFAULT_IMAGE_MIME)
}

/// Encodes an uploaded file. A declared `image/*` content type wins.
pub fn from_upload(content_type: Option<&str>, file_name: Option<&str>, bytes: &[u8]) -> String {
    let mime = match content_type
        .map(|value| value.split(';').next().unwrap_or(value).trim())
        .filter(|value| value.starts_with("image/"))
    {
        Some(declared) => declared.to_string(),
        None => mime_for(file_name.map(Path::new), bytes).to_string(),
    };
    encode(&mime, bytes)
}

/// Reads an image from disk. `None` if it can't be read.
pub async fn from_path(path: &Path) -> Option<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(encode(mime_for(Some(path), &bytes), &bytes)),
        Err(err) => {
            warn!(
                "Error converting image to data URI for {}: {}",
                path.display(),
                err
            );
            None
        }
    }
}

/// HTTP client for [`from_url`]; `timeout` bounds each fetch end to end.
pub fn remote_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Fetches a remote image. `None` on any transport or status failure, or a
/// body over [`MAX_REMOTE_IMAGE_BYTES`].
pub async fn from_url(client: &reqwest::Client, url: &Url) -> Option<String> {
    fetch_limited(client, url, MAX_REMOTE_IMAGE_BYTES).await
}

async fn fetch_limited(client: &reqwest::Client, url: &Url, max_bytes: usize) -> Option<String> {
    let mut response = match client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
    {
        Ok(response) => response,
        Err(err) => {
            warn!("Error fetching image {url}: {err}");
            return None;
        }
    };
    if let Some(length) = response.content_length()
        && length > max_bytes as u64
    {
        warn!("Image at {url} is too large ({length} bytes)");
        return None;
    }
    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let mut bytes = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if bytes.len() + chunk.len() > max_bytes {
                    warn!("Image at {url} is larger than {max_bytes} bytes");
                    return None;
                }
                bytes.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(err) => {
                warn!("Error reading image body from {url}: {err}");
                return None;
            }
        }
    }

    let path_hint = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(str::to_owned);
    Some(from_upload(declared.as_deref(), path_hint.as_deref(), &bytes))
}

/// Something that can be turned into a data URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// A file on disk
    File(PathBuf),
    /// A remote image
    Remote(Url),
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// `http(s)` URLs are remote, anything else is a file path.
impl FromStr for ImageSource {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(url)),
            _ => Ok(Self::File(PathBuf::from(value))),
        }
    }
}

impl ImageSource {
    async fn load(&self, remote: Option<&reqwest::Client>) -> Option<String> {
        match (self, remote) {
            (Self::File(path), _) => from_path(path).await,
            (Self::Remote(url), Some(client)) => from_url(client, url).await,
            (Self::Remote(url), None) => {
                warn!("Remote images are disabled, skipping {url}");
                None
            }
        }
    }
}

/// Result of converting one entry of a batch.
#[derive(Clone, Debug)]
pub struct BatchItem {
    /// Position of the source in the input
    pub index: usize,
    /// The source this came from
    pub source: ImageSource,
    /// The data URI, or `None` if the source couldn't be read
    pub data_uri: Option<String>,
}

/// Converts every source concurrently. Output is in input order.
///
/// Remote sources are only fetched when `remote` is given.
pub async fn convert_batch(
    remote: Option<&reqwest::Client>,
    sources: Vec<ImageSource>,
) -> Vec<BatchItem> {
    let total = sources.len();
    let mut tasks = JoinSet::new();
    for (index, source) in sources.iter().cloned().enumerate() {
        let remote = remote.cloned();
        tasks.spawn(async move {
            let data_uri = source.load(remote.as_ref()).await;
            (index, data_uri)
        });
    }

    let mut converted: Vec<Option<String>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, data_uri)) => {
                if let Some(slot) = converted.get_mut(index) {
                    *slot = data_uri;
                }
            }
            Err(err) => warn!("Image conversion task failed: {err}"),
        }
    }

    let items: Vec<BatchItem> = sources
        .into_iter()
        .zip(converted)
        .enumerate()
        .map(|(index, (source, data_uri))| BatchItem {
            index,
            source,
            data_uri,
        })
        .collect();
    debug!(
        "Converted {}/{} images to data URIs",
        items.iter().filter(|item| item.data_uri.is_some()).count(),
        total
    );
    items
}

/// Short description of a data URI for log lines.
pub fn summarize(value: &str) -> String {
    match value.strip_prefix(DATA_PREFIX).and_then(|rest| rest.split_once(',')) {
        Some((header, payload)) => format!("data:{header} ({} bytes b64)", payload.len()),
        None => value.chars().take(80).collect(),
    }
}
