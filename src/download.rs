use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::SoundrawError;
use crate::fingerprint::resolve_path;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedBody, SoundrawError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, SoundrawError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("soundraw-browser/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SoundrawError::Network(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| SoundrawError::Network(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedBody, SoundrawError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SoundrawError::Network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SoundrawError::Download {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("download failed")
                    .to_string(),
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let bytes = response
            .bytes()
            .map_err(|err| SoundrawError::Network(err.to_string()))?;
        Ok(FetchedBody {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CachedFile {
    pub path: Utf8PathBuf,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub downloaded: bool,
}

impl CachedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub struct Downloader<F: Fetcher> {
    fetcher: F,
    in_flight: InFlight,
}

impl<F: Fetcher> Downloader<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn get_or_fetch(
        &self,
        url: &str,
        base_dir: &Utf8Path,
        name: &str,
    ) -> Result<CachedFile, SoundrawError> {
        self.get_or_fetch_as(url, base_dir, name, None)
    }

    pub fn get_or_fetch_as(
        &self,
        url: &str,
        base_dir: &Utf8Path,
        name: &str,
        extension: Option<&str>,
    ) -> Result<CachedFile, SoundrawError> {
        let path = resolve_path(url, name, extension, base_dir);
        if let Some(hit) = read_cached(&path)? {
            tracing::debug!(%path, "sample cache hit");
            return Ok(hit);
        }

        let lease = self.lease(&path);
        let _guard = lease.slot.lock().unwrap_or_else(PoisonError::into_inner);
        // Whoever held the slot before us may have just written the file.
        match read_cached(&path)? {
            Some(hit) => {
                tracing::debug!(%path, "sample fetched by concurrent request");
                Ok(hit)
            }
            None => self.download(url, &path),
        }
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn download(&self, url: &str, path: &Utf8Path) -> Result<CachedFile, SoundrawError> {
        tracing::debug!(%url, %path, "sample cache miss");
        let body = self.fetcher.fetch(url)?;
        if body.bytes.is_empty() {
            return Err(SoundrawError::EmptyDownload(url.to_string()));
        }
        Store::write_bytes_atomic(path, &body.bytes)?;
        let content_type = body
            .content_type
            .unwrap_or_else(|| content_type_for(path).to_string());
        Ok(CachedFile {
            path: path.to_path_buf(),
            bytes: body.bytes,
            content_type,
            downloaded: true,
        })
    }

    fn lease(&self, path: &Utf8Path) -> SlotLease<'_> {
        let mut map = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = Arc::clone(
            map.entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        SlotLease {
            in_flight: &self.in_flight,
            path: path.to_path_buf(),
            slot,
        }
    }
}

type InFlight = Mutex<HashMap<Utf8PathBuf, Arc<Mutex<()>>>>;

// Drops the per-path entry on every exit, early returns and panics included.
struct SlotLease<'a> {
    in_flight: &'a InFlight,
    path: Utf8PathBuf,
    slot: Arc<Mutex<()>>,
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        let mut map = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map and this lease hold it: nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            map.remove(&self.path);
        }
    }
}

fn read_cached(path: &Utf8Path) -> Result<Option<CachedFile>, SoundrawError> {
    let metadata = match fs::metadata(path.as_std_path()) {
        Ok(metadata) => metadata,
        Err(_) => return Ok(None),
    };
    if !metadata.is_file() || metadata.len() == 0 {
        return Ok(None);
    }
    let bytes = fs::read(path.as_std_path())
        .map_err(|err| SoundrawError::Filesystem(format!("read {path}: {err}")))?;
    Ok(Some(CachedFile {
        path: path.to_path_buf(),
        bytes,
        content_type: content_type_for(path).to_string(),
        downloaded: false,
    }))
}

pub fn content_type_for(path: &Utf8Path) -> &'static str {
    match path
        .extension()
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("m4a") | Some("mp4") | Some("aac") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("aif") | Some("aiff") => "audio/aiff",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}
