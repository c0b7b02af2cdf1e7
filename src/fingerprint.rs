use std::fmt;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use reqwest::Url;
use sha2::{Digest, Sha256};

pub const DEFAULT_EXTENSION: &str = "m4a";
pub const HASH_LEN: usize = 10;
const FALLBACK_SLUG: &str = "sample";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 _\-\s]").expect("static regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,5}$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    slug: String,
    hash: String,
}

impl CacheKey {
    pub fn new(url: &str, name: &str) -> Self {
        Self {
            slug: sanitize_name(name),
            hash: url_hash(url),
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}-{}.{extension}", self.slug, self.hash)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.slug, self.hash)
    }
}

pub fn sanitize_name(name: &str) -> String {
    let stripped = UNSAFE_CHARS.replace_all(name, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    if collapsed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        collapsed.into_owned()
    }
}

pub fn url_hash(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    digest[..HASH_LEN].to_string()
}

pub fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?.to_string();
    let (_, ext) = segment.rsplit_once('.')?;
    normalize_extension(ext)
}

fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    EXTENSION.is_match(&ext).then_some(ext)
}

pub fn resolve_extension(url: &str, explicit: Option<&str>) -> String {
    explicit
        .and_then(normalize_extension)
        .or_else(|| url_extension(url))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

pub fn resolve_path(
    url: &str,
    name: &str,
    explicit_extension: Option<&str>,
    base_dir: &Utf8Path,
) -> Utf8PathBuf {
    let key = CacheKey::new(url, name);
    let extension = resolve_extension(url, explicit_extension);
    base_dir.join(key.file_name(&extension))
}
