use std::collections::BTreeMap;

use sha2::{Digest as _, Sha256};
use url::Url;

const SKIP_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "mp3", "mp4", "wav", "zip", "rar", "exe", "png", "jpg", "jpeg", "gif",
    "svg", "ico", "css", "js", "xml", "rss", "atom",
];

const SKIP_SUBSTRINGS: &[&str] = &[
    "/wp-login",
    "/wp-admin",
    "/feed/",
    "/xmlrpc",
    "javascript:",
    "mailto:",
    "tel:",
    "#",
];

const MAX_FILE_STEM_LEN: usize = 100;
const QUERY_SUFFIX_LEN: usize = 10;

/// Lowercases the host, strips trailing slashes from the path (collapsing to `/`),
/// keeps the query and drops the fragment.
pub fn normalize(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    if let Some(host) = url.host_str() {
        let lower = host.to_ascii_lowercase();
        if lower != host {
            let _ = normalized.set_host(Some(&lower));
        }
    }
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        normalized.set_path("/");
    } else {
        normalized.set_path(path);
    }
    normalized
}

/// First non-empty path segment, or `home` for the site root.
pub fn category_for(url: &Url) -> String {
    url.path()
        .split('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("home")
        .to_owned()
}

#[derive(Debug, Clone)]
pub struct CrawlScope {
    allowed_hosts: Vec<String>,
    file_prefixes: BTreeMap<String, String>,
}

impl CrawlScope {
    pub fn new<I, S>(allowed_hosts: I, file_prefixes: BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|host| host.as_ref().trim().to_ascii_lowercase())
                .filter(|host| !host.is_empty())
                .collect(),
            file_prefixes,
        }
    }

    pub fn is_allowed_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.allowed_hosts.iter().any(|allowed| *allowed == host)
    }

    pub fn is_crawlable(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        if !self.is_allowed_host(url) {
            return false;
        }

        let path = url.path().to_ascii_lowercase();
        if let Some(last) = path.rsplit('/').next()
            && let Some((_, ext)) = last.rsplit_once('.')
            && SKIP_EXTENSIONS.contains(&ext)
        {
            return false;
        }

        // Append a slash so `/feed` is caught by `/feed/` after normalization.
        let candidate = format!("{}/", url.as_str().to_ascii_lowercase());
        !SKIP_SUBSTRINGS.iter().any(|pattern| candidate.contains(pattern))
    }

    /// Deterministic file stem for a page record: host prefix plus [`path_stem`].
    pub fn file_stem(&self, url: &Url) -> String {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let prefix = self
            .file_prefixes
            .iter()
            .find(|(needle, _)| host.contains(needle.as_str()))
            .map(|(_, prefix)| prefix.as_str())
            .unwrap_or_default();
        let limit = MAX_FILE_STEM_LEN.saturating_sub(prefix.len()).max(QUERY_SUFFIX_LEN + 1);
        format!("{prefix}{}", stem_within(url, limit))
    }
}

/// Stem derived from the URL path alone. A non-empty query adds `_q` and
/// 8 hex chars of its sha256, so query variants of one path stay distinct.
pub fn path_stem(url: &Url) -> String {
    stem_within(url, MAX_FILE_STEM_LEN)
}

fn stem_within(url: &Url, limit: usize) -> String {
    let path = url.path().trim_matches('/');
    let path = if path.is_empty() { "index" } else { path };
    let mut stem: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    match url.query().filter(|q| !q.is_empty()) {
        Some(query) => {
            let hash = hex::encode(Sha256::digest(query.as_bytes()));
            stem.truncate(limit - QUERY_SUFFIX_LEN);
            stem.push_str("_q");
            stem.push_str(&hash[..8]);
        }
        None => stem.truncate(limit),
    }
    stem
}
