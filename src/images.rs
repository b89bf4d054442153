use std::collections::HashMap;
use std::path::PathBuf;

use sha2::Digest as _;
use url::Url;

use crate::fetch::Fetch;

/// Per-crawl image download cache keyed by absolute image URL.
/// Failed downloads are remembered as `None` so they are not retried.
pub struct ImageCache {
    dir: PathBuf,
    downloaded: HashMap<String, Option<String>>,
}

impl ImageCache {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            downloaded: HashMap::new(),
        }
    }

    pub fn saved_count(&self) -> usize {
        self.downloaded.values().filter(|v| v.is_some()).count()
    }

    pub fn download<F: Fetch + ?Sized>(&mut self, fetcher: &mut F, src: &str) -> Option<String> {
        if let Some(cached) = self.downloaded.get(src) {
            return cached.clone();
        }

        let saved = self.try_download(fetcher, src);
        self.downloaded.insert(src.to_owned(), saved.clone());
        saved
    }

    fn try_download<F: Fetch + ?Sized>(&self, fetcher: &mut F, src: &str) -> Option<String> {
        let url = Url::parse(src).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }

        let response = match fetcher.get(&url) {
            Ok(response) if response.status == 200 => response,
            Ok(response) => {
                tracing::debug!(%url, status = response.status, "image download skipped");
                return None;
            }
            Err(err) => {
                tracing::debug!(%url, %err, "image download failed");
                return None;
            }
        };

        let file_name = image_file_name(&url);
        let path = self.dir.join(&file_name);
        if let Err(err) = std::fs::write(&path, &response.body) {
            tracing::warn!(path = %path.display(), %err, "write image failed");
            return None;
        }
        Some(file_name)
    }
}

/// `<8 hex chars of sha256(url)>_<basename>`, restricted to `[A-Za-z0-9._-]`.
pub fn image_file_name(url: &Url) -> String {
    let digest = sha2::Sha256::digest(url.as_str().as_bytes());
    let hash = hex::encode(digest);

    let basename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("image");
    let name = if basename.contains('.') {
        basename.to_owned()
    } else {
        format!("{basename}.jpg")
    };

    format!("{}_{name}", &hash[..8])
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;

    #[test]
    fn file_name_is_hash_prefixed_and_sanitized() -> anyhow::Result<()> {
        let url = Url::parse("https://example.test/img/Dr%20Wilson.png")?;
        let name = image_file_name(&url);
        assert_eq!(name.len(), 8 + 1 + "Dr_20Wilson.png".len());
        assert!(name.ends_with("_Dr_20Wilson.png"));
        assert!(name[..8].chars().all(|c| c.is_ascii_hexdigit()));

        let bare = image_file_name(&Url::parse("https://example.test/photo")?);
        assert!(bare.ends_with("_photo.jpg"));
        Ok(())
    }

    #[test]
    fn each_image_url_is_downloaded_once() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let src = "https://example.test/cross.gif";
        let mut fetcher = StubFetcher::default()
            .bytes(src, b"GIF89a")
            .status("https://example.test/missing.gif", 404);
        let mut cache = ImageCache::new(temp.path().to_path_buf());

        let first = cache.download(&mut fetcher, src);
        let second = cache.download(&mut fetcher, src);
        let missing = cache.download(&mut fetcher, "https://example.test/missing.gif");
        cache.download(&mut fetcher, "https://example.test/missing.gif");

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(missing, None);
        assert_eq!(fetcher.count(src), 1);
        assert_eq!(fetcher.count("https://example.test/missing.gif"), 1);
        assert_eq!(cache.saved_count(), 1);

        let saved = temp.path().join(first.unwrap_or_default());
        assert_eq!(std::fs::read(saved)?, b"GIF89a");
        Ok(())
    }
}
