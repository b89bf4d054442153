use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;

use crate::formats::PageRecord;

pub const PAGES_DIR: &str = "pages";
pub const IMAGES_DIR: &str = "images";
pub const SITEMAP_FILE: &str = "sitemap.json";
pub const SUMMARY_FILE: &str = "crawl_summary.json";
pub const FAILED_FILE: &str = "failed_urls.json";

/// Creates `out_dir`. An existing directory is an error unless `force` is set,
/// in which case its previous contents are removed first.
pub fn ensure_output_dir(out_dir: &Path, force: bool) -> anyhow::Result<()> {
    if out_dir.exists() {
        if !force {
            anyhow::bail!(
                "output directory already exists (use --force to overwrite): {}",
                out_dir.display()
            );
        }
        tracing::info!(out = %out_dir.display(), "removing previous output");
        std::fs::remove_dir_all(out_dir)
            .with_context(|| format!("remove previous output dir: {}", out_dir.display()))?;
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir: {}", out_dir.display()))?;
    Ok(())
}

pub fn page_record_path(corpus_dir: &Path, stem: &str) -> PathBuf {
    corpus_dir.join(PAGES_DIR).join(format!("{stem}.json"))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize json: {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("write json: {}", path.display()))?;
    Ok(())
}

/// A page record together with the file stem it was stored under.
#[derive(Debug, Clone)]
pub struct CorpusPage {
    pub stem: String,
    pub record: PageRecord,
}

/// Loads every `pages/*.json` record, sorted by file stem. Unreadable or
/// malformed files are logged and skipped.
pub fn load_pages(corpus_dir: &Path) -> anyhow::Result<Vec<CorpusPage>> {
    let pages_dir = corpus_dir.join(PAGES_DIR);
    let mut pages = Vec::new();

    for entry in std::fs::read_dir(&pages_dir)
        .with_context(|| format!("read corpus pages dir: {}", pages_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let record = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|json| serde_json::from_str::<PageRecord>(&json).map_err(Into::into));
        match record {
            Ok(record) => pages.push(CorpusPage {
                stem: stem.to_owned(),
                record,
            }),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable page record");
            }
        }
    }

    pages.sort_by(|a, b| a.stem.cmp(&b.stem));
    Ok(pages)
}
