use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::path::Path;

use anyhow::Context as _;
use url::Url;

use crate::cli::{LinkMapBuildArgs, LinkMapCheckArgs};
use crate::corpus::CorpusPage;
use crate::formats::{LinkMapEntry, LinkMapFile};
use crate::scope::{normalize, path_stem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMapProblem {
    InvalidUrl { from: String },
    Duplicate { key: String, to: String },
    Conflict { key: String, first: String, second: String },
}

impl fmt::Display for LinkMapProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { from } => write!(f, "invalid source url: {from}"),
            Self::Duplicate { key, to } => write!(f, "duplicate key {key} -> {to}"),
            Self::Conflict { key, first, second } => {
                write!(f, "conflicting key {key}: {first} vs {second}")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("link map has {} problem(s):\n{}", .problems.len(), render_problems(.problems))]
pub struct LinkMapError {
    pub problems: Vec<LinkMapProblem>,
}

fn render_problems(problems: &[LinkMapProblem]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lookup key for a link: normalized URL with its fragment kept, so
/// `https://x.test/a/#b` and `https://X.test/a#b` share a key.
pub fn link_key(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let mut key = normalize(&url);
    key.set_fragment(url.fragment().filter(|f| !f.is_empty()));
    Some(key.to_string())
}

/// Validated URL(+fragment) -> local path table. Targets are relative to the
/// generated `pages/` directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkMap {
    entries: BTreeMap<String, String>,
}

impl LinkMap {
    pub fn from_entries(entries: &[LinkMapEntry]) -> Result<Self, LinkMapError> {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        let mut problems = Vec::new();

        for entry in entries {
            let Some(key) = link_key(&entry.from) else {
                problems.push(LinkMapProblem::InvalidUrl {
                    from: entry.from.clone(),
                });
                continue;
            };
            match map.get(&key) {
                Some(existing) if *existing == entry.to => {
                    problems.push(LinkMapProblem::Duplicate {
                        key,
                        to: entry.to.clone(),
                    });
                }
                Some(existing) => {
                    problems.push(LinkMapProblem::Conflict {
                        key,
                        first: existing.clone(),
                        second: entry.to.clone(),
                    });
                }
                None => {
                    map.insert(key, entry.to.clone());
                }
            }
        }

        if !problems.is_empty() {
            return Err(LinkMapError { problems });
        }
        Ok(Self { entries: map })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read link map: {}", path.display()))?;
        let file: LinkMapFile = serde_yaml::from_str(&yaml)
            .with_context(|| format!("parse link map: {}", path.display()))?;
        let map = Self::from_entries(&file.entries)
            .with_context(|| format!("validate link map: {}", path.display()))?;
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact key (fragment included) first, then the key without its fragment.
    pub fn lookup(&self, url: &str) -> Option<&str> {
        self.resolve(url).map(|(_, target)| target)
    }

    /// Like [`LinkMap::lookup`], also returning the entry key that matched.
    pub fn resolve(&self, url: &str) -> Option<(&str, &str)> {
        let key = link_key(url)?;
        if let Some((key, target)) = self.entries.get_key_value(&key) {
            return Some((key, target));
        }
        let mut bare = Url::parse(&key).ok()?;
        bare.fragment()?;
        bare.set_fragment(None);
        self.entries
            .get_key_value(bare.as_str())
            .map(|(key, target)| (key.as_str(), target.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn to_file(&self) -> LinkMapFile {
        LinkMapFile {
            entries: self
                .entries
                .iter()
                .map(|(from, to)| LinkMapEntry {
                    from: from.clone(),
                    to: to.clone(),
                })
                .collect(),
        }
    }
}

/// One entry per article URL: its key -> `<stem>.html`. Pages that redirected
/// to the same URL collapse into one entry, preferring the page whose stem was
/// derived from that URL, then the lowest stem.
pub fn corpus_entries<'a, I>(articles: I) -> Vec<LinkMapEntry>
where
    I: IntoIterator<Item = &'a CorpusPage>,
{
    let mut chosen: BTreeMap<String, &CorpusPage> = BTreeMap::new();
    for page in articles {
        if page.record.url.is_empty() {
            continue;
        }
        let Some(key) = link_key(&page.record.url) else {
            tracing::warn!(stem = %page.stem, url = %page.record.url, "page record has invalid url");
            continue;
        };
        match chosen.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(page);
            }
            Entry::Occupied(mut slot) => {
                let kept = preferred(slot.get(), page);
                tracing::debug!(
                    key = %slot.key(),
                    kept = %kept.stem,
                    first = %slot.get().stem,
                    second = %page.stem,
                    "pages share a url"
                );
                slot.insert(kept);
            }
        }
    }

    chosen
        .into_iter()
        .map(|(from, page)| LinkMapEntry {
            from,
            to: format!("{}.html", page.stem),
        })
        .collect()
}

fn preferred<'a>(current: &'a CorpusPage, candidate: &'a CorpusPage) -> &'a CorpusPage {
    match (stem_matches_url(current), stem_matches_url(candidate)) {
        (false, true) => candidate,
        (true, false) => current,
        _ if candidate.stem < current.stem => candidate,
        _ => current,
    }
}

fn stem_matches_url(page: &CorpusPage) -> bool {
    Url::parse(&page.record.url).is_ok_and(|url| page.stem.ends_with(&path_stem(&normalize(&url))))
}

pub fn build(args: LinkMapBuildArgs) -> anyhow::Result<()> {
    let out_path = Path::new(&args.out);
    if out_path.exists() && !args.force {
        anyhow::bail!("link map output already exists: {}", out_path.display());
    }
    let config = crate::config::load(args.config.as_deref())?.generate;
    let map = build_from_corpus(
        Path::new(&args.corpus),
        &config,
        args.base.as_deref().map(Path::new),
    )?;
    write(out_path, &map)?;
    tracing::info!(entries = map.len(), out = %out_path.display(), "link map written");
    Ok(())
}

pub fn build_from_corpus(
    corpus_dir: &Path,
    config: &crate::config::GenerateConfig,
    base: Option<&Path>,
) -> anyhow::Result<LinkMap> {
    let mut entries = match base {
        Some(base) => {
            let yaml = std::fs::read_to_string(base)
                .with_context(|| format!("read base link map: {}", base.display()))?;
            let file: LinkMapFile = serde_yaml::from_str(&yaml)
                .with_context(|| format!("parse base link map: {}", base.display()))?;
            file.entries
        }
        None => Vec::new(),
    };
    let hand_maintained = entries.len();

    let pages = crate::corpus::load_pages(corpus_dir).context("load corpus")?;
    entries.extend(corpus_entries(
        pages.iter().filter(|page| crate::generate::is_article(&page.record, config)),
    ));
    tracing::debug!(
        hand_maintained,
        derived = entries.len() - hand_maintained,
        "link map entries collected"
    );

    Ok(LinkMap::from_entries(&entries)?)
}

pub fn write(path: &Path, map: &LinkMap) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create link map dir: {}", parent.display()))?;
    }
    let yaml = serde_yaml::to_string(&map.to_file()).context("serialize link map")?;
    std::fs::write(path, yaml).with_context(|| format!("write link map: {}", path.display()))?;
    Ok(())
}

pub fn check(args: LinkMapCheckArgs) -> anyhow::Result<()> {
    let map = LinkMap::load(Path::new(&args.map))?;
    println!("{} entries, no duplicate or conflicting keys", map.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(from: &str, to: &str) -> LinkMapEntry {
        LinkMapEntry {
            from: from.to_owned(),
            to: to.to_owned(),
        }
    }

    #[test]
    fn lookup_prefers_fragment_then_falls_back() -> anyhow::Result<()> {
        let map = LinkMap::from_entries(&[
            entry("https://www.jesuswalk.com/acts/", "all-studies.html#acts"),
            entry("https://www.jesuswalk.com/index.htm#books", "books.html"),
        ])?;

        assert_eq!(
            map.lookup("https://WWW.jesuswalk.com/acts"),
            Some("all-studies.html#acts")
        );
        assert_eq!(
            map.lookup("https://www.jesuswalk.com/acts/#chapter-2"),
            Some("all-studies.html#acts")
        );
        assert_eq!(
            map.lookup("https://www.jesuswalk.com/index.htm#books"),
            Some("books.html")
        );
        assert_eq!(map.lookup("https://www.jesuswalk.com/index.htm"), None);
        assert_eq!(map.lookup("not a url"), None);
        Ok(())
    }

    #[test]
    fn trailing_slash_variants_conflict() {
        let err = LinkMap::from_entries(&[
            entry("https://www.jesuswalk.com/lords-supper/", "all-studies.html#topical"),
            entry("https://www.jesuswalk.com/lords-supper", "jw_lords-supper.html"),
            entry("https://www.jesuswalk.com/grace/", "all-studies.html#topical"),
            entry("https://www.jesuswalk.com/grace", "all-studies.html#topical"),
            entry("::nonsense::", "x.html"),
        ])
        .unwrap_err();

        assert_eq!(err.problems.len(), 3);
        assert!(matches!(err.problems[0], LinkMapProblem::Conflict { .. }));
        assert!(matches!(err.problems[1], LinkMapProblem::Duplicate { .. }));
        assert!(matches!(err.problems[2], LinkMapProblem::InvalidUrl { .. }));

        let message = err.to_string();
        assert!(message.contains("3 problem(s)"));
        assert!(message.contains("https://www.jesuswalk.com/lords-supper"));
    }

    #[test]
    fn written_map_loads_back() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let map = LinkMap::from_entries(&[entry("https://x.test/a.htm", "a_htm.html")])?;
        let path = temp.path().join("maps").join("links.yaml");
        write(&path, &map)?;
        assert_eq!(LinkMap::load(&path)?, map);
        Ok(())
    }

    fn article(stem: &str, url: &str) -> CorpusPage {
        CorpusPage {
            stem: stem.to_owned(),
            record: crate::formats::PageRecord {
                url: url.to_owned(),
                category: "christmas".to_owned(),
                ..crate::formats::PageRecord::default()
            },
        }
    }

    #[test]
    fn redirected_pages_share_one_entry() -> anyhow::Result<()> {
        let target = "https://example.test/christmas/born.htm";
        let pages = [
            article("jesus_born_htm", target),
            article("christmas_born_htm", target),
            article("christmas_star_htm", "https://example.test/christmas/star.htm"),
        ];

        let entries = corpus_entries(&pages);

        assert_eq!(
            entries,
            vec![
                entry(target, "christmas_born_htm.html"),
                entry("https://example.test/christmas/star.htm", "christmas_star_htm.html"),
            ]
        );
        Ok(())
    }

    #[test]
    fn corpus_duplicates_build_but_base_conflicts_fail() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let target = "https://example.test/christmas/born.htm";
        for page in [
            article("jesus_born_htm", target),
            article("christmas_born_htm", target),
        ] {
            crate::corpus::write_json(
                &crate::corpus::page_record_path(temp.path(), &page.stem),
                &page.record,
            )?;
        }
        let config = crate::config::GenerateConfig::default();

        let map = build_from_corpus(temp.path(), &config, None)?;
        assert_eq!(map.len(), 1);
        assert_eq!(map.lookup(target), Some("christmas_born_htm.html"));

        let base = temp.path().join("base.yaml");
        write(
            &base,
            &LinkMap::from_entries(&[entry(target, "all-studies.html#christmas")])?,
        )?;
        let err = build_from_corpus(temp.path(), &config, Some(&base)).unwrap_err();
        assert!(format!("{err:#}").contains("conflicting key"));
        Ok(())
    }
}
