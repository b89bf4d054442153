use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use regex::{Captures, Regex};

use crate::cli::RelinkArgs;
use crate::linkmap::LinkMap;
use crate::render::escape_html;

const HREF_PATTERN: &str = r#"href\s*=\s*"([^"]*)"|href\s*=\s*'([^']*)'"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub replacements: Vec<Replacement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelinkReport {
    pub changed: Vec<FileChange>,
    pub unmatched_files: Vec<PathBuf>,
    pub unused_keys: Vec<String>,
}

impl RelinkReport {
    pub fn replacement_count(&self) -> usize {
        self.changed.iter().map(|c| c.replacements.len()).sum()
    }
}

/// Rewrites `href` attributes of HTML documents through a [`LinkMap`].
pub struct Relinker<'a> {
    map: &'a LinkMap,
    href: Regex,
}

impl<'a> Relinker<'a> {
    pub fn new(map: &'a LinkMap) -> anyhow::Result<Self> {
        Ok(Self {
            map,
            href: Regex::new(HREF_PATTERN).context("compile href pattern")?,
        })
    }

    /// Returns the rewritten document, the replacements made and the map keys
    /// that matched.
    pub fn rewrite(&self, html: &str) -> (String, Vec<Replacement>, BTreeSet<String>) {
        let mut replacements = Vec::new();
        let mut used = BTreeSet::new();

        let rewritten = self.href.replace_all(html, |caps: &Captures<'_>| {
            let (value, quote) = match (caps.get(1), caps.get(2)) {
                (Some(value), _) => (value.as_str(), '"'),
                (None, Some(value)) => (value.as_str(), '\''),
                (None, None) => return caps[0].to_owned(),
            };
            let url = value.replace("&amp;", "&");
            match self.map.resolve(&url) {
                Some((key, target)) => {
                    used.insert(key.to_owned());
                    replacements.push(Replacement {
                        before: value.to_owned(),
                        after: target.to_owned(),
                    });
                    format!("href={quote}{}{quote}", escape_html(target))
                }
                None => caps[0].to_owned(),
            }
        });

        (rewritten.into_owned(), replacements, used)
    }

    /// Rewrites every `*.html` file under `dir`. All rewrites are computed and
    /// checked for idempotence before any file is written, so a failing file
    /// leaves the whole tree untouched.
    pub fn relink_dir(&self, dir: &Path, dry_run: bool) -> anyhow::Result<RelinkReport> {
        let mut files = Vec::new();
        collect_html_files(dir, &mut files)?;
        files.sort();

        let mut report = RelinkReport::default();
        let mut used_keys = BTreeSet::new();
        let mut pending: Vec<(PathBuf, String)> = Vec::new();

        for path in files {
            let html = std::fs::read_to_string(&path)
                .with_context(|| format!("read html: {}", path.display()))?;
            let (rewritten, replacements, used) = self.rewrite(&html);

            if replacements.is_empty() {
                tracing::info!(file = %path.display(), "no mapped links");
                report.unmatched_files.push(path);
                continue;
            }

            let (again, repeat, _) = self.rewrite(&rewritten);
            if !repeat.is_empty() || again != rewritten {
                anyhow::bail!(
                    "link map is not idempotent on {}: second pass rewrote {} -> {}; no files were written",
                    path.display(),
                    repeat.first().map_or("", |r| r.before.as_str()),
                    repeat.first().map_or("", |r| r.after.as_str()),
                );
            }

            used_keys.extend(used);
            report.changed.push(FileChange {
                path: path.clone(),
                replacements,
            });
            pending.push((path, rewritten));
        }

        if !dry_run {
            for (path, rewritten) in &pending {
                std::fs::write(path, rewritten)
                    .with_context(|| format!("write html: {}", path.display()))?;
            }
        }

        report.unused_keys = self
            .map
            .keys()
            .filter(|key| !used_keys.contains(*key))
            .map(str::to_owned)
            .collect();
        Ok(report)
    }
}

fn collect_html_files(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read dir: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_html_files(&path, out)?;
        } else if file_type.is_file() && path.extension().is_some_and(|ext| ext == "html") {
            out.push(path);
        }
    }
    Ok(())
}

pub fn print_report(report: &RelinkReport, dry_run: bool) {
    for change in &report.changed {
        println!("{}", change.path.display());
        for replacement in &change.replacements {
            println!("  {} -> {}", replacement.before, replacement.after);
        }
    }
    for key in &report.unused_keys {
        println!("unused: {key}");
    }
    println!(
        "{}{} replacement(s) in {} file(s), {} file(s) unchanged",
        if dry_run { "[dry run] " } else { "" },
        report.replacement_count(),
        report.changed.len(),
        report.unmatched_files.len(),
    );
}

pub fn run(args: RelinkArgs) -> anyhow::Result<()> {
    let map = LinkMap::load(Path::new(&args.map))?;
    let dir = Path::new(&args.dir);
    if !dir.is_dir() {
        anyhow::bail!("relink directory does not exist: {}", dir.display());
    }

    let relinker = Relinker::new(&map)?;
    let report = relinker.relink_dir(dir, args.dry_run)?;
    if !report.unused_keys.is_empty() {
        tracing::warn!(count = report.unused_keys.len(), "link map entries never matched");
    }
    print_report(&report, args.dry_run);
    Ok(())
}
