use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use scraper::Html;
use url::Url;

use crate::cli::CrawlArgs;
use crate::config::CrawlConfig;
use crate::corpus;
use crate::extract::Extractor;
use crate::fetch::{Fetch, HttpFetcher, RetryPolicy, fetch_with_retry};
use crate::formats::{CrawlSummary, FailedUrl, Sitemap, SitemapEntry};
use crate::images::ImageCache;
use crate::scope::{CrawlScope, normalize};

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_pages: usize,
    pub delay: Duration,
    pub retry: RetryPolicy,
    pub download_images: bool,
}

impl CrawlOptions {
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            delay: Duration::from_millis(config.delay_ms),
            retry: RetryPolicy {
                attempts: 2,
                retry_backoff: Duration::from_millis(config.retry_backoff_ms),
                rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
            },
            download_images: config.download_images,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// URLs taken off the queue, in visit order (successful or not).
    pub visited: Vec<String>,
    pub sitemap: Sitemap,
    pub failed: Vec<FailedUrl>,
    pub images_saved: usize,
}

/// Breadth-first crawler over an allow-listed set of hosts. Owns the visited
/// set and image cache for the duration of one crawl.
pub struct Crawler<F: Fetch> {
    fetcher: F,
    scope: CrawlScope,
    extractor: Extractor,
    out_dir: PathBuf,
    options: CrawlOptions,
}

impl<F: Fetch> Crawler<F> {
    pub fn new(
        fetcher: F,
        scope: CrawlScope,
        out_dir: &Path,
        options: CrawlOptions,
    ) -> anyhow::Result<Self> {
        let extractor = Extractor::new(scope.clone()).context("build extractor")?;
        Ok(Self {
            fetcher,
            scope,
            extractor,
            out_dir: out_dir.to_path_buf(),
            options,
        })
    }

    pub fn into_fetcher(self) -> F {
        self.fetcher
    }

    pub fn crawl(&mut self, seeds: &[Url]) -> anyhow::Result<CrawlReport> {
        let pages_dir = self.out_dir.join(corpus::PAGES_DIR);
        let images_dir = self.out_dir.join(corpus::IMAGES_DIR);
        for dir in [&pages_dir, &images_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create dir: {}", dir.display()))?;
        }

        let started = Instant::now();
        let mut images = ImageCache::new(images_dir);
        let mut report = CrawlReport::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Url> = seeds.iter().map(normalize).collect();

        tracing::info!(
            seeds = seeds.len(),
            max_pages = self.options.max_pages,
            out = %self.out_dir.display(),
            "crawl: start"
        );

        while report.visited.len() < self.options.max_pages {
            let Some(url) = queue.pop_front() else {
                break;
            };
            // Marked before fetching so a failed URL is never requeued.
            if !visited.insert(url.to_string()) {
                continue;
            }
            report.visited.push(url.to_string());
            let position = report.visited.len();

            let fetched = match fetch_with_retry(&mut self.fetcher, &url, &self.options.retry) {
                Ok(fetched) => fetched,
                Err(err) => {
                    tracing::warn!(position, %url, %err, "crawl: fetch failed");
                    report.failed.push(FailedUrl {
                        url: url.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let document = Html::parse_document(&fetched.body);
            let mut record = self
                .extractor
                .extract_document(&document, &fetched.final_url);

            if self.options.download_images {
                for image in &mut record.images {
                    image.local_file = images.download(&mut self.fetcher, &image.src);
                }
            }

            let stem = self.scope.file_stem(&url);
            let record_path = corpus::page_record_path(&self.out_dir, &stem);
            if let Err(err) = corpus::write_json(&record_path, &record) {
                let reason = format!("write page record: {err:#}");
                tracing::warn!(position, %url, %reason, "crawl: record write failed");
                report.failed.push(FailedUrl {
                    url: url.to_string(),
                    reason,
                });
                continue;
            }
            report
                .sitemap
                .insert(url.to_string(), SitemapEntry::for_record(&record));

            tracing::info!(
                position,
                %url,
                headings = record.headings.len(),
                paragraphs = record.paragraphs.len(),
                images = record.images.len(),
                "crawl: page saved"
            );

            for link in self.extractor.discover_links(&document, &fetched.final_url) {
                if !visited.contains(link.as_str()) {
                    queue.push_back(link);
                }
            }

            if !self.options.delay.is_zero() {
                std::thread::sleep(self.options.delay);
            }
        }

        report.images_saved = images.saved_count();
        self.write_master_files(&report, started.elapsed())?;

        tracing::info!(
            pages = report.sitemap.len(),
            failed = report.failed.len(),
            images = report.images_saved,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "crawl: complete"
        );
        Ok(report)
    }

    fn write_master_files(&self, report: &CrawlReport, elapsed: Duration) -> anyhow::Result<()> {
        corpus::write_json(&self.out_dir.join(corpus::SITEMAP_FILE), &report.sitemap)
            .context("write sitemap")?;

        let failed_path = self.out_dir.join(corpus::FAILED_FILE);
        if !report.failed.is_empty() {
            corpus::write_json(&failed_path, &report.failed).context("write failed urls")?;
        } else if failed_path.exists() {
            std::fs::remove_file(&failed_path)
                .with_context(|| format!("remove stale {}", failed_path.display()))?;
        }

        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for entry in report.sitemap.values() {
            *categories.entry(entry.category.clone()).or_default() += 1;
        }
        let domains: BTreeSet<String> = report
            .sitemap
            .keys()
            .filter_map(|url| Url::parse(url).ok())
            .filter_map(|url| url.host_str().map(str::to_owned))
            .collect();

        let summary = CrawlSummary {
            scraped_at: chrono::Utc::now().to_rfc3339(),
            total_pages: report.sitemap.len(),
            total_failed: report.failed.len(),
            total_images: report.images_saved,
            elapsed_seconds: (elapsed.as_secs_f64() * 10.0).round() / 10.0,
            domains: domains.into_iter().collect(),
            categories,
        };
        corpus::write_json(&self.out_dir.join(corpus::SUMMARY_FILE), &summary)
            .context("write crawl summary")?;
        Ok(())
    }
}

/// Applies command-line overrides on top of the loaded crawl config.
pub fn apply_overrides(config: &mut CrawlConfig, args: &CrawlArgs) {
    if !args.seed.is_empty() {
        config.seeds = args.seed.clone();
    }
    if !args.allow.is_empty() {
        config.allowed_domains = args.allow.clone();
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.delay_ms = delay_ms;
    }
    if args.no_images {
        config.download_images = false;
    }
}

pub fn parse_seeds(seeds: &[String]) -> anyhow::Result<Vec<Url>> {
    if seeds.is_empty() {
        anyhow::bail!("no seed urls configured");
    }
    seeds
        .iter()
        .map(|seed| {
            let url = Url::parse(seed).with_context(|| format!("parse seed url: {seed}"))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                anyhow::bail!("seed url must be http/https: {url}");
            }
            Ok(url)
        })
        .collect()
}

pub fn run(args: CrawlArgs) -> anyhow::Result<()> {
    let mut config = crate::config::load(args.config.as_deref())?.crawl;
    apply_overrides(&mut config, &args);
    run_with_config(&config, Path::new(&args.out), args.force).map(|_| ())
}

pub fn run_with_config(
    config: &CrawlConfig,
    out_dir: &Path,
    force: bool,
) -> anyhow::Result<CrawlReport> {
    let seeds = parse_seeds(&config.seeds)?;
    corpus::ensure_output_dir(out_dir, force).context("check crawl output directory")?;

    let fetcher = HttpFetcher::new(&config.user_agent, Duration::from_secs(config.timeout_secs))?;
    let scope = CrawlScope::new(&config.allowed_domains, config.file_prefixes.clone());
    let mut crawler = Crawler::new(fetcher, scope, out_dir, CrawlOptions::from_config(config))?;
    crawler.crawl(&seeds)
}
