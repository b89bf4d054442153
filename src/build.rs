use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli::BuildArgs;

pub const CORPUS_DIR: &str = "corpus";
pub const LINK_MAP_FILE: &str = "links.yaml";
pub const SITE_DIR: &str = "site";

pub fn run(args: BuildArgs) -> anyhow::Result<()> {
    let workspace_dir = PathBuf::from(&args.out);
    if workspace_dir.exists() {
        anyhow::bail!(
            "workspace output directory already exists: {}",
            workspace_dir.display()
        );
    }
    std::fs::create_dir_all(&workspace_dir)
        .with_context(|| format!("create workspace dir: {}", workspace_dir.display()))?;

    let config = crate::config::load(args.config.as_deref())?;
    let mut crawl_config = config.crawl;
    if let Some(max_pages) = args.max_pages {
        crawl_config.max_pages = max_pages;
    }
    if let Some(delay_ms) = args.delay_ms {
        crawl_config.delay_ms = delay_ms;
    }

    let corpus_dir = workspace_dir.join(CORPUS_DIR);
    let link_map_path = workspace_dir.join(LINK_MAP_FILE);
    let site_dir = workspace_dir.join(SITE_DIR);

    tracing::info!(out = %workspace_dir.display(), "build: crawl");
    let crawl = crate::crawl::run_with_config(&crawl_config, &corpus_dir, false)
        .context("crawl")?;
    tracing::info!(
        pages = crawl.sitemap.len(),
        failed = crawl.failed.len(),
        "build: crawl finished"
    );

    tracing::info!("build: linkmap build");
    let map = crate::linkmap::build_from_corpus(
        &corpus_dir,
        &config.generate,
        args.base_map.as_deref().map(Path::new),
    )
    .context("linkmap build")?;
    crate::linkmap::write(&link_map_path, &map).context("linkmap write")?;

    tracing::info!("build: generate");
    let report =
        crate::generate::run_with_config(&config.generate, &corpus_dir, &site_dir, map, false)
            .context("generate")?;

    println!(
        "{} pages crawled, {} articles in {} categories: {}",
        crawl.sitemap.len(),
        report.articles,
        report.categories,
        site_dir.display()
    );
    Ok(())
}
