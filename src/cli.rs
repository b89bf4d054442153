use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl, build the link map and generate the site in one workspace.
    Build(BuildArgs),
    /// Crawl the legacy sites into a corpus of page records.
    Crawl(CrawlArgs),
    /// Render a static site from a crawled corpus.
    Generate(GenerateArgs),
    Linkmap {
        #[command(subcommand)]
        command: LinkMapCommand,
    },
    /// Rewrite links in previously generated HTML through a link map.
    Relink(RelinkArgs),
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Output directory for the corpus (pages/, images/, sitemap.json).
    #[arg(long)]
    pub out: String,

    /// YAML config file. Built-in defaults are used when omitted.
    #[arg(long)]
    pub config: Option<String>,

    /// Seed URL (repeatable). Replaces the configured seeds.
    #[arg(long)]
    pub seed: Vec<String>,

    /// Allowed host (repeatable). Replaces the configured allow-list.
    #[arg(long)]
    pub allow: Vec<String>,

    /// Maximum pages to visit, failures included.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Delay after each successful page (politeness).
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Skip image downloads.
    #[arg(long)]
    pub no_images: bool,

    /// Overwrite an existing output directory.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Corpus directory (created by `crawl`).
    #[arg(long)]
    pub corpus: String,

    /// Output directory for the generated site.
    #[arg(long)]
    pub out: String,

    #[arg(long)]
    pub config: Option<String>,

    /// Link map used to resolve list links (created by `linkmap build`).
    #[arg(long)]
    pub link_map: Option<String>,

    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Subcommand)]
pub enum LinkMapCommand {
    /// Derive the link map from a corpus, merged with a hand-maintained base.
    Build(LinkMapBuildArgs),
    /// Validate a link map file.
    Check(LinkMapCheckArgs),
}

#[derive(Debug, Args)]
pub struct LinkMapBuildArgs {
    /// Corpus directory (created by `crawl`).
    #[arg(long)]
    pub corpus: String,

    /// Output file path for the link map YAML.
    #[arg(long)]
    pub out: String,

    /// Hand-maintained entries to merge in.
    #[arg(long)]
    pub base: Option<String>,

    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct LinkMapCheckArgs {
    /// Link map YAML file.
    #[arg(long)]
    pub map: String,
}

#[derive(Debug, Args)]
pub struct RelinkArgs {
    /// Link map YAML file.
    #[arg(long)]
    pub map: String,

    /// Directory of HTML files to rewrite, searched recursively.
    #[arg(long)]
    pub dir: String,

    /// Report replacements without writing files.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Output directory for the workspace (corpus/, links.yaml, site/).
    #[arg(long)]
    pub out: String,

    #[arg(long)]
    pub config: Option<String>,

    /// Maximum pages to visit, failures included.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Delay after each successful page (politeness).
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Hand-maintained link map entries to merge in.
    #[arg(long)]
    pub base_map: Option<String>,
}
