use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::clean::{Block, Cleaner};
use crate::cli::GenerateArgs;
use crate::config::GenerateConfig;
use crate::corpus::{self, CorpusPage};
use crate::formats::{ListItem, PageRecord};
use crate::linkmap::{LinkMap, corpus_entries, link_key};
use crate::render::{self, Link, Shell, escape_html};

const PAGES_DIR: &str = "pages";
const EXCERPT_CHARS: usize = 160;
const RELATED_EXCERPT_CHARS: usize = 120;

pub fn is_article(record: &PageRecord, config: &GenerateConfig) -> bool {
    if config
        .skip_categories
        .iter()
        .any(|skip| *skip == record.category)
    {
        return false;
    }
    config.article_markers.is_empty()
        || config
            .article_markers
            .iter()
            .any(|marker| record.url.contains(marker.as_str()))
}

/// Decides whether a link points at a generated page or stays external.
/// Targets are relative to the `pages/` directory.
pub struct LinkResolver {
    map: LinkMap,
    articles: HashMap<String, String>,
}

impl LinkResolver {
    pub fn new(map: LinkMap, articles: &[&CorpusPage]) -> Self {
        let articles = corpus_entries(articles.iter().copied())
            .into_iter()
            .map(|entry| (entry.from, entry.to))
            .collect();
        Self { map, articles }
    }

    pub fn resolve(&self, url: &str) -> Link {
        if let Some(target) = self.map.lookup(url) {
            return Link::Local(target.to_owned());
        }
        if let Some(mut key) = link_key(url).and_then(|key| url::Url::parse(&key).ok()) {
            let fragment = key.fragment().map(str::to_owned);
            key.set_fragment(None);
            if let Some(file) = self.articles.get(key.as_str()) {
                return Link::Local(match fragment {
                    Some(fragment) => format!("{file}#{fragment}"),
                    None => file.clone(),
                });
            }
        }
        Link::External(url.to_owned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub articles: usize,
    pub categories: usize,
    pub images: usize,
}

/// Renders the static site for one loaded corpus.
pub struct SiteGenerator<'a> {
    config: &'a GenerateConfig,
    cleaner: Cleaner,
    articles: Vec<&'a CorpusPage>,
    by_category: BTreeMap<String, Vec<usize>>,
    resolver: LinkResolver,
}

impl<'a> SiteGenerator<'a> {
    pub fn new(
        config: &'a GenerateConfig,
        pages: &'a [CorpusPage],
        map: LinkMap,
    ) -> anyhow::Result<Self> {
        let cleaner = Cleaner::new(config).context("compile content rules")?;
        let articles: Vec<&CorpusPage> = pages
            .iter()
            .filter(|page| is_article(&page.record, config))
            .collect();

        let mut by_category: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, page) in articles.iter().enumerate() {
            by_category
                .entry(category_of(&page.record))
                .or_default()
                .push(idx);
        }

        let resolver = LinkResolver::new(map, &articles);
        Ok(Self {
            config,
            cleaner,
            articles,
            by_category,
            resolver,
        })
    }

    fn shell(&self) -> Shell<'_> {
        Shell {
            site_name: &self.config.site_name,
            stylesheet: &self.config.stylesheet,
        }
    }

    pub fn write_site(&self, out_dir: &Path, corpus_dir: &Path) -> anyhow::Result<GenerateReport> {
        let pages_dir = out_dir.join(PAGES_DIR);
        std::fs::create_dir_all(&pages_dir)
            .with_context(|| format!("create pages dir: {}", pages_dir.display()))?;

        let mut report = GenerateReport::default();

        write_html(&out_dir.join("index.html"), &self.render_home())?;
        write_html(&pages_dir.join("articles.html"), &self.render_articles_index())?;

        for category in self.by_category.keys() {
            let path = pages_dir.join(format!("cat-{category}.html"));
            write_html(&path, &self.render_category(category))?;
            report.categories += 1;
        }

        let mut images: HashSet<String> = HashSet::new();
        for page in &self.articles {
            let (html, used) = self.render_article(page);
            write_html(&pages_dir.join(format!("{}.html", page.stem)), &html)?;
            images.extend(used);
            report.articles += 1;
        }

        report.images = copy_images(corpus_dir, out_dir, &images)?;
        Ok(report)
    }

    pub fn render_home(&self) -> String {
        let mut cards = String::new();
        for (category, members) in &self.by_category {
            cards.push_str(&format!(
                "        <li><a href=\"pages/cat-{}.html\">{}</a> ({})</li>\n",
                escape_html(category),
                escape_html(&self.config.category_name(category)),
                members.len()
            ));
        }
        let content = format!(
            "  <section class=\"hero\">\n    <div class=\"container\">\n      <h1>{}</h1>\n      \
             <p class=\"hero-description\">{} articles in {} categories.</p>\n    </div>\n  </section>\n  \
             <section class=\"section\">\n    <div class=\"container\">\n      <ul class=\"category-list\">\n{cards}      \
             </ul>\n    </div>\n  </section>\n",
            escape_html(&self.config.site_name),
            self.articles.len(),
            self.by_category.len(),
        );
        self.shell().page(&self.config.site_name, "", &content, 0)
    }

    pub fn render_articles_index(&self) -> String {
        let mut cards = String::new();
        for (category, members) in &self.by_category {
            let count = members.len();
            cards.push_str(&format!(
                "        <a href=\"cat-{}.html\" class=\"category-card\">\n          <h3>{}</h3>\n          \
                 <p>{count} article{}</p>\n        </a>\n",
                escape_html(category),
                escape_html(&self.config.category_name(category)),
                if count == 1 { "" } else { "s" },
            ));
        }
        let content = format!(
            "  <section class=\"section\">\n    <div class=\"container\">\n      <h1>Articles</h1>\n      \
             <div class=\"categories-grid\">\n{cards}      </div>\n    </div>\n  </section>\n"
        );
        self.shell().page("Articles", "", &content, 1)
    }

    pub fn render_category(&self, category: &str) -> String {
        let name = self.config.category_name(category);
        let members = self.by_category.get(category).cloned().unwrap_or_default();

        let mut cards = String::new();
        for idx in &members {
            let page = self.articles[*idx];
            let title = self.title_of(&page.record);
            cards.push_str(&format!(
                "        <a href=\"{}.html\" class=\"article-card\">\n          \
                 <div class=\"article-card-tag\">{}</div>\n          <h3>{}</h3>\n          <p>{}</p>\n        </a>\n",
                escape_html(&page.stem),
                escape_html(&name),
                escape_html(&title),
                escape_html(&self.cleaner.excerpt(&page.record, EXCERPT_CHARS)),
            ));
        }

        let count = members.len();
        let content = format!(
            "  <section class=\"hero\">\n    <div class=\"container\">\n      <h1>{}</h1>\n      \
             <p class=\"hero-description\">{count} article{}.</p>\n      \
             <a href=\"articles.html\" class=\"btn btn-secondary\">&larr; All Categories</a>\n    </div>\n  </section>\n  \
             <section class=\"section\">\n    <div class=\"container\">\n      <div class=\"articles-grid\">\n{cards}      \
             </div>\n    </div>\n  </section>\n",
            escape_html(&name),
            if count == 1 { "" } else { "s" },
        );
        let description = format!("Browse {count} articles about {name}.");
        self.shell().page(&name, &description, &content, 1)
    }

    /// Returns the page markup and the local image files it references.
    pub fn render_article(&self, page: &CorpusPage) -> (String, Vec<String>) {
        let record = &page.record;
        let category = category_of(record);
        let name = self.config.category_name(&category);
        let title = self.title_of(record);

        let (body, images) = self.render_article_body(record);
        let body = if body.trim().is_empty() {
            format!(
                "        <p class=\"empty-notice\">This article's content is being migrated. \
                 Visit the {} to read it now.</p>\n",
                Link::External(record.url.clone()).anchor("original article")
            )
        } else {
            body
        };

        let content = format!(
            "  <section class=\"hero\">\n    <div class=\"container\">\n      \
             <a href=\"cat-{cat}.html\" class=\"hero-badge\">{name}</a>\n      <h1>{title}</h1>\n    </div>\n  </section>\n  \
             <section class=\"section\">\n    <div class=\"container\">\n      <article class=\"article-body\">\n{body}      </article>\n      \
             <div class=\"article-nav-bar\">\n        \
             <a href=\"cat-{cat}.html\" class=\"btn btn-secondary\">&larr; More {name}</a>\n        \
             <a href=\"articles.html\" class=\"btn btn-secondary\">All Categories</a>\n      </div>\n{related}    </div>\n  </section>\n",
            cat = escape_html(&category),
            name = escape_html(&name),
            title = escape_html(&title),
            related = self.render_related(page, &category, &name),
        );

        let mut description = self.cleaner.excerpt(record, EXCERPT_CHARS);
        if description.is_empty() {
            description = record.meta_description.clone();
        }
        (self.shell().page(&title, &description, &content, 1), images)
    }

    fn render_article_body(&self, record: &PageRecord) -> (String, Vec<String>) {
        let classified = self.cleaner.classify_paragraphs(&record.paragraphs);
        let (endnotes, body): (Vec<_>, Vec<_>) = classified
            .into_iter()
            .partition(|p| p.kind == Block::EndNote);

        let images: Vec<(&crate::formats::ImageRecord, &str)> = self
            .cleaner
            .content_images(&record.images)
            .into_iter()
            .filter_map(|image| Some((image, image.local_file.as_deref()?)))
            .collect();
        let mut placements: Vec<(usize, String)> = Vec::new();
        let mut used = Vec::new();
        if body.len() > 2 {
            for (position, (image, local)) in self.config.image_positions.iter().zip(&images) {
                if *position < body.len() {
                    placements.push((*position, render::figure(image, local)));
                    used.push((*local).to_owned());
                }
            }
        }

        let mut html = String::new();
        for (idx, paragraph) in body.iter().enumerate() {
            for (_, figure) in placements.iter().filter(|(pos, _)| *pos == idx) {
                html.push_str(figure);
            }
            let label_len = if paragraph.kind == Block::Question {
                self.cleaner.question_label_len(&paragraph.text)
            } else {
                0
            };
            html.push_str(&render::block(paragraph, label_len));
        }

        for list in &record.lists {
            if let Some(list_html) = self.render_list(list, record) {
                html.push_str(&list_html);
            }
        }

        if !endnotes.is_empty() {
            html.push_str(
                "        <details class=\"endnotes-section\"><summary>End Notes &amp; References</summary>\n",
            );
            for note in &endnotes {
                html.push_str(&render::block(note, 0));
            }
            html.push_str("        </details>\n");
        }

        (html, used)
    }

    /// Skips boilerplate lists and lists that repeat the page navigation.
    fn render_list(&self, items: &[ListItem], record: &PageRecord) -> Option<String> {
        let combined: String = items
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .concat();
        if self.cleaner.is_boilerplate(&combined)
            || items.iter().any(|item| self.cleaner.is_boilerplate(&item.text))
        {
            return None;
        }

        let nav: HashSet<&str> = record.nav_links.iter().map(|l| l.url.as_str()).collect();
        let linked: Vec<&str> = items.iter().filter_map(|i| i.link.as_deref()).collect();
        if !linked.is_empty() && linked.iter().all(|link| nav.contains(link)) {
            return None;
        }

        let mut html = String::from("        <ul class=\"article-list\">\n");
        for item in items {
            let entry = match item.link.as_deref() {
                Some(link) => self.resolver.resolve(link).anchor(&item.text),
                None => escape_html(&item.text),
            };
            html.push_str(&format!("          <li>{entry}</li>\n"));
        }
        html.push_str("        </ul>\n");
        Some(html)
    }

    fn render_related(&self, page: &CorpusPage, category: &str, name: &str) -> String {
        let related: Vec<&CorpusPage> = self
            .by_category
            .get(category)
            .map(|members| {
                members
                    .iter()
                    .map(|idx| self.articles[*idx])
                    .filter(|other| other.stem != page.stem)
                    .take(self.config.related_limit)
                    .collect()
            })
            .unwrap_or_default();
        if related.is_empty() {
            return String::new();
        }

        let mut cards = String::new();
        for other in related {
            cards.push_str(&format!(
                "          <a href=\"{}.html\" class=\"related-card\">\n            \
                 <div class=\"related-card-tag\">{name}</div>\n            <h4>{}</h4>\n            <p>{}</p>\n          </a>\n",
                escape_html(&other.stem),
                escape_html(&self.title_of(&other.record)),
                escape_html(&self.cleaner.excerpt(&other.record, RELATED_EXCERPT_CHARS)),
            ));
        }
        format!(
            "      <div class=\"related-articles\">\n        <h3>More in {name}</h3>\n        \
             <div class=\"related-grid\">\n{cards}        </div>\n      </div>\n"
        )
    }

    fn title_of(&self, record: &PageRecord) -> String {
        let title = self.cleaner.clean_title(&record.title);
        if title.is_empty() {
            "Untitled".to_owned()
        } else {
            title
        }
    }
}

/// Category slug used in `cat-<slug>.html` names and hrefs, restricted to
/// `[A-Za-z0-9_-]` so percent-encoded path segments stay linkable.
fn category_of(record: &PageRecord) -> String {
    let category = record.category.trim();
    if category.is_empty() {
        return "misc".to_owned();
    }
    category
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn write_html(path: &Path, html: &str) -> anyhow::Result<()> {
    std::fs::write(path, html).with_context(|| format!("write html: {}", path.display()))
}

fn copy_images(
    corpus_dir: &Path,
    out_dir: &Path,
    images: &HashSet<String>,
) -> anyhow::Result<usize> {
    if images.is_empty() {
        return Ok(0);
    }
    let from_dir = corpus_dir.join(corpus::IMAGES_DIR);
    let to_dir: PathBuf = out_dir.join(corpus::IMAGES_DIR);
    std::fs::create_dir_all(&to_dir)
        .with_context(|| format!("create images dir: {}", to_dir.display()))?;

    let mut copied = 0;
    for name in images {
        let from = from_dir.join(name);
        if !from.exists() {
            tracing::warn!(image = %from.display(), "referenced image missing from corpus");
            continue;
        }
        std::fs::copy(&from, to_dir.join(name))
            .with_context(|| format!("copy image: {}", from.display()))?;
        copied += 1;
    }
    Ok(copied)
}

pub fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let config = crate::config::load(args.config.as_deref())?.generate;
    let map = match args.link_map.as_deref() {
        Some(path) => LinkMap::load(Path::new(path))?,
        None => LinkMap::default(),
    };
    run_with_config(
        &config,
        Path::new(&args.corpus),
        Path::new(&args.out),
        map,
        args.force,
    )
    .map(|_| ())
}

pub fn run_with_config(
    config: &GenerateConfig,
    corpus_dir: &Path,
    out_dir: &Path,
    map: LinkMap,
    force: bool,
) -> anyhow::Result<GenerateReport> {
    let pages = corpus::load_pages(corpus_dir).context("load corpus")?;
    corpus::ensure_output_dir(out_dir, force).context("check generate output directory")?;

    tracing::info!(
        pages = pages.len(),
        link_map_entries = map.len(),
        out = %out_dir.display(),
        "generate: start"
    );
    let generator = SiteGenerator::new(config, &pages, map)?;
    let report = generator.write_site(out_dir, corpus_dir)?;
    tracing::info!(
        articles = report.articles,
        categories = report.categories,
        images = report.images,
        "generate: complete"
    );
    Ok(report)
}
