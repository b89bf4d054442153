use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::formats::{Heading, ImageRecord, LinkRecord, ListItem, PageRecord, TableCell};
use crate::scope::{CrawlScope, category_for, normalize};

const MIN_PARAGRAPH_CHARS: usize = 20;
const BODY_TEXT_MAX_CHARS: usize = 5000;
const IGNORED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

struct Selectors {
    title: Selector,
    meta: Selector,
    headings: Selector,
    paragraphs: Selector,
    lists: Selector,
    blockquotes: Selector,
    images: Selector,
    anchors: Selector,
    nav: Selector,
    classed_ul: Selector,
    tables: Selector,
    rows: Selector,
    body: Selector,
}

impl Selectors {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            title: parse_selector("title")?,
            meta: parse_selector("meta[name]")?,
            headings: parse_selector("h1, h2, h3, h4, h5, h6")?,
            paragraphs: parse_selector("p")?,
            lists: parse_selector("ul, ol")?,
            blockquotes: parse_selector("blockquote")?,
            images: parse_selector("img")?,
            anchors: parse_selector("a[href]")?,
            nav: parse_selector("nav")?,
            classed_ul: parse_selector("ul[class]")?,
            tables: parse_selector("table")?,
            rows: parse_selector("tr")?,
            body: parse_selector("body")?,
        })
    }
}

fn parse_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("parse selector {css:?}: {err:?}"))
}

/// Turns fetched HTML into a [`PageRecord`]. Image `local_file` is left empty;
/// the crawler fills it after downloading.
pub struct Extractor {
    selectors: Selectors,
    scope: CrawlScope,
}

impl Extractor {
    pub fn new(scope: CrawlScope) -> anyhow::Result<Self> {
        Ok(Self {
            selectors: Selectors::new()?,
            scope,
        })
    }

    pub fn extract(&self, html: &str, url: &Url) -> PageRecord {
        let document = Html::parse_document(html);
        self.extract_document(&document, url)
    }

    pub fn extract_document(&self, document: &Html, url: &Url) -> PageRecord {
        let s = &self.selectors;

        let title = document
            .select(&s.title)
            .next()
            .map(inline_text)
            .unwrap_or_default();

        let meta_description = document
            .select(&s.meta)
            .find(|meta| {
                meta.value()
                    .attr("name")
                    .is_some_and(|name| name.eq_ignore_ascii_case("description"))
            })
            .and_then(|meta| meta.value().attr("content"))
            .map(|content| content.trim().to_owned())
            .unwrap_or_default();

        let headings = document
            .select(&s.headings)
            .filter_map(|h| {
                let text = inline_text(h);
                if text.is_empty() {
                    return None;
                }
                let level = h.value().name()[1..].parse().unwrap_or(1);
                Some(Heading { level, text })
            })
            .collect();

        let paragraphs = document
            .select(&s.paragraphs)
            .map(inline_text)
            .filter(|text| text.chars().count() > MIN_PARAGRAPH_CHARS)
            .collect();

        let lists = document
            .select(&s.lists)
            .filter_map(|list| {
                let items: Vec<ListItem> = list
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| child.value().name() == "li")
                    .filter_map(|li| {
                        let text = inline_text(li);
                        if text.is_empty() {
                            return None;
                        }
                        let link = li
                            .select(&s.anchors)
                            .next()
                            .and_then(|a| a.value().attr("href"))
                            .and_then(|href| url.join(href.trim()).ok())
                            .map(String::from);
                        Some(ListItem { text, link })
                    })
                    .collect();
                (!items.is_empty()).then_some(items)
            })
            .collect();

        let quotes = document
            .select(&s.blockquotes)
            .map(inline_text)
            .filter(|text| !text.is_empty())
            .collect();

        let images = document
            .select(&s.images)
            .filter_map(|img| {
                let src = img.value().attr("src")?.trim();
                if src.is_empty() || src.starts_with("data:") {
                    return None;
                }
                let full = url.join(src).ok()?;
                Some(ImageRecord {
                    src: full.to_string(),
                    alt: img.value().attr("alt").unwrap_or_default().trim().to_owned(),
                    local_file: None,
                    width: img.value().attr("width").and_then(parse_dimension),
                    height: img.value().attr("height").and_then(parse_dimension),
                })
            })
            .collect();

        let internal_links = document
            .select(&s.anchors)
            .filter_map(|a| {
                let target = url.join(a.value().attr("href")?.trim()).ok()?;
                self.scope.is_allowed_host(&target).then(|| LinkRecord {
                    text: inline_text(a),
                    url: target.to_string(),
                })
            })
            .collect();

        let nav_root = document.select(&s.nav).next().or_else(|| {
            document.select(&s.classed_ul).find(|ul| {
                ul.value().attr("class").is_some_and(|class| {
                    let class = class.to_ascii_lowercase();
                    class.contains("nav") || class.contains("menu")
                })
            })
        });
        let nav_links = nav_root
            .map(|nav| {
                nav.select(&s.anchors)
                    .filter_map(|a| {
                        let target = url.join(a.value().attr("href")?.trim()).ok()?;
                        Some(LinkRecord {
                            text: inline_text(a),
                            url: target.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let tables = document
            .select(&s.tables)
            .filter_map(|table| {
                let rows: Vec<Vec<TableCell>> = table
                    .select(&s.rows)
                    .filter_map(|tr| {
                        let cells: Vec<TableCell> = tr
                            .children()
                            .filter_map(ElementRef::wrap)
                            .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                            .map(|cell| TableCell {
                                text: inline_text(cell),
                                has_image: cell.select(&s.images).next().is_some(),
                                has_link: cell.select(&s.anchors).next().is_some(),
                            })
                            .collect();
                        (!cells.is_empty()).then_some(cells)
                    })
                    .collect();
                (!rows.is_empty()).then_some(rows)
            })
            .collect();

        let body_text = document
            .select(&s.body)
            .next()
            .map(block_text)
            .map(|text| truncate_chars(&text, BODY_TEXT_MAX_CHARS))
            .unwrap_or_default();

        PageRecord {
            url: url.to_string(),
            title,
            meta_description,
            category: category_for(url),
            headings,
            paragraphs,
            lists,
            quotes,
            images,
            internal_links,
            nav_links,
            tables,
            body_text,
            scraped_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// In-scope links of a page, normalized, deduplicated, in document order.
    pub fn discover_links(&self, document: &Html, base: &Url) -> Vec<Url> {
        let mut links: Vec<Url> = Vec::new();
        for anchor in document.select(&self.selectors.anchors) {
            let Some(href) = anchor.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            let Ok(target) = base.join(href) else {
                continue;
            };
            let target = normalize(&target);
            if self.scope.is_crawlable(&target) && !links.contains(&target) {
                links.push(target);
            }
        }
        links
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let text: &str = text;
            out.push(text.to_owned());
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if IGNORED_ELEMENTS.contains(&name) {
                continue;
            }
            if name == "br" {
                out.push("\n".to_owned());
                continue;
            }
            collect_text(child, out);
        }
    }
}

/// Element text with whitespace runs collapsed to single spaces.
fn inline_text(element: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();
    collect_text(element, &mut pieces);
    pieces.concat().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Element text as trimmed, non-empty lines.
fn block_text(element: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();
    collect_text(element, &mut pieces);
    pieces
        .iter()
        .map(|piece| piece.trim())
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_dimension(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(CrawlScope::new(["example.test"], BTreeMap::new())).expect("extractor")
    }

    fn page_url() -> Url {
        Url::parse("https://example.test/prayer/answered.htm").expect("valid url")
    }

    #[test]
    fn keeps_only_non_trivial_paragraphs() {
        let html = r#"<html><body>
            <h1>Answered Prayer</h1>
            <p>Short</p>
            <p>This paragraph is exactly long enough to be kept, ok.</p>
        </body></html>"#;

        let record = extractor().extract(html, &page_url());

        assert_eq!(record.headings.len(), 1);
        assert_eq!(record.headings[0].level, 1);
        assert_eq!(record.headings[0].text, "Answered Prayer");
        assert_eq!(
            record.paragraphs,
            vec!["This paragraph is exactly long enough to be kept, ok.".to_owned()]
        );
        assert_eq!(record.category, "prayer");
    }

    #[test]
    fn script_and_style_text_is_ignored() {
        let html = r#"<html><head><title> Title </title><style>p { color: red; }</style></head><body>
            <p>Visible words that are long enough <script>var hidden = "script text";</script>to keep.</p>
            <noscript>Enable JavaScript please</noscript>
        </body></html>"#;

        let record = extractor().extract(html, &page_url());

        assert_eq!(record.title, "Title");
        assert_eq!(
            record.paragraphs,
            vec!["Visible words that are long enough to keep.".to_owned()]
        );
        assert!(!record.body_text.contains("hidden"));
        assert!(!record.body_text.contains("Enable JavaScript"));
    }

    #[test]
    fn images_skip_inline_data_and_resolve_relative_sources() {
        let html = r#"<body>
            <img src="data:image/png;base64,AAAA" alt="inline">
            <img src="" alt="empty">
            <img src="../images/cross.jpg" alt="Cross" width="240" height="180px">
        </body>"#;

        let record = extractor().extract(html, &page_url());

        assert_eq!(record.images.len(), 1);
        let image = &record.images[0];
        assert_eq!(image.src, "https://example.test/images/cross.jpg");
        assert_eq!(image.alt, "Cross");
        assert_eq!(image.width, Some(240));
        assert_eq!(image.height, Some(180));
        assert_eq!(image.local_file, None);
    }

    #[test]
    fn lists_links_tables_and_navigation() {
        let html = r##"<body>
            <nav><a href="/">Home</a><a href="/about/">About</a></nav>
            <ul><li><a href="study.htm">A study</a></li><li></li><li>Plain item</li></ul>
            <blockquote>Be still, and know</blockquote>
            <table><tr><td><img src="x.gif">Cell</td><th><a href="#top">Top</a></th></tr></table>
            <a href="https://elsewhere.test/page">External</a>
            <meta name="Description" content=" ignored in body ">
        </body>"##;

        let record = extractor().extract(html, &page_url());

        assert_eq!(record.nav_links.len(), 2);
        assert_eq!(record.nav_links[1].url, "https://example.test/about/");

        assert_eq!(record.lists.len(), 1);
        assert_eq!(record.lists[0].len(), 2);
        assert_eq!(
            record.lists[0][0].link.as_deref(),
            Some("https://example.test/prayer/study.htm")
        );
        assert_eq!(record.lists[0][1].link, None);

        assert_eq!(record.quotes, vec!["Be still, and know".to_owned()]);

        assert_eq!(record.tables.len(), 1);
        let row = &record.tables[0][0];
        assert_eq!(row.len(), 2);
        assert!(row[0].has_image && !row[0].has_link);
        assert!(row[1].has_link);

        assert!(
            record
                .internal_links
                .iter()
                .all(|link| link.url.starts_with("https://example.test/"))
        );
        assert!(
            !record
                .internal_links
                .iter()
                .any(|link| link.url.contains("elsewhere"))
        );
    }

    #[test]
    fn discover_links_normalizes_and_filters() {
        let html = r##"<body>
            <a href="/about/">About</a>
            <a href="/about#team">About again</a>
            <a href="#top">Top</a>
            <a href="mailto:x@example.test">Mail</a>
            <a href="/files/report.pdf">PDF</a>
            <a href="https://other.test/">Other</a>
            <a href="contact">Contact</a>
        </body>"##;

        let extractor = extractor();
        let document = Html::parse_document(html);
        let links = extractor.discover_links(&document, &page_url());
        let links: Vec<String> = links.into_iter().map(String::from).collect();

        assert_eq!(
            links,
            vec![
                "https://example.test/about".to_owned(),
                "https://example.test/prayer/contact".to_owned(),
            ]
        );
    }

    #[test]
    fn body_text_is_truncated_on_char_boundary() {
        let long = "é".repeat(6000);
        let html = format!("<body><div>{long}</div></body>");
        let record = extractor().extract(&html, &page_url());
        assert_eq!(record.body_text.chars().count(), 5000);
    }
}
