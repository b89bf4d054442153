use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    pub category: String,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub lists: Vec<Vec<ListItem>>,
    pub quotes: Vec<String>,
    pub images: Vec<ImageRecord>,
    pub internal_links: Vec<LinkRecord>,
    pub nav_links: Vec<LinkRecord>,
    pub tables: Vec<Vec<Vec<TableCell>>>,
    pub body_text: String,
    pub scraped_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListItem {
    pub text: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRecord {
    pub src: String,
    pub alt: String,
    pub local_file: Option<String>,
    #[serde(deserialize_with = "lenient_dimension")]
    pub width: Option<u32>,
    #[serde(deserialize_with = "lenient_dimension")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRecord {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCell {
    pub text: String,
    pub has_image: bool,
    pub has_link: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub title: String,
    pub category: String,
    pub heading_count: usize,
    pub paragraph_count: usize,
    pub image_count: usize,
    pub internal_link_count: usize,
}

impl SitemapEntry {
    pub fn for_record(record: &PageRecord) -> Self {
        Self {
            title: record.title.clone(),
            category: record.category.clone(),
            heading_count: record.headings.len(),
            paragraph_count: record.paragraphs.len(),
            image_count: record.images.len(),
            internal_link_count: record.internal_links.len(),
        }
    }
}

pub type Sitemap = BTreeMap<String, SitemapEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUrl {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub scraped_at: String,
    pub total_pages: usize,
    pub total_failed: usize,
    pub total_images: usize,
    pub elapsed_seconds: f64,
    pub domains: Vec<String>,
    pub categories: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMapFile {
    #[serde(default)]
    pub entries: Vec<LinkMapEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMapEntry {
    pub from: String,
    pub to: String,
}

/// Accepts `120`, `"120"`, `"120px"`, `""` and `null`; anything unparseable is `None`.
fn lenient_dimension<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Raw::Number(n)) if n.is_finite() && n >= 0.0 => Some(n as u32),
        Some(Raw::Number(_)) => None,
        Some(Raw::Text(text)) => {
            let digits: String = text
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        None => None,
    })
}
