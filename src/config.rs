use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub generate: GenerateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub seeds: Vec<String>,
    pub allowed_domains: Vec<String>,
    /// Host substring -> file name prefix for page records.
    pub file_prefixes: BTreeMap<String, String>,
    pub max_pages: usize,
    pub delay_ms: u64,
    pub retry_backoff_ms: u64,
    pub rate_limit_backoff_ms: u64,
    pub timeout_secs: u64,
    pub download_images: bool,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    pub site_name: String,
    pub stylesheet: String,
    pub title_suffixes: Vec<String>,
    pub boilerplate_literals: Vec<String>,
    pub boilerplate_patterns: Vec<String>,
    pub endnote_markers: Vec<String>,
    pub icon_fragments: Vec<String>,
    pub image_positions: Vec<usize>,
    pub min_image_px: u32,
    pub related_limit: usize,
    pub article_markers: Vec<String>,
    pub skip_categories: Vec<String>,
    /// Category slug -> display name.
    pub categories: BTreeMap<String, String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        let joyful = "https://www.joyfulheart.com";
        let jesuswalk = "https://www.jesuswalk.com";
        let mut seeds = vec![format!("{joyful}/")];
        seeds.extend(
            [
                "menu", "about", "contact", "giving", "newsletter", "faq", "jesus", "maturity",
                "encourag", "evang", "church", "communion", "prayer", "scholar", "christmas",
                "easter", "thanksgiving", "pentecost", "stpatrick", "art", "misc",
            ]
            .iter()
            .map(|section| format!("{joyful}/{section}/")),
        );
        seeds.push(format!("{jesuswalk}/"));
        seeds.push(format!("{jesuswalk}/books/"));
        seeds.push(format!("{jesuswalk}/podcast/"));

        Self {
            seeds,
            allowed_domains: strings(&[
                "www.joyfulheart.com",
                "joyfulheart.com",
                "www.jesuswalk.com",
                "jesuswalk.com",
            ]),
            file_prefixes: BTreeMap::from([("jesuswalk".to_owned(), "jw_".to_owned())]),
            max_pages: 250,
            delay_ms: 300,
            retry_backoff_ms: 2000,
            rate_limit_backoff_ms: 1000,
            timeout_secs: 20,
            download_images: true,
            user_agent: "Mozilla/5.0 (compatible; sitemigrate/0.1)".to_owned(),
        }
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            site_name: "Joyful Heart Renewal Ministries".to_owned(),
            stylesheet: "index.css".to_owned(),
            title_suffixes: Vec::new(),
            boilerplate_literals: strings(&[
                "HomeBible StudiesArticles",
                "Bible Studies Articles Books",
                "SearchMenuDonate",
                "About UsFAQContact Us",
                "Site Map",
                "Free E-mail Bible Study",
                "Country(2-letter abbreviation",
                "Preferred FormatHTML",
                "FirstLastE-mail",
                "don't subscribe your friends",
                "never sell, rent, or loan our lists",
                "[X] Close Window",
                "Copyright ©",
                "copyright ©",
                "All rights reserved",
                "Do not put this on a website",
                "See legal, copyright",
                "To be notified about future articles",
                "why don't you subscribe",
                "placing your e-mail address",
            ]),
            boilerplate_patterns: strings(&[
                r"(?i)^contributions\s*to joyful heart",
                r"(?i)^free\s+e-mail\s+bible\s+study",
            ]),
            endnote_markers: strings(&["References and Abbreviations", "End Notes"]),
            icon_fragments: strings(&[
                "search-icon",
                "menu-icon",
                "at_sign",
                "pencil",
                "logo",
                "icon",
                "_head",
                "-head",
                "search_",
                "menu_",
            ]),
            image_positions: vec![2, 6, 12],
            min_image_px: 50,
            related_limit: 3,
            article_markers: strings(&[".htm"]),
            skip_categories: strings(&["home", "menu", "search", "admin"]),
            categories: BTreeMap::new(),
        }
    }
}

impl GenerateConfig {
    pub fn category_name(&self, category: &str) -> String {
        if let Some(name) = self.categories.get(category) {
            return name.clone();
        }
        let mut chars = category.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => "Miscellany".to_owned(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

/// Loads the YAML config at `path`, or the built-in defaults when `path` is `None`.
pub fn load(path: Option<&str>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let path = Path::new(path);
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&yaml)
        .with_context(|| format!("parse config: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_keys() -> anyhow::Result<()> {
        let config: Config = serde_yaml::from_str(
            "crawl:\n  seeds: [\"https://example.test/\"]\n  allowed_domains: [example.test]\n",
        )?;
        assert_eq!(config.crawl.seeds, vec!["https://example.test/".to_owned()]);
        assert_eq!(config.crawl.max_pages, 250);
        assert_eq!(config.generate.image_positions, vec![2, 6, 12]);
        Ok(())
    }

    #[test]
    fn category_name_falls_back_to_capitalized_slug() {
        let mut config = GenerateConfig::default();
        config
            .categories
            .insert("evang".to_owned(), "Good News & Evangelism".to_owned());
        assert_eq!(config.category_name("evang"), "Good News & Evangelism");
        assert_eq!(config.category_name("prayer"), "Prayer");
    }
}
