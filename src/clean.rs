use anyhow::Context as _;
use regex::Regex;

use crate::config::GenerateConfig;
use crate::formats::{ImageRecord, PageRecord};

const MIN_CLEAN_PARAGRAPH_CHARS: usize = 15;
const MAX_QUOTE_CHARS: usize = 500;
const TRAILING_ENDNOTE_CHARS: usize = 100;
const LARGE_IMAGE_PX: u32 = 100;

const BIBLE_BOOKS: &str = r"\b(Genesis|Exodus|Leviticus|Numbers|Deuteronomy|Joshua|Judges|Ruth|Samuel|Kings|Chronicles|Ezra|Nehemiah|Esther|Job|Psalms?|Proverbs|Ecclesiastes|Song|Isaiah|Jeremiah|Lamentations|Ezekiel|Daniel|Hosea|Joel|Amos|Obadiah|Jonah|Micah|Nahum|Habakkuk|Zephaniah|Haggai|Zechariah|Malachi|Matthew|Mark|Luke|John|Acts|Romans|Corinthians|Galatians|Ephesians|Philippians|Colossians|Thessalonians|Timothy|Titus|Philemon|Hebrews|James|Peter|Jude|Revelation)\b";

const OPEN_QUOTES: &[char] = &['"', '\u{201c}', '\u{2018}', '\''];
const CLOSE_QUOTES: &[char] = &['"', '\u{201d}', '\u{2019}', '\'', ')'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Paragraph,
    Scripture,
    Question,
    EndNote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedParagraph {
    pub kind: Block,
    pub text: String,
}

/// Content-cleaning rules compiled from the generator configuration.
pub struct Cleaner {
    literals: Vec<String>,
    patterns: Vec<Regex>,
    endnote_markers: Vec<String>,
    icon_fragments: Vec<String>,
    title_suffixes: Vec<String>,
    min_image_px: u32,
    bible_books: Regex,
    numbered_note: Regex,
    question: Regex,
}

impl Cleaner {
    pub fn new(config: &GenerateConfig) -> anyhow::Result<Self> {
        let patterns = config
            .boilerplate_patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid boilerplate pattern: {p}")))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            literals: config.boilerplate_literals.clone(),
            patterns,
            endnote_markers: config.endnote_markers.clone(),
            icon_fragments: config
                .icon_fragments
                .iter()
                .map(|f| f.to_ascii_lowercase())
                .collect(),
            title_suffixes: config.title_suffixes.clone(),
            min_image_px: config.min_image_px,
            bible_books: Regex::new(BIBLE_BOOKS).context("compile bible book pattern")?,
            numbered_note: Regex::new(r"^\[\d+\]").context("compile endnote pattern")?,
            question: Regex::new(r"^(Question|Q)\s*\d+").context("compile question pattern")?,
        })
    }

    pub fn is_boilerplate(&self, text: &str) -> bool {
        self.literals.iter().any(|literal| text.contains(literal.as_str()))
            || self.patterns.iter().any(|pattern| pattern.is_match(text))
    }

    pub fn is_endnote(&self, text: &str) -> bool {
        let text = text.trim();
        self.numbered_note.is_match(text)
            || self
                .endnote_markers
                .iter()
                .any(|marker| text.starts_with(marker.as_str()))
    }

    pub fn is_scripture(&self, text: &str) -> bool {
        let text = text.trim();
        if !text.starts_with(OPEN_QUOTES) {
            return false;
        }
        self.bible_books.is_match(text)
            || (text.chars().count() < MAX_QUOTE_CHARS && text.ends_with(CLOSE_QUOTES))
    }

    pub fn is_question(&self, text: &str) -> bool {
        self.question.is_match(text.trim())
    }

    /// Byte length of the leading `Question N` label, 0 if there is none.
    pub fn question_label_len(&self, text: &str) -> usize {
        self.question.find(text).map_or(0, |m| m.end())
    }

    /// Drops boilerplate and fragments, then tags each paragraph. Once an
    /// end-note marker is seen, only short or bracketed paragraphs survive,
    /// all as end-notes.
    pub fn classify_paragraphs(&self, paragraphs: &[String]) -> Vec<ClassifiedParagraph> {
        let mut out = Vec::new();
        let mut in_endnotes = false;

        for raw in paragraphs {
            if self.is_boilerplate(raw) {
                tracing::debug!(text = %raw, "dropping boilerplate paragraph");
                continue;
            }
            let text = clean_paragraph(raw);
            if text.chars().count() < MIN_CLEAN_PARAGRAPH_CHARS {
                continue;
            }

            if self.is_endnote(&text) {
                in_endnotes = true;
                out.push(ClassifiedParagraph {
                    kind: Block::EndNote,
                    text,
                });
                continue;
            }
            if in_endnotes {
                if text.starts_with('[') || text.chars().count() < TRAILING_ENDNOTE_CHARS {
                    out.push(ClassifiedParagraph {
                        kind: Block::EndNote,
                        text,
                    });
                }
                continue;
            }

            let kind = if self.is_scripture(&text) {
                Block::Scripture
            } else if self.is_question(&text) {
                Block::Question
            } else {
                Block::Paragraph
            };
            out.push(ClassifiedParagraph { kind, text });
        }

        out
    }

    /// First body paragraph longer than 40 chars, cut at a word boundary.
    pub fn excerpt(&self, record: &PageRecord, max_chars: usize) -> String {
        self.classify_paragraphs(&record.paragraphs)
            .into_iter()
            .find(|p| p.kind == Block::Paragraph && p.text.chars().count() > 40)
            .map(|p| truncate_words(&p.text, max_chars))
            .unwrap_or_default()
    }

    pub fn clean_title(&self, raw: &str) -> String {
        let mut title = raw.trim().to_owned();
        for suffix in &self.title_suffixes {
            title = title.replace(suffix.as_str(), "");
        }
        title.trim().to_owned()
    }

    /// Images worth showing in an article body: not tiny, not chrome.
    pub fn content_images<'a>(&self, images: &'a [ImageRecord]) -> Vec<&'a ImageRecord> {
        images
            .iter()
            .filter(|image| {
                let too_small =
                    |dim: Option<u32>| dim.is_some_and(|px| px > 0 && px < self.min_image_px);
                if too_small(image.width) || too_small(image.height) {
                    return false;
                }

                let src = image.src.to_ascii_lowercase();
                let local = image
                    .local_file
                    .as_deref()
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if self
                    .icon_fragments
                    .iter()
                    .any(|f| src.contains(f.as_str()) || local.contains(f.as_str()))
                {
                    return false;
                }

                if image.alt.trim().is_empty() {
                    let small = |dim: Option<u32>| dim.unwrap_or(0) < LARGE_IMAGE_PX;
                    if small(image.width) || small(image.height) {
                        return false;
                    }
                }
                true
            })
            .collect()
    }
}

pub fn clean_paragraph(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let cut = match cut.rsplit_once(' ') {
        Some((head, _)) => head.to_owned(),
        None => cut,
    };
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> Cleaner {
        Cleaner::new(&GenerateConfig::default()).expect("default config compiles")
    }

    fn paragraphs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_owned()).collect()
    }

    #[test]
    fn boilerplate_and_fragments_are_dropped() {
        let out = cleaner().classify_paragraphs(&paragraphs(&[
            "HomeBible StudiesArticlesBooks",
            "Copyright © 2004, Ralph F. Wilson. All rights reserved.",
            "Too short",
            "Jesus met a woman at the well in the heat of the day.",
        ]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, Block::Paragraph);
    }

    #[test]
    fn classification_precedence() {
        let out = cleaner().classify_paragraphs(&paragraphs(&[
            "\"For God so loved the world...\" (John 3:16)",
            "\u{201c}Be still, and know that I am God.\u{201d}",
            "Question 1. What does this passage teach about grace?",
            "Q3: How would you explain this to a friend?",
            "Paul writes to the church at Philippi from prison.",
        ]));
        let kinds: Vec<Block> = out.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                Block::Scripture,
                Block::Scripture,
                Block::Question,
                Block::Question,
                Block::Paragraph
            ]
        );
    }

    #[test]
    fn everything_after_endnote_marker_is_endnote_or_dropped() {
        let long_tail = "This trailing paragraph is long enough that it must be site chrome rather than a footnote at the end of the article text.";
        let out = cleaner().classify_paragraphs(&paragraphs(&[
            "An ordinary body paragraph of the article.",
            "End Notes and references follow",
            "[1] Bauer, Greek-English Lexicon, p. 12.",
            "Short closing note text",
            long_tail,
        ]));
        let kinds: Vec<Block> = out.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                Block::Paragraph,
                Block::EndNote,
                Block::EndNote,
                Block::EndNote
            ]
        );
        assert!(!out.iter().any(|p| p.text == long_tail));
    }

    #[test]
    fn question_label_length() {
        let cleaner = cleaner();
        assert_eq!(cleaner.question_label_len("Question 12. Why?"), "Question 12".len());
        assert_eq!(cleaner.question_label_len("No label here"), 0);
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(
            clean_paragraph("Line one\r\n\tline   two\n\nthree"),
            "Line one line two three"
        );
    }

    #[test]
    fn content_images_filter_icons_and_tiny_images() {
        let image = |src: &str, alt: &str, w: Option<u32>, h: Option<u32>| ImageRecord {
            src: src.to_owned(),
            alt: alt.to_owned(),
            local_file: Some(src.rsplit('/').next().unwrap_or_default().to_owned()),
            width: w,
            height: h,
        };
        let images = vec![
            image("https://x.test/search-icon.gif", "Search", Some(20), Some(20)),
            image("https://x.test/spacer.gif", "Spacer", Some(10), Some(300)),
            image("https://x.test/site-logo.png", "Joyful Heart", Some(300), Some(100)),
            image("https://x.test/unlabeled.jpg", "", Some(80), Some(80)),
            image("https://x.test/shepherd.jpg", "The Good Shepherd", Some(400), Some(300)),
            image("https://x.test/unknown-size.jpg", "Cross", None, None),
        ];

        let kept: Vec<&str> = cleaner()
            .content_images(&images)
            .into_iter()
            .map(|i| i.src.as_str())
            .collect();

        assert_eq!(
            kept,
            vec!["https://x.test/shepherd.jpg", "https://x.test/unknown-size.jpg"]
        );
    }

    #[test]
    fn excerpt_cuts_at_word_boundary() {
        let record = PageRecord {
            paragraphs: paragraphs(&[
                "\"Scripture that should not be used as an excerpt.\" (Luke 2:1)",
                "The shepherds were keeping watch over their flocks by night in the fields.",
            ]),
            ..PageRecord::default()
        };
        assert_eq!(cleaner().excerpt(&record, 30), "The shepherds were keeping...");
    }

    #[test]
    fn title_suffixes_come_from_config() -> anyhow::Result<()> {
        let config = GenerateConfig {
            title_suffixes: vec![" - Christian Articles Archive".to_owned()],
            ..GenerateConfig::default()
        };
        let cleaner = Cleaner::new(&config)?;
        assert_eq!(
            cleaner.clean_title(" Born in Bethlehem - Christian Articles Archive "),
            "Born in Bethlehem"
        );
        Ok(())
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let config = GenerateConfig {
            boilerplate_patterns: vec!["(unclosed".to_owned()],
            ..GenerateConfig::default()
        };
        assert!(Cleaner::new(&config).is_err());
    }
}
