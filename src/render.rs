use crate::clean::{Block, ClassifiedParagraph};
use crate::formats::ImageRecord;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Relative prefix from a page `depth` directories below the site root.
pub fn root_prefix(depth: usize) -> String {
    "../".repeat(depth)
}

/// Fixed page chrome shared by every generated page.
pub struct Shell<'a> {
    pub site_name: &'a str,
    pub stylesheet: &'a str,
}

impl Shell<'_> {
    pub fn page(&self, title: &str, description: &str, content: &str, depth: usize) -> String {
        let root = root_prefix(depth);
        let description = if description.trim().is_empty() {
            format!("{title} | {}", self.site_name)
        } else {
            description.to_owned()
        };
        let description: String = description.chars().take(160).collect();

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("  <meta charset=\"UTF-8\">\n");
        html.push_str(
            "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
        );
        html.push_str(&format!(
            "  <title>{} | {}</title>\n",
            escape_html(title),
            escape_html(self.site_name)
        ));
        html.push_str(&format!(
            "  <meta name=\"description\" content=\"{}\">\n",
            escape_html(&description)
        ));
        html.push_str(&format!(
            "  <link rel=\"stylesheet\" href=\"{root}{}\">\n",
            escape_html(self.stylesheet)
        ));
        html.push_str("</head>\n<body>\n");
        html.push_str(&self.nav(&root));
        html.push_str(content);
        html.push_str(&self.footer(&root));
        html.push_str("</body>\n</html>\n");
        html
    }

    fn nav(&self, root: &str) -> String {
        format!(
            "  <nav class=\"navbar\">\n    <div class=\"container\">\n      \
             <a href=\"{root}index.html\" class=\"nav-logo\">{site}</a>\n      \
             <ul class=\"nav-links\">\n        \
             <li><a href=\"{root}index.html\">Home</a></li>\n        \
             <li><a href=\"{root}pages/articles.html\">Articles</a></li>\n      \
             </ul>\n    </div>\n  </nav>\n",
            site = escape_html(self.site_name),
        )
    }

    fn footer(&self, root: &str) -> String {
        format!(
            "  <footer class=\"footer\">\n    <div class=\"container\">\n      \
             <p>{site}</p>\n      \
             <ul class=\"footer-links\"><li><a href=\"{root}pages/articles.html\">All Categories</a></li></ul>\n    \
             </div>\n  </footer>\n",
            site = escape_html(self.site_name),
        )
    }
}

/// A rendered link target, decided by the link resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    Local(String),
    External(String),
}

impl Link {
    pub fn anchor(&self, text: &str) -> String {
        match self {
            Self::Local(href) => format!("<a href=\"{}\">{}</a>", escape_html(href), escape_html(text)),
            Self::External(href) => format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a>",
                escape_html(href),
                escape_html(text)
            ),
        }
    }
}

pub fn figure(image: &ImageRecord, local_file: &str) -> String {
    let alt = if image.alt.trim().is_empty() {
        "Article illustration"
    } else {
        image.alt.trim()
    };
    let caption = if image.alt.trim().is_empty() {
        String::new()
    } else {
        format!("\n          <figcaption>{}</figcaption>", escape_html(alt))
    };
    format!(
        "        <figure class=\"article-figure\">\n          \
         <img src=\"../images/{}\" alt=\"{}\" loading=\"lazy\">{caption}\n        </figure>\n",
        escape_html(local_file),
        escape_html(alt)
    )
}

/// Body block markup. `label_len` is the byte length of a question's label.
pub fn block(paragraph: &ClassifiedParagraph, label_len: usize) -> String {
    let text = &paragraph.text;
    match paragraph.kind {
        Block::Scripture => format!(
            "        <blockquote class=\"scripture-quote\">{}</blockquote>\n",
            escape_html(text)
        ),
        Block::Question => {
            let (label, rest) = text.split_at(label_len.min(text.len()));
            format!(
                "        <div class=\"discussion-question\"><strong>{}</strong>{}</div>\n",
                escape_html(label),
                escape_html(rest)
            )
        }
        Block::EndNote => format!("          <p class=\"endnote\">{}</p>\n", escape_html(text)),
        Block::Paragraph => format!("        <p>{}</p>\n", escape_html(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_and_quotes() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn shell_links_are_relative_to_depth() {
        let shell = Shell {
            site_name: "Joyful Heart",
            stylesheet: "index.css",
        };
        let nested = shell.page("Prayer", "", "<main></main>\n", 1);
        assert!(nested.contains("href=\"../index.css\""));
        assert!(nested.contains("href=\"../pages/articles.html\""));
        assert!(nested.contains("<title>Prayer | Joyful Heart</title>"));
        assert!(nested.contains("content=\"Prayer | Joyful Heart\""));

        let root = shell.page("Home", "Welcome", "", 0);
        assert!(root.contains("href=\"index.css\""));
        assert!(root.contains("href=\"pages/articles.html\""));
    }

    #[test]
    fn external_links_open_in_new_tab() {
        let external = Link::External("https://x.test/a?b=1&c=2".to_owned()).anchor("A & B");
        assert_eq!(
            external,
            "<a href=\"https://x.test/a?b=1&amp;c=2\" target=\"_blank\" rel=\"noopener\">A &amp; B</a>"
        );
        assert_eq!(
            Link::Local("acts.html#intro".to_owned()).anchor("Acts"),
            "<a href=\"acts.html#intro\">Acts</a>"
        );
    }

    #[test]
    fn question_label_is_bold() {
        let paragraph = ClassifiedParagraph {
            kind: Block::Question,
            text: "Question 2. Why did Jesus weep?".to_owned(),
        };
        assert_eq!(
            block(&paragraph, "Question 2".len()),
            "        <div class=\"discussion-question\"><strong>Question 2</strong>. Why did Jesus weep?</div>\n"
        );
    }
}
