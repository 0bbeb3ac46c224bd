//! Plain-text extraction for the text corpus
//!
//! Changed documents can be mirrored as plain text, one file per URL, for
//! downstream tokenization and indexing.

use scraper::{ElementRef, Html, Node};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Elements whose text is never part of the document text
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new line
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Extracts readable text from an HTML body
///
/// Script and style content is dropped, block-level elements become line
/// breaks, runs of horizontal whitespace collapse to one space and at most
/// one blank line separates paragraphs. Invalid UTF-8 is replaced.
pub fn extract_text(body: &[u8]) -> String {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    let mut raw = String::with_capacity(html.len() / 2);
    collect_text(document.root_element(), &mut raw);

    tidy(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }

                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                } else if name == "td" || name == "th" {
                    out.push(' ');
                }

                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }

                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn tidy(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut blank_run = 0usize;

    for line in raw.lines() {
        let collapsed = line
            .split(|c: char| c.is_whitespace() || c == '\u{a0}')
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }

        if !text.is_empty() {
            text.push('\n');
            if blank_run > 0 {
                text.push('\n');
            }
        }
        text.push_str(&collapsed);
        blank_run = 0;
    }

    text
}

/// Writes extracted text of changed documents into a directory
///
/// File names are the hex SHA-256 of the normalized URL, so a recrawl of the
/// same URL overwrites its previous text.
#[derive(Debug, Clone)]
pub struct TextSink {
    dir: PathBuf,
    min_chars: usize,
}

impl TextSink {
    /// Creates the sink, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>, min_chars: usize) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, min_chars })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the text file for a normalized URL
    pub fn path_for(&self, normalized_url: &str) -> PathBuf {
        let name = hex::encode(Sha256::digest(normalized_url.as_bytes()));
        self.dir.join(format!("{}.txt", name))
    }

    /// Extracts and writes the text of `body`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(path))` - The text was written to `path`
    /// * `Ok(None)` - The text was shorter than the configured minimum
    pub fn write(&self, normalized_url: &str, body: &[u8]) -> io::Result<Option<PathBuf>> {
        let text = extract_text(body);
        if text.chars().count() < self.min_chars {
            return Ok(None);
        }

        let path = self.path_for(normalized_url);
        std::fs::write(&path, text)?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_drops_markup_and_scripts() {
        let html = br#"<html><head><title>T</title><style>p { color: red }</style></head>
            <body><script>var x = 1;</script><p>Hello <b>bold</b> world</p></body></html>"#;

        assert_eq!(extract_text(html), "Hello bold world");
    }

    #[test]
    fn test_extract_text_block_breaks() {
        let html = b"<body><h1>Title</h1><p>First para.</p><p>Second<br>line</p><ul><li>a</li><li>b</li></ul></body>";
        assert_eq!(
            extract_text(html),
            "Title\n\nFirst para.\n\nSecond\nline\n\na\n\nb"
        );
    }

    #[test]
    fn test_extract_text_collapses_whitespace() {
        let html = "<div>  lots \t of\u{a0}\u{a0}space  </div>\n\n\n\n<div>next</div>".as_bytes();
        assert_eq!(extract_text(html), "lots of space\n\nnext");
    }

    #[test]
    fn test_extract_text_handles_invalid_utf8() {
        let mut html = b"<p>caf".to_vec();
        html.push(0xff);
        html.extend_from_slice(b"</p>");
        assert_eq!(extract_text(&html), "caf\u{fffd}");
    }

    #[test]
    fn test_extract_text_plain_input() {
        assert_eq!(extract_text(b""), "");
        assert_eq!(extract_text(b"just text"), "just text");
    }

    #[test]
    fn test_sink_respects_min_chars() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TextSink::new(dir.path().join("docs"), 10).unwrap();

        assert!(sink.dir().is_dir());
        assert_eq!(sink.write("http://example.com/", b"<p>short</p>").unwrap(), None);

        let path = sink
            .write("http://example.com/", b"<p>long enough text</p>")
            .unwrap()
            .expect("text should be written");
        assert_eq!(path, sink.path_for("http://example.com/"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "long enough text");
    }

    #[test]
    fn test_sink_file_names_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TextSink::new(dir.path(), 0).unwrap();

        let a = sink.path_for("http://example.com/a");
        assert_eq!(a, sink.path_for("http://example.com/a"));
        assert_ne!(a, sink.path_for("http://example.com/b"));
        assert_eq!(a.extension().unwrap(), "txt");
        assert_eq!(a.file_stem().unwrap().len(), 64);
    }
}
