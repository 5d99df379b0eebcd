/// Text extraction: one raw file in, one normalized text blob out.
///
/// PDF files are extracted page by page in page order; anything else is
/// treated as Markdown and rendered through a CommonMark parser with
/// front-matter metadata blocks stripped from the body.
use std::path::{Path, PathBuf};

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use thiserror::Error;

/// Errors surfaced by text extraction. These abort the whole file's
/// ingestion; nothing is written for a file that fails to extract.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse PDF {path}: {source}")]
    Pdf {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },
}

/// Extract the full text of a file, dispatching on its extension.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        extract_pdf(path)
    } else {
        extract_markdown(path)
    }
}

/// Per-page text extraction, concatenated in page order.
///
/// A page that yields no extractable text contributes an empty string.
fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load(path).map_err(|source| ExtractError::Pdf {
        path: path.to_path_buf(),
        source,
    })?;

    let pages: Vec<String> = doc
        .get_pages()
        .keys()
        .map(|&page| doc.extract_text(&[page]).unwrap_or_default())
        .collect();

    Ok(pages.join("\n"))
}

fn extract_markdown(path: &Path) -> Result<String, ExtractError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(render_markdown(&raw))
}

/// Render CommonMark to plain text, dropping front-matter metadata blocks.
#[must_use]
pub fn render_markdown(raw: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    options.insert(Options::ENABLE_PLUSES_DELIMITED_METADATA_BLOCKS);

    let mut out = String::with_capacity(raw.len());
    let mut in_metadata = false;

    for event in Parser::new_ext(raw, options) {
        match event {
            Event::Start(Tag::MetadataBlock(_)) => in_metadata = true,
            Event::End(TagEnd::MetadataBlock(_)) => in_metadata = false,
            Event::Text(t) | Event::Code(t) => {
                if !in_metadata {
                    out.push_str(&t);
                }
            }
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_),
            ) => out.push('\n'),
            _ => {}
        }
    }

    out
}
