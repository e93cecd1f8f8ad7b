//! HTML rendering of report pages.
//!
//! This module renders one [`Page`] into a self-contained HTML document
//! using the `askama` template engine.
//!
//! # Features
//!
//! * **Self-contained**: All CSS is embedded in the page.
//! * **Deterministic**: No timestamps; the same groups render to the same bytes.
//! * **Safe**: Text is HTML-escaped and `src` paths are percent-encoded.
//! * **Scaled**: In duplicate reports every image is drawn at
//!   `cell_width * width / reference_width`, so size differences are visible.

use std::fmt::Write as _;

use askama::Template;
use bytesize::ByteSize;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use super::pages::{page_file_name, Page, Row};
use crate::record::FileRecord;
use crate::scorers::ScorerKind;

/// Characters escaped in `src` and `href` paths. `/` is kept.
const PATH_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Complete HTML page for the Askama template.
#[derive(Template)]
#[template(path = "page.html")]
pub struct HtmlPage {
    /// Page heading and document title
    pub title: String,
    /// Header of the key column
    pub key_header: &'static str,
    /// 1-based page number within its bucket
    pub number: usize,
    /// Number of pages in the bucket
    pub total: usize,
    /// Number of files on the page
    pub record_count: usize,
    /// Link to the previous page of the bucket
    pub prev: Option<String>,
    /// Link to the next page of the bucket
    pub next: Option<String>,
    /// Table rows
    pub rows: Vec<HtmlRow>,
}

/// A table row formatted for HTML presentation.
pub struct HtmlRow {
    /// Group key
    pub key: String,
    /// Whether the row continues the previous group
    pub continued: bool,
    /// Cells of the row
    pub items: Vec<HtmlItem>,
}

/// One file formatted for HTML presentation.
pub struct HtmlItem {
    /// Percent-encoded path relative to the page
    pub src: String,
    /// Display width in pixels
    pub width: u32,
    /// `"{w} x {h}; {size}"` plus attributes
    pub meta: String,
    /// Display path
    pub label: String,
    /// Whether the file has image dimensions
    pub is_image: bool,
    /// Whether this is the reference member of a duplicate group
    pub is_reference: bool,
}

/// Settings shared by every page of a report.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// Scorer identifier
    pub scorer: &'a str,
    /// Presentation kind of the scorer
    pub kind: ScorerKind,
    /// File name prefix of the report pages
    pub prefix: &'a str,
    /// `../` repeated once per level of report-directory depth
    pub src_prefix: String,
    /// Base thumbnail width
    pub cell_width: u32,
}

impl RenderContext<'_> {
    /// Build the template model of a page.
    #[must_use]
    pub fn page(&self, page: &Page<'_>, total: usize) -> HtmlPage {
        let link = |number: usize| {
            let name = page_file_name(self.prefix, self.scorer, &page.bucket, number);
            utf8_percent_encode(&name, PATH_ENCODE).to_string()
        };
        let (key_header, title) = match self.kind {
            ScorerKind::Duplicates => ("Group", format!("Duplicates by {}", self.scorer)),
            ScorerKind::Buckets => (
                "Bucket",
                format!("{}: {}", self.scorer, page.bucket),
            ),
        };
        HtmlPage {
            title,
            key_header,
            number: page.number,
            total,
            record_count: page.record_count(),
            prev: (page.number > 1).then(|| link(page.number - 1)),
            next: (page.number < total).then(|| link(page.number + 1)),
            rows: page.rows.iter().map(|row| self.row(row)).collect(),
        }
    }

    fn row(&self, row: &Row<'_>) -> HtmlRow {
        HtmlRow {
            key: row.key.to_string(),
            continued: row.continued,
            items: row
                .members
                .iter()
                .enumerate()
                .map(|(i, record)| HtmlItem {
                    src: self.src(record),
                    width: self.width(record, row.reference_width),
                    meta: meta(record),
                    label: record.display_path(),
                    is_image: record.dimensions().is_some(),
                    is_reference: self.kind == ScorerKind::Duplicates
                        && !row.continued
                        && i == 0,
                })
                .collect(),
        }
    }

    /// Relocated records keep their absolute path; the rest are made
    /// relative to the report directory.
    fn src(&self, record: &FileRecord) -> String {
        let path = record.display_path();
        let encoded = utf8_percent_encode(&path, PATH_ENCODE);
        if record.is_relocated() {
            encoded.to_string()
        } else {
            format!("{}{}", self.src_prefix, encoded)
        }
    }

    fn width(&self, record: &FileRecord, reference_width: Option<u32>) -> u32 {
        if self.kind == ScorerKind::Buckets {
            return self.cell_width;
        }
        scaled_width(self.cell_width, record.width, reference_width)
    }
}

/// `cell_width * width / reference_width`, or `cell_width` when either
/// width is unknown or zero.
#[must_use]
pub fn scaled_width(cell_width: u32, width: Option<u32>, reference_width: Option<u32>) -> u32 {
    match (width, reference_width) {
        (Some(w), Some(r)) if w > 0 && r > 0 => {
            let scaled = u64::from(cell_width) * u64::from(w) / u64::from(r);
            u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
        }
        _ => cell_width,
    }
}

/// Metadata text of a record.
#[must_use]
pub fn meta(record: &FileRecord) -> String {
    let mut text = match record.dimensions() {
        Some((w, h)) => format!("{w} x {h}; {}", ByteSize::b(record.size_bytes)),
        None => format!("? x ?; {}", ByteSize::b(record.size_bytes)),
    };
    for (name, value) in &record.attributes {
        let _ = write!(text, "; {name}={value:.3}");
    }
    text
}

/// Errors that can occur during HTML output generation.
#[derive(thiserror::Error, Debug)]
pub enum HtmlOutputError {
    /// Template rendering error
    #[error("HTML template error: {0}")]
    Template(#[from] askama::Error),
}

impl HtmlPage {
    /// Generate the HTML string using the embedded template.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn to_html(&self) -> Result<String, HtmlOutputError> {
        Ok(self.render()?)
    }
}
