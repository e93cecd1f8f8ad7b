//! Paginated HTML reports of grouped files.
//!
//! This module provides:
//! - [`pages`]: Splitting ranked groups into bounded pages
//! - [`html`]: Rendering one page with an `askama` template
//! - [`report`]: Writing a scorer's pages and pruning stale ones
//!
//! # Example
//!
//! ```no_run
//! use imgtriage::config::ReportConfig;
//! use imgtriage::output::ReportWriter;
//! use imgtriage::pipeline::ScorerGroups;
//! use std::path::Path;
//!
//! # fn write(set: &ScorerGroups) -> Result<(), Box<dyn std::error::Error>> {
//! let writer = ReportWriter::new(Path::new("/photos"), ReportConfig::default());
//! for page in writer.write(set)? {
//!     println!("{}", page.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod html;
pub mod pages;
pub mod report;

pub use html::{HtmlOutputError, HtmlPage, RenderContext};
pub use pages::{paginate, page_file_name, Page, PageLayout, Row};
pub use report::{ReportError, ReportWriter};
