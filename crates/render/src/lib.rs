//! HTML listing page for stored files.
//!
//! The page is an [upon] template embedded into the binary. It receives a
//! snapshot of the index in order and renders, per file: name, tier label,
//! size (`filesize` formatter), modification date and an icon picked by
//! extension (`icon` formatter). All other values are HTML-escaped.
//!
//! # Template Variables
//!
//! | Variable            | Type     | Description                                |
//! |---------------------|----------|--------------------------------------------|
//! | `backend_url`       | `String` | Base URL the page's scripts talk to        |
//! | `empty`             | `bool`   | No files are stored                        |
//! | `files[].name`      | `String` | Final segment of the storage path          |
//! | `files[].url`       | `String` | Download URL (index key)                   |
//! | `files[].tier`      | `String` | `low`, `deep` or `unknown`                 |
//! | `files[].tier_label`| `String` | Human-readable tier                        |
//! | `files[].size`      | `u64`    | Artifact size in bytes                     |
//! | `files[].date`      | `String` | Modification date, `YYYY-MM-DD`            |

mod assets;
pub mod error;
mod format;

use crate::assets::Templates;
use crate::error::{ErrorKind, Result};
pub use crate::format::{date, escape_html, human_size, icon_for};
use exn::ResultExt;
use serde::Serialize;
use strata_storage::{StorageInfo, Tier};
use tracing::instrument;
use upon::{Engine, Template};

const LISTING_TEMPLATE: &str = "index.html";

/// One row of the listing: an index entry and the tier it lives in (`None`
/// if its path lies under neither root).
#[derive(Debug, Clone, Copy)]
pub struct Listed<'a> {
    pub info: &'a StorageInfo,
    pub tier: Option<Tier>,
}

#[derive(Serialize)]
struct Page<'a> {
    backend_url: &'a str,
    empty: bool,
    files: Vec<Row<'a>>,
}

#[derive(Serialize)]
struct Row<'a> {
    name: String,
    url: &'a str,
    tier: &'static str,
    tier_label: &'static str,
    size: u64,
    date: String,
}
impl<'a> From<&Listed<'a>> for Row<'a> {
    fn from(listed: &Listed<'a>) -> Self {
        Self {
            name: listed.info.filename(),
            url: &listed.info.url,
            tier: listed.tier.map_or("unknown", |tier| tier.as_str()),
            tier_label: match listed.tier {
                Some(Tier::Low) => "Low storage",
                Some(Tier::Deep) => "Deep storage",
                None => "Unknown storage",
            },
            size: listed.info.fsize,
            date: date(listed.info.mtime),
        }
    }
}

/// Compiled listing page, reusable across requests.
pub struct Renderer {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl Renderer {
    /// Compile the embedded template, failing fast on syntax errors.
    pub fn new() -> Result<Self> {
        Self::from_source(Templates::load(LISTING_TEMPLATE)?)
    }

    fn from_source(source: String) -> Result<Self> {
        let mut engine = Engine::new();
        format::configure(&mut engine);
        let template = engine.compile(source).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }

    /// Render the listing for `files`, in the order given.
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn render(&self, files: &[Listed<'_>], backend_url: &str) -> Result<String> {
        let page = Page {
            backend_url,
            empty: files.is_empty(),
            files: files.iter().map(Row::from).collect(),
        };
        self.template.render(&self.engine, &page).to_string().or_raise(|| ErrorKind::Template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcDateTime;

    fn info(name: &str, fsize: u64) -> StorageInfo {
        StorageInfo::new(
            format!("/download/{name}"),
            format!("/srv/low_storage/{name}"),
            fsize,
            UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        )
    }

    #[test]
    fn test_empty_state() {
        let html = Renderer::new().unwrap().render(&[], "http://127.0.0.1:8081").unwrap();
        assert!(html.contains("No files yet"));
        assert!(!html.contains("class=\"file-item\""));
        assert!(html.contains("data-backend=\"http:"));
    }

    #[test]
    fn test_rows_in_order() {
        let (first, second) = (info("report.pdf", 1536), info("zeros.bin", 42));
        let files = [Listed { info: &first, tier: Some(Tier::Low) }, Listed { info: &second, tier: Some(Tier::Deep) }];
        let html = Renderer::new().unwrap().render(&files, "http://localhost").unwrap();

        assert!(!html.contains("No files yet"));
        assert_eq!(html.matches("class=\"file-item\"").count(), 2);
        let (a, b) = (html.find("report.pdf").unwrap(), html.find("zeros.bin").unwrap());
        assert!(a < b);
        assert!(html.contains("fa-file-pdf"));
        assert!(html.contains("1.50 KB"));
        assert!(html.contains("42.00 B"));
        assert!(html.contains("fa-hdd\"></i> Deep storage"));
        assert!(html.contains("2023-11-14"));
        assert_eq!(html.matches("data-url=").count(), 4);
    }

    #[test]
    fn test_names_are_escaped() {
        let hostile = info("<script>alert(1)<\\script>.txt", 1);
        let html = Renderer::new().unwrap().render(&[Listed { info: &hostile, tier: None }], "").unwrap();
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Unknown storage"));
    }

    #[test]
    fn test_attributes_are_escaped() {
        let hostile = info(r#"x" onmouseover="alert(1).txt"#, 1);
        let html = Renderer::new().unwrap().render(&[Listed { info: &hostile, tier: Some(Tier::Low) }], "").unwrap();
        assert!(!html.contains(r#"" onmouseover=""#));
        assert_eq!(html.matches(r#"data-name="x&quot; onmouseover=&quot;alert(1).txt""#).count(), 1);
        assert_eq!(html.matches(r#"data-url="/download/x&quot; onmouseover=&quot;alert(1).txt""#).count(), 2);
    }

    #[test]
    fn test_bad_template() {
        let err = Renderer::from_source("{{ unclosed".to_string()).err().unwrap();
        assert!(matches!(&*err, ErrorKind::Template));
    }
}
