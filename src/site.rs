//! Whole-site assembly.
//!
//! Walks a site directory, runs the loader over every HTML page, and writes
//! the assembled pages under an output directory with the same relative
//! layout. Everything that is not a page is copied through unchanged.
//!
//! ```text
//! site/                              dist/
//! ├── config.toml        (skipped)
//! ├── components/        (skipped)
//! │   ├── header.html
//! │   └── footer.html
//! ├── index.html         ──────────► ├── index.html        (header + footer injected)
//! ├── blog/                          ├── blog/
//! │   └── fiestas.html   ──────────► │   └── fiestas.html
//! └── css/styles.css     ──────────► └── css/styles.css
//! ```
//!
//! The components directory and hidden entries are not part of the output:
//! every fragment they hold is already inlined into the pages that use it.

use crate::components::{ComponentLoader, LoadSummary};
use crate::config::SiteConfig;
use crate::page::Page;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

/// Outcome of assembling one page.
#[derive(Debug, Clone)]
pub struct PageReport {
    /// Path relative to the site root.
    pub path: PathBuf,
    pub summary: LoadSummary,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub pages: Vec<PageReport>,
    /// Non-page files copied through.
    pub assets: usize,
}

impl BuildReport {
    /// Load outcomes summed over every page.
    pub fn total(&self) -> LoadSummary {
        let mut total = LoadSummary::default();
        for page in &self.pages {
            total.merge(&page.summary);
        }
        total
    }
}

fn is_page(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("html"))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Directory holding fragments for `config`, inside `root`.
pub fn components_dir(root: &Path, config: &SiteConfig) -> PathBuf {
    root.join(config.components.path.trim_matches('/'))
}

/// Every file under `root` that belongs in the output, relative to `root`
/// and sorted.
fn site_files(root: &Path, config: &SiteConfig) -> Result<Vec<PathBuf>, BuildError> {
    let components = components_dir(root, config);
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && e.path() != components);

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if rel == Path::new("config.toml") {
            continue;
        }
        files.push(rel.to_path_buf());
    }
    files.sort();
    Ok(files)
}

/// Relative paths of every page in the site.
pub fn discover_pages(root: &Path, config: &SiteConfig) -> Result<Vec<PathBuf>, BuildError> {
    Ok(site_files(root, config)?
        .into_iter()
        .filter(|p| is_page(p))
        .collect())
}

/// Inject components into one page document.
pub fn assemble(loader: &ComponentLoader, html: &str) -> (String, LoadSummary) {
    let mut page = Page::parse(html);
    let summary = loader.load_all(&mut page);
    (page.render(), summary)
}

/// Read a page from disk and inject its components.
pub fn assemble_file(
    loader: &ComponentLoader,
    path: &Path,
) -> Result<(String, LoadSummary), BuildError> {
    let html = fs::read_to_string(path)?;
    Ok(assemble(loader, &html))
}

/// Assemble every page under `source` into `output` and copy the rest.
pub fn build(
    loader: &ComponentLoader,
    source: &Path,
    output: &Path,
) -> Result<BuildReport, BuildError> {
    let mut report = BuildReport::default();

    for rel in site_files(source, loader.config())? {
        let dest = output.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if is_page(&rel) {
            info!(page = %rel.display(), "assembling");
            let (html, summary) = assemble_file(loader, &source.join(&rel))?;
            fs::write(&dest, html)?;
            report.pages.push(PageReport { path: rel, summary });
        } else {
            debug!(asset = %rel.display(), "copying");
            fs::copy(source.join(&rel), &dest)?;
            report.assets += 1;
        }
    }

    Ok(report)
}
