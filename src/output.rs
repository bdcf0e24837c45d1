//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Loader events
//!
//! Printed live while pages assemble. `Loading` is not shown; every other
//! event is one line, keyed by container position and component name:
//!
//! ```text
//!     #0 header: loaded
//!     #1 footer: error (HTTP 404: Not Found)
//!     ready: 2 components
//! ```
//!
//! ## Build
//!
//! ```text
//! Pages
//! 001 blog/fiestas.html → dist/blog/fiestas.html
//!     1 loaded (1 cached) (1 total)
//! 002 index.html → dist/index.html
//!     1 loaded, 1 failed (2 total)
//!
//! Assets: 3 copied
//! Components: 2 loaded (1 cached), 1 failed (3 total)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::components::LoaderEvent;
use crate::site::BuildReport;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Loader events
// ============================================================================

pub fn format_loader_event(event: &LoaderEvent) -> Vec<String> {
    match event {
        LoaderEvent::Loading { .. } => vec![],
        LoaderEvent::Loaded { name, container } => {
            vec![format!("{}{} {}: loaded", indent(1), container, name)]
        }
        LoaderEvent::Error {
            name,
            container,
            cause,
        } => vec![format!(
            "{}{} {}: error ({})",
            indent(1),
            container,
            name,
            cause
        )],
        LoaderEvent::Ready { count } => vec![format!(
            "{}ready: {}",
            indent(1),
            plural(*count, "component", "components")
        )],
    }
}

pub fn print_loader_event(event: &LoaderEvent) {
    for line in format_loader_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_output(report: &BuildReport, output_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.pages.is_empty() {
        lines.push("Pages".to_string());
        for (i, page) in report.pages.iter().enumerate() {
            lines.push(format!(
                "{} {} → {}",
                format_index(i + 1),
                page.path.display(),
                output_root.join(&page.path).display()
            ));
            lines.push(format!("{}{}", indent(1), page.summary));
        }
        lines.push(String::new());
    }

    lines.push(format!("Assets: {} copied", report.assets));
    lines.push(format!("Components: {}", report.total()));
    lines
}

pub fn print_build_output(report: &BuildReport, output_root: &Path) {
    for line in format_build_output(report, output_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Cache
// ============================================================================

pub fn format_clear_cache_output(store: &Path, existed: bool) -> Vec<String> {
    if existed {
        vec![format!("Cleared component cache: {}", store.display())]
    } else {
        vec![format!("No component cache at {}", store.display())]
    }
}

pub fn print_clear_cache_output(store: &Path, existed: bool) {
    for line in format_clear_cache_output(store, existed) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::LoadSummary;
    use crate::page::ContainerId;
    use crate::site::PageReport;
    use std::path::PathBuf;

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // Loader event formatting tests
    // =========================================================================

    #[test]
    fn loading_is_not_shown() {
        let event = LoaderEvent::Loading {
            name: "header".into(),
            container: ContainerId(0),
        };
        assert!(format_loader_event(&event).is_empty());
    }

    #[test]
    fn loaded_and_error_lines() {
        let loaded = LoaderEvent::Loaded {
            name: "header".into(),
            container: ContainerId(0),
        };
        let error = LoaderEvent::Error {
            name: "footer".into(),
            container: ContainerId(1),
            cause: "HTTP 404: Not Found".into(),
        };
        assert_eq!(format_loader_event(&loaded), vec!["    #0 header: loaded"]);
        assert_eq!(
            format_loader_event(&error),
            vec!["    #1 footer: error (HTTP 404: Not Found)"]
        );
    }

    #[test]
    fn ready_pluralizes() {
        assert_eq!(
            format_loader_event(&LoaderEvent::Ready { count: 1 }),
            vec!["    ready: 1 component"]
        );
        assert_eq!(
            format_loader_event(&LoaderEvent::Ready { count: 0 }),
            vec!["    ready: 0 components"]
        );
    }

    // =========================================================================
    // Build output tests
    // =========================================================================

    #[test]
    fn build_output_lists_pages_and_totals() {
        let report = BuildReport {
            pages: vec![
                PageReport {
                    path: PathBuf::from("blog/fiestas.html"),
                    summary: LoadSummary {
                        count: 1,
                        loaded: 1,
                        cached: 1,
                        ..LoadSummary::default()
                    },
                },
                PageReport {
                    path: PathBuf::from("index.html"),
                    summary: LoadSummary {
                        count: 2,
                        loaded: 1,
                        failed: 1,
                        ..LoadSummary::default()
                    },
                },
            ],
            assets: 3,
        };

        let lines = format_build_output(&report, Path::new("dist"));
        assert_eq!(
            lines,
            vec![
                "Pages",
                "001 blog/fiestas.html → dist/blog/fiestas.html",
                "    1 loaded (1 cached) (1 total)",
                "002 index.html → dist/index.html",
                "    1 loaded, 1 failed (2 total)",
                "",
                "Assets: 3 copied",
                "Components: 2 loaded (1 cached), 1 failed (3 total)",
            ]
        );
    }

    #[test]
    fn build_output_without_pages() {
        let lines = format_build_output(&BuildReport::default(), Path::new("dist"));
        assert_eq!(lines, vec!["Assets: 0 copied", "Components: 0 loaded (0 total)"]);
    }

    #[test]
    fn clear_cache_output() {
        let store = Path::new(".inflapy-cache/.component-cache.json");
        assert_eq!(
            format_clear_cache_output(store, true),
            vec!["Cleared component cache: .inflapy-cache/.component-cache.json"]
        );
        assert_eq!(
            format_clear_cache_output(store, false),
            vec!["No component cache at .inflapy-cache/.component-cache.json"]
        );
    }
}
