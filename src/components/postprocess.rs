//! Post-processing applied to a fragment after it is fetched and before it
//! is reported as loaded.
//!
//! 1. Elements marked `data-current-year` get the current year as content.
//! 2. The `header` fragment gets its mobile menu and scroll effect wired.
//! 3. Every fragment has its in-page anchor links collected.
//!
//! Only step 1 changes markup. The bindings from steps 2 and 3 start from
//! whatever state the fragment's markup already declares, so a freshly
//! loaded header renders exactly as it was fetched.

use crate::interactions::{AnchorLink, NavMenu, ScrollEffect};
use crate::markup;
use crate::page::Bindings;
use chrono::{DateTime, Datelike, Utc};
use lol_html::element;
use lol_html::html_content::ContentType;

/// Attribute marking an element whose content is the current year.
pub const CURRENT_YEAR_ATTR: &str = "data-current-year";

/// Fragment that receives the navigation and scroll bindings.
pub const HEADER_COMPONENT: &str = "header";

#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub html: String,
    pub bindings: Bindings,
}

pub fn process(name: &str, html: &str, now: DateTime<Utc>, scroll_threshold: f64) -> Processed {
    let html = fill_current_year(html, now.year());

    let mut bindings = Bindings {
        anchors: AnchorLink::collect(&html),
        ..Bindings::default()
    };
    if name == HEADER_COMPONENT {
        bindings.nav = NavMenu::detect(&html);
        if bindings.nav.is_some() {
            bindings.scroll = ScrollEffect::detect(&html, scroll_threshold);
        }
    }
    Processed { html, bindings }
}

/// Replace the content of every `data-current-year` element with `year`.
///
/// Void and self-closing elements have no content to replace and are left
/// alone.
pub fn fill_current_year(html: &str, year: i32) -> String {
    let year = year.to_string();
    markup::rewrite_or_keep(
        html,
        vec![element!("[data-current-year]", |el| {
            if el.can_have_content() && !el.is_self_closing() {
                el.set_inner_content(&year, ContentType::Text);
            }
            Ok(())
        })],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn oct_2026() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn current_year_replaces_placeholder_text() {
        let html = r#"<p>&copy; <span data-current-year>2024</span> INFLAPY</p>"#;
        assert_eq!(
            fill_current_year(html, 2026),
            r#"<p>&copy; <span data-current-year>2026</span> INFLAPY</p>"#
        );
    }

    #[test]
    fn current_year_fills_every_marker() {
        let html = r#"<span data-current-year></span>|<b data-current-year="">x</b>"#;
        assert_eq!(
            fill_current_year(html, 2026),
            r#"<span data-current-year>2026</span>|<b data-current-year="">2026</b>"#
        );
    }

    #[test]
    fn current_year_skips_void_elements() {
        let html = r#"<input data-current-year value="x"><br data-current-year/>"#;
        assert_eq!(fill_current_year(html, 2026), html);
    }

    #[test]
    fn current_year_in_list_item_without_end_tag() {
        let html = "<ul><li data-current-year>2024<li>Aviso legal</ul>";
        assert_eq!(
            fill_current_year(html, 2026),
            "<ul><li data-current-year>2026</li><li>Aviso legal</ul>"
        );
    }

    #[test]
    fn current_year_in_paragraph_closed_by_block() {
        let html = "<footer><p data-current-year>2024<div>Hecho en Monterrey</div></footer>";
        let out = fill_current_year(html, 2026);
        assert!(out.contains("<p data-current-year>2026</p>"));
        assert!(out.contains("<div>Hecho en Monterrey</div>"));
    }

    #[test]
    fn fragment_without_markers_is_unchanged() {
        let html = "<footer><p>Renta de inflables</p></footer>";
        let out = process("footer", html, oct_2026(), 50.0);
        assert_eq!(out.html, html);
        assert_eq!(out.bindings, Bindings::default());
    }

    #[test]
    fn header_gets_nav_and_scroll_bindings() {
        let html = r##"<header class="header"><button class="nav-toggle" aria-expanded="false"></button><nav class="nav-menu"><a class="nav-link" href="#faq">FAQ</a></nav></header>"##;
        let out = process("header", html, oct_2026(), 50.0);
        assert_eq!(out.html, html);
        assert!(out.bindings.nav.is_some());
        assert!(out.bindings.scroll.is_some());
        assert_eq!(out.bindings.anchors.len(), 1);
    }

    #[test]
    fn nav_markup_outside_header_is_not_wired() {
        let html = r#"<div class="header"><button class="nav-toggle"></button><ul class="nav-menu"></ul></div>"#;
        let out = process("footer", html, oct_2026(), 50.0);
        assert!(out.bindings.nav.is_none());
        assert!(out.bindings.scroll.is_none());
    }

    #[test]
    fn header_without_menu_gets_no_bindings() {
        let html = r#"<header class="header"><a href="/">INFLAPY</a></header>"#;
        let out = process("header", html, oct_2026(), 50.0);
        assert!(out.bindings.nav.is_none());
        assert!(out.bindings.scroll.is_none());
    }

    #[test]
    fn anchors_are_collected_for_any_fragment() {
        let html = r##"<footer><a href="#contacto">Contacto</a><a href="/blog/">Blog</a><a href="#">Top</a></footer>"##;
        let out = process("footer", html, oct_2026(), 50.0);
        let hrefs: Vec<_> = out.bindings.anchors.iter().map(|a| a.href.as_str()).collect();
        assert_eq!(hrefs, vec!["#contacto", "#"]);
    }
}
