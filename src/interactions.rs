//! Page interactions: the behavior site scripts attach once components are ready.
//!
//! Each interaction is a small state machine plus an `apply` step that
//! reflects its state into markup, so the same logic drives both a rendered
//! page and tests without a browser.
//!
//! | Type | Markup hooks | Behavior |
//! |------|--------------|----------|
//! | [`NavMenu`] | `.nav-toggle`, `.nav-menu` | toggle opens/closes; link selection or outside click closes |
//! | [`ScrollEffect`] | `.header` | `scrolled` class past a pixel threshold |
//! | [`AnchorScroller`] | `a[href^="#"]` | offset scroll target below a sticky header |
//! | [`FaqAccordion`] | `.faq-item` | at most one item open |
//! | [`CatalogFilter`] | `.filter-btn`, `.product-card` | category filter, `todos` shows all |
//! | [`promote_lazy_images`] | `img[data-src]` | move `data-src` into `src` |
//!
//! The loader wires the first three into a container's [`Bindings`] during
//! post-processing. The last three belong to page scripts rather than to
//! components, so nothing in the loader or the CLI calls them: they are
//! library API for callers that drive a page themselves.
//!
//! [`Bindings`]: crate::page::Bindings

use crate::markup;
use lol_html::element;
use std::cell::{Cell, RefCell};
use std::sync::OnceLock;

/// Class on the sticky site header.
pub const HEADER_CLASS: &str = "header";
/// Class added to the header once the page has scrolled past the threshold.
pub const SCROLLED_CLASS: &str = "scrolled";
/// Class marking an open menu or the selected filter button.
pub const ACTIVE_CLASS: &str = "active";

/// User input routed to a container's bindings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    /// The `.nav-toggle` button was activated.
    ToggleMenu,
    /// A `.nav-link` inside the menu was selected.
    SelectNavLink,
    /// A click landed outside both the toggle and the menu.
    ClickOutside,
    /// The window scrolled to vertical offset `y`.
    Scroll { y: f64 },
}

// ============================================================================
// Mobile navigation
// ============================================================================

/// Open/closed state of the header's mobile menu.
///
/// The state is mirrored in markup as `aria-expanded` on the toggle and the
/// `active` class on the menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavMenu {
    expanded: bool,
}

impl NavMenu {
    /// Wire a menu if the fragment has both a toggle and a menu.
    pub fn detect(html: &str) -> Option<Self> {
        let expanded = Cell::new(None);
        let has_menu = Cell::new(false);
        markup::scan(
            html,
            vec![
                element!(".nav-toggle", |el| {
                    if expanded.get().is_none() {
                        let value = el.get_attribute("aria-expanded");
                        expanded.set(Some(value.as_deref() == Some("true")));
                    }
                    Ok(())
                }),
                element!(".nav-menu", |_| {
                    has_menu.set(true);
                    Ok(())
                }),
            ],
        );
        let expanded = expanded.get()?;
        has_menu.get().then_some(Self { expanded })
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Flip the menu. Always changes state.
    pub fn toggle(&mut self) -> bool {
        self.expanded = !self.expanded;
        true
    }

    /// Close the menu; returns whether it was open.
    pub fn close(&mut self) -> bool {
        std::mem::replace(&mut self.expanded, false)
    }

    /// Reflect the state on the first toggle and the first menu.
    pub fn apply(&self, html: &str) -> String {
        let expanded = if self.expanded { "true" } else { "false" };
        let toggle_seen = Cell::new(false);
        let menu_seen = Cell::new(false);
        markup::rewrite_or_keep(
            html,
            vec![
                element!(".nav-toggle", |el| {
                    if toggle_seen.replace(true) {
                        return Ok(());
                    }
                    markup::set_attr(el, "aria-expanded", expanded)
                }),
                element!(".nav-menu", |el| {
                    if menu_seen.replace(true) {
                        return Ok(());
                    }
                    markup::set_class(el, ACTIVE_CLASS, self.expanded)
                }),
            ],
        )
    }
}

// ============================================================================
// Header scroll effect
// ============================================================================

/// Toggles [`SCROLLED_CLASS`] on the header once the page scrolls past a threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollEffect {
    threshold: f64,
    scrolled: bool,
}

impl ScrollEffect {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            scrolled: false,
        }
    }

    /// Wire the effect if the markup has a `.header` element.
    pub fn detect(html: &str, threshold: f64) -> Option<Self> {
        let scrolled = Cell::new(None);
        markup::scan(
            html,
            vec![element!(".header", |el| {
                if scrolled.get().is_none() {
                    scrolled.set(Some(markup::has_class(el, SCROLLED_CLASS)));
                }
                Ok(())
            })],
        );
        Some(Self {
            threshold,
            scrolled: scrolled.get()?,
        })
    }

    pub fn is_scrolled(&self) -> bool {
        self.scrolled
    }

    /// Record a scroll position; returns whether the class state flipped.
    pub fn update(&mut self, y: f64) -> bool {
        let scrolled = y > self.threshold;
        std::mem::replace(&mut self.scrolled, scrolled) != scrolled
    }

    pub fn apply(&self, html: &str) -> String {
        let seen = Cell::new(false);
        markup::rewrite_or_keep(
            html,
            vec![element!(".header", |el| {
                if seen.replace(true) {
                    return Ok(());
                }
                markup::set_class(el, SCROLLED_CLASS, self.scrolled)
            })],
        )
    }
}

// ============================================================================
// Anchor scrolling
// ============================================================================

/// An in-page link such as `<a href="#contacto">`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorLink {
    pub href: String,
}

impl AnchorLink {
    /// Every `<a>` whose `href` starts with `#`, in document order.
    pub fn collect(html: &str) -> Vec<Self> {
        let links = RefCell::new(Vec::new());
        markup::scan(
            html,
            vec![element!("a[href]", |el| {
                if let Some(href) = el.get_attribute("href")
                    && href.starts_with('#')
                {
                    links.borrow_mut().push(Self { href });
                }
                Ok(())
            })],
        );
        links.into_inner()
    }

    /// Target element id; `None` for a bare `#`.
    pub fn target_id(&self) -> Option<&str> {
        self.href.strip_prefix('#').filter(|id| !id.is_empty())
    }
}

/// Viewport measurements needed to place an anchor below the sticky header.
pub trait Layout {
    /// Rendered height of the `.header` element, if there is one.
    fn header_height(&self) -> Option<f64>;
    /// Distance from the viewport top to the element with `id`.
    fn element_top(&self, id: &str) -> Option<f64>;
    /// Current vertical scroll offset.
    fn scroll_y(&self) -> f64;
}

/// Computes smooth-scroll targets for anchor links.
///
/// The header height is measured on first use and reused for the rest of the
/// session; the header does not change height after load.
#[derive(Debug, Default)]
pub struct AnchorScroller {
    header_height: OnceLock<f64>,
}

impl AnchorScroller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute scroll offset for following `link`, or `None` when the link
    /// is a bare `#` or its target does not exist.
    pub fn scroll_target(&self, link: &AnchorLink, layout: &dyn Layout) -> Option<f64> {
        let id = link.target_id()?;
        let top = layout.element_top(id)?;
        let header = *self
            .header_height
            .get_or_init(|| layout.header_height().unwrap_or(0.0));
        Some(top + layout.scroll_y() - header)
    }

    pub fn cached_header_height(&self) -> Option<f64> {
        self.header_height.get().copied()
    }
}

// ============================================================================
// FAQ accordion
// ============================================================================

/// `.faq-item` details elements where opening one closes the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqAccordion {
    open: Vec<bool>,
}

impl FaqAccordion {
    pub fn detect(html: &str) -> Self {
        let open = RefCell::new(Vec::new());
        markup::scan(
            html,
            vec![element!(".faq-item", |el| {
                open.borrow_mut().push(el.has_attribute("open"));
                Ok(())
            })],
        );
        Self {
            open: open.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.open.get(index).copied().unwrap_or(false)
    }

    /// Click the summary of item `index`: it toggles, every other item closes.
    pub fn activate(&mut self, index: usize) {
        if index >= self.open.len() {
            return;
        }
        let now_open = !self.open[index];
        for (i, open) in self.open.iter_mut().enumerate() {
            *open = i == index && now_open;
        }
    }

    pub fn apply(&self, html: &str) -> String {
        let next = Cell::new(0usize);
        markup::rewrite_or_keep(
            html,
            vec![element!(".faq-item", |el| {
                let index = next.get();
                next.set(index + 1);
                markup::set_flag(el, "open", self.is_open(index))
            })],
        )
    }
}

// ============================================================================
// Catalog filter
// ============================================================================

/// Category filter over `.product-card` elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFilter {
    selected: String,
}

impl CatalogFilter {
    /// Filter value that shows every card.
    pub const ALL: &'static str = "todos";

    pub fn new(selected: impl Into<String>) -> Self {
        Self {
            selected: selected.into(),
        }
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    pub fn matches(&self, category: Option<&str>) -> bool {
        self.selected == Self::ALL || category == Some(self.selected.as_str())
    }

    /// Mark the selected button active and hide non-matching cards.
    pub fn apply(&self, html: &str) -> String {
        markup::rewrite_or_keep(
            html,
            vec![
                element!(".filter-btn", |el| {
                    let filter = el.get_attribute("data-filter");
                    let selected = filter.as_deref() == Some(self.selected.as_str());
                    markup::set_class(el, ACTIVE_CLASS, selected)
                }),
                element!(".product-card", |el| {
                    let category = el.get_attribute("data-category");
                    markup::set_flag(el, "hidden", !self.matches(category.as_deref()))
                }),
            ],
        )
    }
}

// ============================================================================
// Lazy images
// ============================================================================

/// Load deferred images: `data-src` becomes `src`.
pub fn promote_lazy_images(html: &str) -> String {
    markup::rewrite_or_keep(
        html,
        vec![element!("img[data-src]", |el| {
            if let Some(src) = el.get_attribute("data-src") {
                el.set_attribute("src", &src)?;
                el.remove_attribute("data-src");
            }
            Ok(())
        })],
    )
}
