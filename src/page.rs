//! Page documents and the containers they declare.
//!
//! A container is any element carrying a `data-component` attribute. Parsing a
//! page records where each container's inner content lives; the loader then
//! replaces container content in place, and [`Page::render`] splices it back
//! into the original document. Markup outside the containers keeps its
//! bytes, apart from end tags the page left implicit, which are written out
//! (see [`markup::close_implied_end_tags`]).
//!
//! ```text
//! <body>
//!   <div data-component="header"></div>      ← container 0
//!   <main>...</main>
//!   <div data-component="footer"></div>      ← container 1
//! </body>
//! ```
//!
//! Containers nested inside another container are not discovered on their
//! own: the outer container's content is replaced wholesale.

use crate::interactions::{AnchorLink, Interaction, NavMenu, ScrollEffect};
use crate::markup;
use lol_html::element;
use lol_html::html_content::ContentType;
use std::cell::{Cell, RefCell};
use std::fmt;

/// Attribute naming the component a container receives.
pub const COMPONENT_ATTR: &str = "data-component";

/// Delimits container slots in a page template. Pages must not contain it.
const SLOT_MARK: char = '\u{E000}';

fn open_mark(index: usize) -> String {
    format!("{SLOT_MARK}open:{index}{SLOT_MARK}")
}

fn close_mark(index: usize) -> String {
    format!("{SLOT_MARK}close:{index}{SLOT_MARK}")
}

/// Drop every `SLOT_MARK ... SLOT_MARK` pair from `html`.
fn strip_marks(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(SLOT_MARK) {
        out.push_str(&rest[..start]);
        let after = &rest[start + SLOT_MARK.len_utf8()..];
        rest = match after.find(SLOT_MARK) {
            Some(end) => &after[end + SLOT_MARK.len_utf8()..],
            None => after,
        };
    }
    out.push_str(rest);
    out
}

/// Position of a container within its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub usize);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Loading lifecycle of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Pending,
    Loading,
    Loaded,
    Error,
}

/// Interactive behavior wired up by post-processing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    /// Mobile menu toggle (header only).
    pub nav: Option<NavMenu>,
    /// Scroll-position class toggle (header only).
    pub scroll: Option<ScrollEffect>,
    /// In-fragment `#anchor` links.
    pub anchors: Vec<AnchorLink>,
}

/// A page element awaiting (or holding) an injected fragment.
#[derive(Debug, Clone)]
pub struct Container {
    id: ContainerId,
    name: Option<String>,
    state: ContainerState,
    busy: bool,
    content: String,
    bindings: Bindings,
}

impl Container {
    /// A container that is not attached to any page document.
    pub fn detached(id: ContainerId, name: Option<&str>) -> Self {
        Self {
            id,
            name: name.map(str::to_string),
            state: ContainerState::Pending,
            busy: false,
            content: String::new(),
            bindings: Bindings::default(),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Declared component name exactly as written, if the attribute is
    /// present (it may be empty).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    /// Mirrors `aria-busy`: true only while a load is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn is_settled(&self) -> bool {
        matches!(self.state, ContainerState::Loaded | ContainerState::Error)
    }

    pub(crate) fn begin_loading(&mut self) {
        self.state = ContainerState::Loading;
        self.busy = true;
    }

    pub(crate) fn finish(&mut self, content: String, bindings: Bindings) {
        self.content = content;
        self.bindings = bindings;
        self.busy = false;
        self.state = ContainerState::Loaded;
    }

    pub(crate) fn fail(&mut self, fallback: String) {
        self.content = fallback;
        self.bindings = Bindings::default();
        self.busy = false;
        self.state = ContainerState::Error;
    }

    /// Route a user interaction to this container's bindings.
    ///
    /// Returns `true` if the container's markup changed. Containers without
    /// the relevant binding ignore the interaction.
    pub fn interact(&mut self, interaction: Interaction) -> bool {
        let changed = match interaction {
            Interaction::ToggleMenu => self.bindings.nav.as_mut().map(NavMenu::toggle),
            Interaction::SelectNavLink | Interaction::ClickOutside => {
                self.bindings.nav.as_mut().map(NavMenu::close)
            }
            Interaction::Scroll { y } => self.bindings.scroll.as_mut().map(|s| s.update(y)),
        };
        if changed != Some(true) {
            return false;
        }

        let mut content = std::mem::take(&mut self.content);
        if let Some(nav) = &self.bindings.nav {
            content = nav.apply(&content);
        }
        if let Some(scroll) = &self.bindings.scroll {
            content = scroll.apply(&content);
        }
        self.content = content;
        true
    }
}

/// A parsed page document.
#[derive(Debug, Clone)]
pub struct Page {
    source: String,
    /// The source with each container's content replaced by its open mark.
    template: String,
    containers: Vec<Container>,
}

impl Page {
    /// Parse a page and discover its containers.
    ///
    /// Every `[data-component]` element has its content wrapped in marks.
    /// Marks found inside an earlier container's content belong to a nested
    /// container, which is dropped along with them.
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let names = RefCell::new(Vec::new());
        let marked = markup::rewrite(
            &source,
            vec![element!("[data-component]", |el| {
                let mut names = names.borrow_mut();
                let index = names.len();
                names.push(el.get_attribute(COMPONENT_ATTR));
                el.prepend(&open_mark(index), ContentType::Html);
                el.append(&close_mark(index), ContentType::Html);
                Ok(())
            })],
        );
        let marked = match marked {
            Ok(marked) => marked,
            Err(e) => {
                tracing::warn!(error = %e, "page left without containers");
                return Self {
                    template: source.clone(),
                    source,
                    containers: Vec::new(),
                };
            }
        };

        let mut template = String::with_capacity(marked.len());
        let mut containers = Vec::new();
        let mut cursor = 0;
        for (index, name) in names.into_inner().into_iter().enumerate() {
            let open = open_mark(index);
            let Some(start) = marked[cursor..].find(&open).map(|pos| cursor + pos) else {
                continue;
            };
            let inner_start = start + open.len();
            let close = close_mark(index);
            // No close mark means the container runs to the end of the page.
            let (inner_end, next) = match marked[inner_start..].find(&close) {
                Some(pos) => (inner_start + pos, inner_start + pos + close.len()),
                None => (marked.len(), marked.len()),
            };

            let id = ContainerId(containers.len());
            template.push_str(&marked[cursor..start]);
            template.push_str(&open_mark(id.0));
            containers.push(Container {
                id,
                name,
                state: ContainerState::Pending,
                busy: false,
                content: strip_marks(&marked[inner_start..inner_end]),
                bindings: Bindings::default(),
            });
            cursor = next;
        }
        template.push_str(&marked[cursor..]);

        Self {
            source,
            template,
            containers,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn containers_mut(&mut self) -> &mut [Container] {
        &mut self.containers
    }

    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(id.0)
    }

    pub fn container_mut(&mut self, id: ContainerId) -> Option<&mut Container> {
        self.containers.get_mut(id.0)
    }

    /// First container declaring `name`.
    pub fn find(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name() == Some(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Container> {
        self.containers.iter_mut().find(|c| c.name() == Some(name))
    }

    /// Render the document with current container contents spliced in.
    ///
    /// Containers still loading carry `aria-busy="true"`; settled containers
    /// have any `aria-busy` attribute removed.
    pub fn render(&self) -> String {
        let next = Cell::new(0usize);
        let tagged = markup::rewrite_or_keep(
            &self.template,
            vec![element!("[data-component]", |el| {
                let index = next.get();
                next.set(index + 1);
                match self.containers.get(index) {
                    Some(c) if c.busy => markup::set_attr(el, "aria-busy", "true"),
                    Some(c) if c.is_settled() => markup::set_flag(el, "aria-busy", false),
                    _ => Ok(()),
                }
            })],
        );

        let mut out = String::with_capacity(tagged.len());
        let mut rest = tagged.as_str();
        for container in &self.containers {
            let open = open_mark(container.id.0);
            let Some(pos) = rest.find(&open) else {
                continue;
            };
            out.push_str(&rest[..pos]);
            out.push_str(&container.content);
            rest = &rest[pos + open.len()..];
        }
        out.push_str(rest);
        out
    }
}
