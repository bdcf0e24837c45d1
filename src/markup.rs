//! HTML rewriting for pages and fragments.
//!
//! Every edit goes through lol_html's streaming rewriter: handlers are
//! registered against CSS selectors, and bytes no handler touches come out
//! exactly as they went in. A fragment injected into a container therefore
//! lands byte-for-byte.
//!
//! lol_html does not build a tree, so it cannot know that `<li>` closes an
//! open `<li>` or that `<div>` closes an open `<p>`. Before rewriting,
//! [`close_implied_end_tags`] runs the html5ever tokenizer over the input,
//! tracks the open elements the way an HTML tree builder would, and writes
//! out the end tags the markup left implicit. After that pass, an element's
//! content ends where a browser would end it.
//!
//! ```text
//! <ul><li>Inicio<li>Contacto</ul>
//!        ↓ close_implied_end_tags
//! <ul><li>Inicio</li><li>Contacto</ul>
//! ```

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, Element};
use lol_html::{ElementContentHandlers, HandlerResult, RewriteStrSettings, Selector, element};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("rewriting failed: {0}")]
    Rewriting(#[from] RewritingError),
}

/// Selector-keyed handlers, as built with lol_html's `element!` macro.
pub type Handlers<'h, 's> = Vec<(Cow<'s, Selector>, ElementContentHandlers<'h>)>;

/// Make implied end tags explicit, then run `handlers` over the result.
pub fn rewrite(html: &str, handlers: Handlers<'_, '_>) -> Result<String, MarkupError> {
    let html = close_implied_end_tags(html);
    let output = lol_html::rewrite_str(
        &html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::new()
        },
    )?;
    Ok(output)
}

/// [`rewrite`], keeping `html` unchanged if the rewriter fails.
pub fn rewrite_or_keep(html: &str, handlers: Handlers<'_, '_>) -> String {
    match rewrite(html, handlers) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(error = %e, "leaving markup unchanged");
            html.to_string()
        }
    }
}

/// Run `handlers` over `html` for what they record, discarding the output.
pub fn scan(html: &str, handlers: Handlers<'_, '_>) {
    if let Err(e) = rewrite(html, handlers) {
        tracing::warn!(error = %e, "could not scan markup");
    }
}

// ============================================================================
// Element helpers
// ============================================================================

pub fn has_class(el: &Element<'_, '_>, class: &str) -> bool {
    el.get_attribute("class")
        .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
}

/// Add `class` when `on`, remove it otherwise. The tag is left alone when
/// the class list already agrees.
pub fn set_class(el: &mut Element<'_, '_>, class: &str, on: bool) -> HandlerResult {
    if has_class(el, class) == on {
        return Ok(());
    }
    let current = el.get_attribute("class").unwrap_or_default();
    let mut classes: Vec<&str> = current
        .split_ascii_whitespace()
        .filter(|c| *c != class)
        .collect();
    if on {
        classes.push(class);
    }
    if classes.is_empty() {
        el.remove_attribute("class");
    } else {
        el.set_attribute("class", &classes.join(" "))?;
    }
    Ok(())
}

/// Set or remove a boolean attribute such as `open` or `hidden`.
pub fn set_flag(el: &mut Element<'_, '_>, name: &str, on: bool) -> HandlerResult {
    if el.has_attribute(name) == on {
        return Ok(());
    }
    if on {
        el.set_attribute(name, "")?;
    } else {
        el.remove_attribute(name);
    }
    Ok(())
}

/// Set an attribute unless it already holds `value`.
pub fn set_attr(el: &mut Element<'_, '_>, name: &str, value: &str) -> HandlerResult {
    if el.get_attribute(name).as_deref() != Some(value) {
        el.set_attribute(name, value)?;
    }
    Ok(())
}

// ============================================================================
// Implied end tags
// ============================================================================

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Start tags that close an open `<p>` in button scope.
const CLOSES_P: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "center",
    "dd",
    "details",
    "dialog",
    "dir",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "li",
    "listing",
    "main",
    "menu",
    "nav",
    "ol",
    "p",
    "plaintext",
    "pre",
    "search",
    "section",
    "summary",
    "table",
    "ul",
    "xmp",
];

/// Elements that end the search for an open `<li>`, `<dd>` or `<dt>`.
const SPECIAL: &[&str] = &[
    "applet",
    "article",
    "aside",
    "blockquote",
    "body",
    "button",
    "caption",
    "center",
    "colgroup",
    "details",
    "dir",
    "dl",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "frameset",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "head",
    "header",
    "hgroup",
    "html",
    "iframe",
    "listing",
    "main",
    "marquee",
    "menu",
    "nav",
    "noembed",
    "noframes",
    "noscript",
    "object",
    "ol",
    "plaintext",
    "pre",
    "script",
    "search",
    "section",
    "select",
    "style",
    "summary",
    "table",
    "tbody",
    "td",
    "template",
    "textarea",
    "tfoot",
    "th",
    "thead",
    "title",
    "tr",
    "ul",
    "xmp",
];

const BUTTON_SCOPE: &[&str] = &[
    "applet", "button", "caption", "html", "marquee", "object", "table", "td", "template", "th",
];

const TABLE_SCOPE: &[&str] = &["html", "table", "template"];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// End tags to write before the `index`-th start tag of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImpliedClose {
    index: usize,
    tag: String,
    closes: Vec<String>,
}

impl ImpliedClose {
    fn markup(&self) -> String {
        self.closes.iter().map(|name| format!("</{name}>")).collect()
    }
}

/// Pop the stack down to the nearest element named in `targets`, unless an
/// element for which `stops` holds is found first. Returns the popped names,
/// innermost first.
fn close_nearest(
    stack: &mut Vec<String>,
    targets: &[&str],
    stops: impl Fn(&str) -> bool,
) -> Vec<String> {
    let Some(pos) = stack
        .iter()
        .rposition(|name| targets.contains(&name.as_str()) || stops(name.as_str()))
    else {
        return Vec::new();
    };
    if !targets.contains(&stack[pos].as_str()) {
        return Vec::new();
    }
    stack.drain(pos..).rev().collect()
}

fn close_top(stack: &mut Vec<String>, targets: &[&str]) -> Vec<String> {
    match stack.last() {
        Some(top) if targets.contains(&top.as_str()) => stack.pop().into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Elements closed by a `name` start tag in HTML content.
fn implied_by(stack: &mut Vec<String>, name: &str) -> Vec<String> {
    let list_stop = |n: &str| SPECIAL.contains(&n) && !matches!(n, "address" | "div" | "p");
    let mut closed = match name {
        "li" => close_nearest(stack, &["li"], list_stop),
        "dd" | "dt" => close_nearest(stack, &["dd", "dt"], list_stop),
        "option" => close_top(stack, &["option"]),
        "optgroup" => {
            let mut closed = close_top(stack, &["option"]);
            closed.extend(close_top(stack, &["optgroup"]));
            closed
        }
        "tr" => close_nearest(stack, &["tr"], |n| TABLE_SCOPE.contains(&n)),
        "td" | "th" => close_nearest(stack, &["td", "th"], |n| {
            n == "tr" || TABLE_SCOPE.contains(&n)
        }),
        "tbody" | "thead" | "tfoot" => {
            close_nearest(stack, &["tbody", "thead", "tfoot"], |n| {
                TABLE_SCOPE.contains(&n)
            })
        }
        _ => Vec::new(),
    };
    if CLOSES_P.contains(&name) {
        closed.extend(close_nearest(stack, &["p"], |n| BUTTON_SCOPE.contains(&n)));
    }
    if HEADINGS.contains(&name) {
        closed.extend(close_top(stack, HEADINGS));
    }
    closed
}

/// Token sink that mirrors the tree builder's stack of open elements.
#[derive(Default)]
struct OpenElements {
    stack: RefCell<Vec<String>>,
    start_tags: Cell<usize>,
    closes: RefCell<Vec<ImpliedClose>>,
}

impl OpenElements {
    fn in_foreign_content(&self) -> bool {
        self.stack
            .borrow()
            .iter()
            .any(|name| name == "svg" || name == "math")
    }

    fn start_tag(&self, tag: &Tag) -> TokenSinkResult<()> {
        let name: &str = &tag.name;
        let index = self.start_tags.get();
        self.start_tags.set(index + 1);

        let foreign = self.in_foreign_content();
        let mut stack = self.stack.borrow_mut();
        if !foreign {
            let closes = implied_by(&mut stack, name);
            if !closes.is_empty() {
                self.closes.borrow_mut().push(ImpliedClose {
                    index,
                    tag: name.to_string(),
                    closes,
                });
            }
        }

        let svg_or_math = name == "svg" || name == "math";
        if VOID_ELEMENTS.contains(&name) || (tag.self_closing && (foreign || svg_or_math)) {
            return TokenSinkResult::Continue;
        }
        stack.push(name.to_string());
        if foreign {
            return TokenSinkResult::Continue;
        }
        match name {
            "script" => TokenSinkResult::RawData(RawKind::ScriptData),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                TokenSinkResult::RawData(RawKind::Rawtext)
            }
            "title" | "textarea" => TokenSinkResult::RawData(RawKind::Rcdata),
            "plaintext" => TokenSinkResult::Plaintext,
            _ => TokenSinkResult::Continue,
        }
    }

    fn end_tag(&self, tag: &Tag) {
        let name: &str = &tag.name;
        let mut stack = self.stack.borrow_mut();
        if let Some(pos) = stack.iter().rposition(|open| open == name) {
            stack.truncate(pos);
        }
    }
}

impl TokenSink for OpenElements {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if let Token::TagToken(tag) = token {
            match tag.kind {
                TagKind::StartTag => return self.start_tag(&tag),
                TagKind::EndTag => self.end_tag(&tag),
            }
        }
        TokenSinkResult::Continue
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        self.in_foreign_content()
    }
}

fn implied_closes(html: &str) -> Vec<ImpliedClose> {
    let tokenizer = Tokenizer::new(OpenElements::default(), TokenizerOpts::default());
    let input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(html));
    let _ = tokenizer.feed(&input);
    tokenizer.end();
    tokenizer.sink.closes.take()
}

/// Write out the end tags `html` leaves implicit before a start tag, such as
/// `</li>` before a sibling `<li>` or `</p>` before a `<div>`.
///
/// Markup without such tags is returned unchanged. End tags implied by an
/// ancestor's end tag (`<li>` closed by `</ul>`) are left implicit, since a
/// rewriter closes those at the ancestor already.
pub fn close_implied_end_tags(html: &str) -> String {
    let closes = implied_closes(html);
    if closes.is_empty() {
        return html.to_string();
    }

    let seen = Cell::new(0usize);
    let next = Cell::new(0usize);
    let aligned = Cell::new(true);
    let result = lol_html::rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                let index = seen.get();
                seen.set(index + 1);
                let Some(close) = closes.get(next.get()) else {
                    return Ok(());
                };
                if close.index != index {
                    return Ok(());
                }
                next.set(next.get() + 1);
                if el.tag_name().eq_ignore_ascii_case(&close.tag) {
                    el.before(&close.markup(), ContentType::Html);
                } else {
                    aligned.set(false);
                }
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    );

    match result {
        Ok(output) if aligned.get() => output,
        Ok(_) => {
            tracing::debug!("tokenizers disagree on element order; keeping implicit end tags");
            html.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not write implied end tags");
            html.to_string()
        }
    }
}
