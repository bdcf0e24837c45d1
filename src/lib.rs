//! # inflapy-components
//!
//! Assembles the pages of a static marketing site from reusable HTML
//! fragments. A page marks where a fragment goes with a container element:
//!
//! ```html
//! <div data-component="header"></div>
//! ```
//!
//! The loader resolves `header` to `/components/header.html`, reads it from a
//! two-tier cache or fetches it, injects it into the container, wires the
//! interactive bits the fragment carries, and reports progress as events.
//!
//! # Pipeline
//!
//! ```text
//! page.html ─► Page::parse ─► containers ─► ComponentLoader::load_all ─► Page::render
//!                                               │  (rayon fan-out)
//!                                               ├─► TieredCache (memory → persistent)
//!                                               ├─► FragmentSource (disk or HTTP)
//!                                               └─► LoaderEvent channel ─► Ready { count }
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`components`] | The loader: resolution, load lifecycle, post-processing, events |
//! | [`cache`] | Memory and time-boxed persistent tiers behind one `FragmentCache` trait |
//! | [`storage`] | `localStorage`-shaped key-value stores for the persistent tier |
//! | [`source`] | Where fragments come from: a site directory or an HTTP origin |
//! | [`page`] | Page documents, containers and their load state, rendering |
//! | [`markup`] | lol_html rewriting, with implied end tags made explicit first |
//! | [`interactions`] | Menu, scroll and anchor bindings; FAQ accordion, catalog filter and lazy images as library-only API |
//! | [`site`] | Whole-site build: walk pages, assemble, copy assets |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`clock`] | Injectable time source for cache timestamps and the current year |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Byte-Preserving Injection
//!
//! Pages are never re-serialized from a DOM. [`markup`] edits through a
//! streaming rewriter, so a fragment lands in its container exactly as
//! written and everything around it keeps its bytes. The one exception is an
//! end tag the page left implicit (`<li>` closing a previous `<li>`), which
//! is written out so a container ends where a browser would end it.
//!
//! ## Contained Failures
//!
//! A container that cannot be loaded shows a fixed error block and reports an
//! `Error` event; nothing propagates to sibling containers, and the page-wide
//! `Ready` event is always sent. There is no retry.
//!
//! ## Injected Cache, Clock and Source
//!
//! The loader holds trait objects for everything with state or I/O, so tests
//! drive expiry with a manual clock and count fetches with a mock source
//! instead of waiting on timers or a network.

pub mod cache;
pub mod clock;
pub mod components;
pub mod config;
pub mod interactions;
pub mod markup;
pub mod output;
pub mod page;
pub mod site;
pub mod source;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
