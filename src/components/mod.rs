//! The component loader.
//!
//! Resolves named HTML fragments, injects them into page containers, and
//! reports each container's lifecycle as [`LoaderEvent`]s.
//!
//! ## Loading one container
//!
//! ```text
//! name absent/empty ──► warn, Skipped
//! name ──► Loading event ──► busy ──► cache? ──hit──────────┐
//!                                      │miss                │
//!                                      ▼                    ▼
//!                               source.fetch ──ok──► cache.set ──► post-process ──► Loaded event
//!                                      │err
//!                                      ▼
//!                               fallback block ──► Error event
//! ```
//!
//! [`ComponentLoader::load_component`] never returns an error: every failure
//! is contained in its container and surfaced through the fallback block and
//! the `Error` event. There is no retry; loading again re-fetches unless the
//! cache holds a valid entry.
//!
//! ## Loading a page
//!
//! [`ComponentLoader::load_all`] fans out one load per container on the rayon
//! pool and joins them, so a page takes as long as its slowest fragment. Once
//! every container has settled it sends a single `Ready { count }`, even when
//! some loads failed or the page has no containers at all.

pub mod events;
pub mod postprocess;

pub use events::LoaderEvent;

use crate::cache::{FragmentCache, MemoryCache, PersistentCache, TieredCache};
use crate::clock::{Clock, SystemClock};
use crate::config::{ComponentsConfig, SiteConfig};
use crate::interactions::{AnchorLink, AnchorScroller, Layout};
use crate::page::{Container, Page};
use crate::source::{FetchError, FragmentSource};
use crate::storage::Storage;
use maud::html;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid component name: {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// A component name resolved to its fragment path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub name: String,
    /// Site path of the fragment, e.g. `/components/header.html`.
    pub path: String,
    pub extension: String,
}

impl ComponentRef {
    /// Names that could leave the components directory are rejected.
    pub fn resolve(name: &str, config: &ComponentsConfig) -> Result<Self, LoadError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(LoadError::InvalidName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            path: format!("{}{}{}", config.path, name, config.extension),
            extension: config.extension.clone(),
        })
    }
}

/// Fragment HTML as returned by [`ComponentLoader::fetch_component`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub html: String,
    /// Served from the cache rather than the source.
    pub cached: bool,
}

/// Result of loading one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The container declares no component name.
    Skipped,
    Loaded { cached: bool },
    Failed { cause: String },
}

/// Tally of one page's load outcomes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// Every container discovered, including skipped ones.
    pub count: usize,
    pub loaded: usize,
    /// Subset of `loaded` served from the cache.
    pub cached: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl LoadSummary {
    pub fn record(&mut self, outcome: &LoadOutcome) {
        self.count += 1;
        match outcome {
            LoadOutcome::Skipped => self.skipped += 1,
            LoadOutcome::Loaded { cached } => {
                self.loaded += 1;
                if *cached {
                    self.cached += 1;
                }
            }
            LoadOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &LoadSummary) {
        self.count += other.count;
        self.loaded += other.loaded;
        self.cached += other.cached;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

impl<'a> FromIterator<&'a LoadOutcome> for LoadSummary {
    fn from_iter<I: IntoIterator<Item = &'a LoadOutcome>>(iter: I) -> Self {
        let mut summary = Self::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} loaded", self.loaded)?;
        if self.cached > 0 {
            write!(f, " ({} cached)", self.cached)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        write!(f, " ({} total)", self.count)
    }
}

/// Markup shown in place of a fragment that could not be loaded.
pub fn fallback_markup() -> String {
    html! {
        div.component-error role="alert" {
            p { "Error loading component. Please refresh the page." }
        }
    }
    .into_string()
}

/// Loads fragments into containers.
///
/// Shared by reference across the rayon pool during [`load_all`](Self::load_all);
/// everything it holds is `Sync`.
pub struct ComponentLoader {
    source: Arc<dyn FragmentSource>,
    cache: Option<Arc<dyn FragmentCache>>,
    clock: Arc<dyn Clock>,
    events: Option<Sender<LoaderEvent>>,
    scroller: AnchorScroller,
    config: SiteConfig,
}

impl ComponentLoader {
    /// A loader with no cache, the system clock, and no event channel.
    pub fn new(source: Arc<dyn FragmentSource>, config: &SiteConfig) -> Self {
        Self {
            source,
            cache: None,
            clock: Arc::new(SystemClock),
            events: None,
            scroller: AnchorScroller::new(),
            config: config.clone(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn FragmentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Cache through a memory tier in front of `storage`, using the prefix and
    /// duration from `[cache]`. Does nothing when caching is disabled.
    ///
    /// The persistent tier timestamps with the loader's clock at the time of
    /// this call, so set a custom clock first.
    pub fn with_storage(self, storage: Arc<dyn Storage>) -> Self {
        if !self.config.cache.enabled {
            debug!("component cache disabled");
            return self;
        }
        let persistent = PersistentCache::new(
            storage,
            self.config.cache.prefix.clone(),
            self.config.cache.duration(),
            self.clock.clone(),
        );
        let cache = Arc::new(TieredCache::new(MemoryCache::new(), persistent));
        self.with_cache(cache)
    }

    pub fn with_events(mut self, events: Sender<LoaderEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn emit(&self, event: LoaderEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is listening.
            let _ = tx.send(event);
        }
    }

    /// Resolve `name` and return its HTML, from the cache when possible.
    ///
    /// A successful fetch is written to the cache.
    pub fn fetch_component(&self, name: &str) -> Result<Fragment, LoadError> {
        let component = ComponentRef::resolve(name, &self.config.components)?;

        if let Some(cache) = &self.cache
            && let Some(html) = cache.get(name)
        {
            return Ok(Fragment { html, cached: true });
        }

        debug!(component = name, path = %component.path, "fetching");
        let html = self.source.fetch(&component.path)?;
        if let Some(cache) = &self.cache {
            cache.set(name, &html);
        }
        Ok(Fragment {
            html,
            cached: false,
        })
    }

    /// Load the fragment a container declares and inject it.
    pub fn load_component(&self, container: &mut Container) -> LoadOutcome {
        let id = container.id();
        let name = match container.name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                warn!(container = %id, "container has no component name");
                return LoadOutcome::Skipped;
            }
        };

        self.emit(LoaderEvent::Loading {
            name: name.clone(),
            container: id,
        });
        container.begin_loading();

        match self.fetch_component(&name) {
            Ok(fragment) => {
                let processed = postprocess::process(
                    &name,
                    &fragment.html,
                    self.clock.now(),
                    f64::from(self.config.header.scroll_threshold),
                );
                container.finish(processed.html, processed.bindings);
                self.emit(LoaderEvent::Loaded {
                    name,
                    container: id,
                });
                LoadOutcome::Loaded {
                    cached: fragment.cached,
                }
            }
            Err(e) => {
                let cause = e.to_string();
                error!(component = %name, container = %id, error = %cause, "error loading component");
                container.fail(fallback_markup());
                self.emit(LoaderEvent::Error {
                    name,
                    container: id,
                    cause: cause.clone(),
                });
                LoadOutcome::Failed { cause }
            }
        }
    }

    /// Load every container on `page` concurrently, then send `Ready`.
    pub fn load_all(&self, page: &mut Page) -> LoadSummary {
        let outcomes: Vec<LoadOutcome> = page
            .containers_mut()
            .par_iter_mut()
            .map(|container| self.load_component(container))
            .collect();

        let summary: LoadSummary = outcomes.iter().collect();
        self.emit(LoaderEvent::Ready {
            count: summary.count,
        });
        debug!(%summary, "components ready");
        summary
    }

    /// Empty both cache tiers. Persistent keys outside the configured prefix
    /// are left alone.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
            debug!("component cache cleared");
        }
    }

    /// Scroll offset for following an anchor link, below the sticky header.
    pub fn scroll_target(&self, link: &AnchorLink, layout: &dyn Layout) -> Option<f64> {
        self.scroller.scroll_target(link, layout)
    }
}
