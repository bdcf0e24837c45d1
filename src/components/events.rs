//! Lifecycle events reported by the loader.
//!
//! Events are sent over an optional `std::sync::mpsc::Sender` so a caller
//! can print progress or sequence its own work (see [`LoaderEvent::Ready`])
//! while loads are still running.

use crate::page::ContainerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderEvent {
    /// A container started fetching its fragment.
    Loading { name: String, container: ContainerId },
    /// A container received its fragment and finished post-processing.
    Loaded { name: String, container: ContainerId },
    /// A container's load failed; it now shows the fallback block.
    Error {
        name: String,
        container: ContainerId,
        cause: String,
    },
    /// Every container on the page has settled. Sent once per page.
    Ready { count: usize },
}
