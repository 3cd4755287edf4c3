//! Description Providers
//!
//! A provider is a source of [`ConfigDescription`]s that may appear and
//! disappear at runtime. Consumers attach a [`ConfigDescriptionListener`] to a
//! provider and are told about every description it holds and every later
//! change.
//!
//! Contract for implementors of [`ConfigDescriptionProvider`]:
//! - `add_listener` must report every description that exists at that moment
//!   as `added` before returning, and before any later event reaches the
//!   listener;
//! - after `remove_listener` returns, the listener must not be called again and
//!   the provider must release its reference to it.

mod memory;

pub use memory::StaticDescriptionProvider;

use crate::description::ConfigDescription;
use std::sync::Arc;

/// Receives description add/remove events.
///
/// Callbacks may be slow and may call back into the publisher (including
/// removing themselves). A panicking callback is isolated by the publisher and
/// does not affect other listeners.
pub trait ConfigDescriptionListener: Send + Sync {
    fn added(&self, description: &Arc<ConfigDescription>);

    fn removed(&self, description: &Arc<ConfigDescription>);
}

/// Capability supplying zero or more descriptions over time.
///
/// Listener identity is the `Arc` allocation: pass the same `Arc` (or a clone
/// of it) to `remove_listener` that was passed to `add_listener`.
pub trait ConfigDescriptionProvider: Send + Sync {
    fn add_listener(&self, listener: Arc<dyn ConfigDescriptionListener>);

    fn remove_listener(&self, listener: &Arc<dyn ConfigDescriptionListener>);

    /// Human readable name, used in logs
    fn name(&self) -> &str {
        "anonymous"
    }
}
