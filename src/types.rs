//! Core types shared by providers and the directory.

use crate::description::ConfigDescription;
use std::sync::Arc;

/// Identity of a registered capability: the address of its `Arc` allocation.
///
/// Two clones of the same `Arc` share a key; two separately allocated values
/// never do while both are alive.
pub type InstanceKey = usize;

/// Compute the [`InstanceKey`] of a shared capability
pub fn instance_key<T: ?Sized>(instance: &Arc<T>) -> InstanceKey {
    Arc::as_ptr(instance) as *const () as usize
}

/// Add/remove event carried from a publisher to its listeners
#[derive(Debug, Clone)]
pub enum DescriptionEvent {
    Added(Arc<ConfigDescription>),
    Removed(Arc<ConfigDescription>),
}

impl DescriptionEvent {
    pub fn description(&self) -> &Arc<ConfigDescription> {
        match self {
            DescriptionEvent::Added(d) | DescriptionEvent::Removed(d) => d,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DescriptionEvent::Added(_) => "added",
            DescriptionEvent::Removed(_) => "removed",
        }
    }
}
