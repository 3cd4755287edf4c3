//! In-memory provider holding a mutable set of descriptions.

use super::{ConfigDescriptionListener, ConfigDescriptionProvider};
use crate::description::ConfigDescription;
use crate::dispatch::{Dispatcher, ListenerSlot};
use crate::error::ApiError;
use crate::types::{instance_key, DescriptionEvent};
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Provider backed by an in-memory list of descriptions.
///
/// Descriptions keep insertion order. Adding a description whose URI is
/// already present replaces it in place and is published as a single `added`
/// event carrying the new description.
pub struct StaticDescriptionProvider {
    name: String,
    state: Mutex<ProviderState>,
    dispatcher: Dispatcher,
}

#[derive(Default)]
struct ProviderState {
    descriptions: Vec<Arc<ConfigDescription>>,
    listeners: Vec<Arc<ListenerSlot>>,
}

/// On-disk layout of a description file
#[derive(Deserialize)]
struct DescriptionFile {
    #[serde(default)]
    descriptions: Vec<ConfigDescription>,
}

impl StaticDescriptionProvider {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            dispatcher: Dispatcher::new(format!("provider:{}", name)),
            name,
            state: Mutex::new(ProviderState::default()),
        }
    }

    /// Create a provider pre-populated with `descriptions`.
    pub fn with_descriptions<I>(name: impl Into<String>, descriptions: I) -> Self
    where
        I: IntoIterator<Item = ConfigDescription>,
    {
        let provider = Self::new(name);
        {
            let mut state = provider.state.lock();
            for description in descriptions {
                upsert(&mut state.descriptions, Arc::new(description));
            }
        }
        provider
    }

    /// Parse a TOML document with a `[[descriptions]]` array.
    pub fn from_toml_str(name: impl Into<String>, content: &str) -> Result<Self, ApiError> {
        let file: DescriptionFile = toml::from_str(content)?;
        Ok(Self::with_descriptions(name, file.descriptions))
    }

    /// Load a description file; the provider is named after the path.
    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(path.display().to_string(), &content)
            .map_err(|e| ApiError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Publish a description. Returns the description it replaced, if any.
    pub fn add(
        &self,
        description: impl Into<Arc<ConfigDescription>>,
    ) -> Option<Arc<ConfigDescription>> {
        let description = description.into();
        let (replaced, ticket) = {
            let mut state = self.state.lock();
            let replaced = upsert(&mut state.descriptions, Arc::clone(&description));
            let ticket = self.dispatcher.enqueue(
                [DescriptionEvent::Added(description)],
                &state.listeners,
            );
            (replaced, ticket)
        };
        self.dispatcher.drain(ticket);
        replaced
    }

    /// Withdraw the description with `uri`, if present.
    pub fn remove(&self, uri: &str) -> Option<Arc<ConfigDescription>> {
        let (removed, ticket) = {
            let mut state = self.state.lock();
            let index = state.descriptions.iter().position(|d| d.uri() == uri)?;
            let removed = state.descriptions.remove(index);
            let ticket = self.dispatcher.enqueue(
                [DescriptionEvent::Removed(Arc::clone(&removed))],
                &state.listeners,
            );
            (removed, ticket)
        };
        self.dispatcher.drain(ticket);
        Some(removed)
    }

    pub fn get(&self, uri: &str) -> Option<Arc<ConfigDescription>> {
        self.state
            .lock()
            .descriptions
            .iter()
            .find(|d| d.uri() == uri)
            .cloned()
    }

    /// Snapshot of the current descriptions in insertion order
    pub fn descriptions(&self) -> Vec<Arc<ConfigDescription>> {
        self.state.lock().descriptions.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }
}

fn upsert(
    descriptions: &mut Vec<Arc<ConfigDescription>>,
    description: Arc<ConfigDescription>,
) -> Option<Arc<ConfigDescription>> {
    match descriptions.iter().position(|d| d.uri() == description.uri()) {
        Some(index) => Some(std::mem::replace(&mut descriptions[index], description)),
        None => {
            descriptions.push(description);
            None
        }
    }
}

impl ConfigDescriptionProvider for StaticDescriptionProvider {
    fn add_listener(&self, listener: Arc<dyn ConfigDescriptionListener>) {
        let ticket = {
            let mut state = self.state.lock();
            let key = instance_key(&listener);
            if state.listeners.iter().any(|slot| slot.key() == key) {
                debug!(provider = %self.name, listener = key, "Listener already attached");
                return;
            }
            let slot = ListenerSlot::new(listener);
            let replay: Vec<_> = state
                .descriptions
                .iter()
                .cloned()
                .map(DescriptionEvent::Added)
                .collect();
            let ticket = self.dispatcher.enqueue(replay, std::slice::from_ref(&slot));
            state.listeners.push(slot);
            ticket
        };
        self.dispatcher.drain(ticket);
    }

    fn remove_listener(&self, listener: &Arc<dyn ConfigDescriptionListener>) {
        let key = instance_key(listener);
        let slot = {
            let mut state = self.state.lock();
            match state.listeners.iter().position(|slot| slot.key() == key) {
                Some(index) => state.listeners.remove(index),
                None => return,
            }
        };
        slot.close();
    }

    fn name(&self) -> &str {
        &self.name
    }
}
