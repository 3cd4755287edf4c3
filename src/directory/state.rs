//! Registry bookkeeping: providers, their contributions, and URI ownership.
//!
//! Everything here runs under the directory lock and never calls out to
//! providers or listeners; it only computes the events to publish.

use crate::description::ConfigDescription;
use crate::dispatch::ListenerSlot;
use crate::provider::{ConfigDescriptionListener, ConfigDescriptionProvider};
use crate::types::{DescriptionEvent, InstanceKey};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A registered provider and what it has told the directory.
pub(super) struct ProviderEntry {
    /// Registration sequence number; lower registered earlier
    pub(super) seq: u64,
    pub(super) key: InstanceKey,
    pub(super) name: String,
    pub(super) provider: Arc<dyn ConfigDescriptionProvider>,
    /// The listener the directory installed on the provider
    pub(super) subscription: Arc<dyn ConfigDescriptionListener>,
    /// Descriptions reported by the provider, live or shadowed, in insertion order
    contributions: Vec<Arc<ConfigDescription>>,
    /// Events buffered while the provider replays its initial content
    pending: Option<Vec<DescriptionEvent>>,
}

struct LiveEntry {
    owner: u64,
    description: Arc<ConfigDescription>,
}

pub(super) struct DirectoryState {
    pub(super) closed: bool,
    pub(super) listeners: Vec<Arc<ListenerSlot>>,
    next_seq: u64,
    /// Registration order
    providers: Vec<ProviderEntry>,
    /// URI -> live description and the provider owning it
    live: HashMap<String, LiveEntry>,
    warn_on_conflict: bool,
}

impl DirectoryState {
    pub(super) fn new(warn_on_conflict: bool) -> Self {
        Self {
            closed: false,
            listeners: Vec::new(),
            next_seq: 0,
            providers: Vec::new(),
            live: HashMap::new(),
            warn_on_conflict,
        }
    }

    pub(super) fn contains_provider(&self, key: InstanceKey) -> bool {
        self.providers.iter().any(|p| p.key == key)
    }

    pub(super) fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Add a provider in the registering phase: its events are buffered until
    /// [`DirectoryState::finish_registration`].
    pub(super) fn insert_provider(
        &mut self,
        seq: u64,
        key: InstanceKey,
        provider: Arc<dyn ConfigDescriptionProvider>,
        subscription: Arc<dyn ConfigDescriptionListener>,
    ) {
        self.providers.push(ProviderEntry {
            seq,
            key,
            name: provider.name().to_string(),
            provider,
            subscription,
            contributions: Vec::new(),
            pending: Some(Vec::new()),
        });
    }

    /// Commit everything buffered during registration.
    ///
    /// Returns `None` if the provider went away in the meantime.
    pub(super) fn finish_registration(&mut self, seq: u64) -> Option<Vec<DescriptionEvent>> {
        let index = self.index_of(seq)?;
        let buffered = self.providers[index].pending.take().unwrap_or_default();
        let mut events = Vec::new();
        for event in buffered {
            events.extend(self.apply(index, event));
        }
        Some(events)
    }

    /// Handle an event reported by the provider with `seq`.
    pub(super) fn on_event(&mut self, seq: u64, event: DescriptionEvent) -> Vec<DescriptionEvent> {
        let Some(index) = self.index_of(seq) else {
            debug!(
                provider_seq = seq,
                uri = event.description().uri(),
                "Ignoring event from unregistered provider"
            );
            return Vec::new();
        };
        if let Some(pending) = self.providers[index].pending.as_mut() {
            pending.push(event);
            return Vec::new();
        }
        self.apply(index, event)
    }

    /// Remove a provider, withdrawing everything it contributed.
    pub(super) fn remove_provider(
        &mut self,
        key: InstanceKey,
    ) -> Option<(ProviderEntry, Vec<DescriptionEvent>)> {
        let index = self.providers.iter().position(|p| p.key == key)?;
        let uris: Vec<String> = self.providers[index]
            .contributions
            .iter()
            .map(|d| d.uri().to_string())
            .collect();

        let mut events = Vec::new();
        for uri in &uris {
            events.extend(self.apply_removed(index, uri));
        }
        Some((self.providers.remove(index), events))
    }

    /// Close the state, handing back every provider and listener.
    pub(super) fn take_all(&mut self) -> (Vec<ProviderEntry>, Vec<Arc<ListenerSlot>>) {
        self.closed = true;
        self.live.clear();
        (
            std::mem::take(&mut self.providers),
            std::mem::take(&mut self.listeners),
        )
    }

    pub(super) fn lookup(&self, uri: &str) -> Option<Arc<ConfigDescription>> {
        self.live.get(uri).map(|live| Arc::clone(&live.description))
    }

    /// Live descriptions: provider registration order, then insertion order.
    pub(super) fn list(&self) -> Vec<Arc<ConfigDescription>> {
        self.providers
            .iter()
            .flat_map(|provider| {
                provider.contributions.iter().filter(move |d| {
                    self.live
                        .get(d.uri())
                        .is_some_and(|live| live.owner == provider.seq)
                })
            })
            .cloned()
            .collect()
    }

    pub(super) fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub(super) fn live_count(&self) -> usize {
        self.live.len()
    }

    pub(super) fn shadowed_count(&self) -> usize {
        let total: usize = self.providers.iter().map(|p| p.contributions.len()).sum();
        total - self.live.len()
    }

    /// Name of the provider currently owning `uri`
    pub(super) fn owner_of(&self, uri: &str) -> Option<&str> {
        let owner = self.live.get(uri)?.owner;
        self.index_of(owner).map(|i| self.providers[i].name.as_str())
    }

    fn index_of(&self, seq: u64) -> Option<usize> {
        self.providers.iter().position(|p| p.seq == seq)
    }

    fn apply(&mut self, index: usize, event: DescriptionEvent) -> Vec<DescriptionEvent> {
        match event {
            DescriptionEvent::Added(description) => self.apply_added(index, description),
            DescriptionEvent::Removed(description) => self.apply_removed(index, description.uri()),
        }
    }

    fn apply_added(
        &mut self,
        index: usize,
        description: Arc<ConfigDescription>,
    ) -> Vec<DescriptionEvent> {
        let uri = description.uri().to_string();
        let entry = &mut self.providers[index];
        let owner = entry.seq;
        match entry.contributions.iter().position(|d| d.uri() == uri) {
            Some(i) => entry.contributions[i] = Arc::clone(&description),
            None => entry.contributions.push(Arc::clone(&description)),
        }

        match self.live.get_mut(&uri) {
            None => {
                self.live.insert(
                    uri,
                    LiveEntry {
                        owner,
                        description: Arc::clone(&description),
                    },
                );
                vec![DescriptionEvent::Added(description)]
            }
            Some(live) if live.owner == owner => {
                let previous = std::mem::replace(&mut live.description, Arc::clone(&description));
                vec![
                    DescriptionEvent::Removed(previous),
                    DescriptionEvent::Added(description),
                ]
            }
            Some(live) => {
                let holder = live.owner;
                let holder_name = self
                    .index_of(holder)
                    .map(|i| self.providers[i].name.as_str())
                    .unwrap_or("unknown");
                let shadowed_by = self.providers[index].name.as_str();
                if self.warn_on_conflict {
                    warn!(
                        uri = %uri,
                        owner = %holder_name,
                        shadowed_by = %shadowed_by,
                        "URI already provided, description shadowed"
                    );
                } else {
                    debug!(
                        uri = %uri,
                        owner = %holder_name,
                        shadowed_by = %shadowed_by,
                        "URI already provided, description shadowed"
                    );
                }
                Vec::new()
            }
        }
    }

    fn apply_removed(&mut self, index: usize, uri: &str) -> Vec<DescriptionEvent> {
        let entry = &mut self.providers[index];
        let owner = entry.seq;
        let Some(position) = entry.contributions.iter().position(|d| d.uri() == uri) else {
            debug!(uri = %uri, provider = %entry.name, "Ignoring removal of unknown description");
            return Vec::new();
        };
        entry.contributions.remove(position);

        if !self.live.get(uri).is_some_and(|live| live.owner == owner) {
            debug!(uri = %uri, "Discarded shadowed description");
            return Vec::new();
        }
        let Some(previous) = self.live.remove(uri) else {
            return Vec::new();
        };

        let mut events = vec![DescriptionEvent::Removed(previous.description)];
        let successor = self.providers.iter().find_map(|provider| {
            provider
                .contributions
                .iter()
                .find(|d| d.uri() == uri)
                .map(|d| (provider.seq, Arc::clone(d)))
        });
        if let Some((owner, description)) = successor {
            debug!(uri = %uri, provider_seq = owner, "Promoted shadowed description");
            self.live.insert(
                uri.to_string(),
                LiveEntry {
                    owner,
                    description: Arc::clone(&description),
                },
            );
            events.push(DescriptionEvent::Added(description));
        }
        events
    }
}
