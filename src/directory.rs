//! Config Description Directory
//!
//! Aggregates the descriptions of a dynamically changing set of providers and
//! republishes a deduplicated add/remove stream to any number of listeners.
//!
//! - Registering a provider subscribes the directory to it; the provider's
//!   initial content is committed in one step once its replay completes.
//! - Unregistering a provider withdraws everything it contributed.
//! - When two providers publish the same URI the first one wins; the later
//!   description is shadowed and promoted once the winner withdraws it.
//! - A new listener is replayed the current aggregate before it sees live
//!   events; no event is delivered to it twice or skipped.
//! - Listener callbacks run outside the directory lock, in commit order, and a
//!   panicking listener does not affect the others.

mod state;

use crate::description::ConfigDescription;
use crate::dispatch::{Dispatcher, ListenerSlot};
use crate::error::ApiError;
use crate::provider::{ConfigDescriptionListener, ConfigDescriptionProvider};
use crate::types::{instance_key, DescriptionEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use state::DirectoryState;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Directory settings, loaded from the `[directory]` config section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// Instance name used in log fields
    #[serde(default = "default_name")]
    pub name: String,

    /// Log URI conflicts at `warn` instead of `debug`
    #[serde(default = "default_true")]
    pub warn_on_conflict: bool,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            warn_on_conflict: default_true(),
        }
    }
}

/// Point-in-time counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub providers: usize,
    pub listeners: usize,
    /// Live descriptions in the aggregate
    pub descriptions: usize,
    /// Descriptions hidden behind another provider's URI
    pub shadowed: usize,
    /// Listener callbacks that panicked since construction
    pub listener_failures: u64,
}

struct DirectoryInner {
    settings: DirectorySettings,
    state: Mutex<DirectoryState>,
    dispatcher: Dispatcher,
}

impl DirectoryInner {
    fn on_provider_event(&self, seq: u64, event: DescriptionEvent) {
        let ticket = {
            let mut state = self.state.lock();
            let events = state.on_event(seq, event);
            self.dispatcher.enqueue(events, &state.listeners)
        };
        self.dispatcher.drain(ticket);
    }
}

/// The listener the directory installs on each registered provider.
struct ProviderSubscription {
    directory: Weak<DirectoryInner>,
    seq: u64,
}

impl ProviderSubscription {
    fn forward(&self, event: DescriptionEvent) {
        if let Some(directory) = self.directory.upgrade() {
            directory.on_provider_event(self.seq, event);
        }
    }
}

impl ConfigDescriptionListener for ProviderSubscription {
    fn added(&self, description: &Arc<ConfigDescription>) {
        self.forward(DescriptionEvent::Added(Arc::clone(description)));
    }

    fn removed(&self, description: &Arc<ConfigDescription>) {
        self.forward(DescriptionEvent::Removed(Arc::clone(description)));
    }
}

/// Registry of description providers and listeners.
///
/// Cloning yields another handle to the same directory.
#[derive(Clone)]
pub struct ConfigDescriptionDirectory {
    inner: Arc<DirectoryInner>,
}

impl ConfigDescriptionDirectory {
    pub fn new() -> Self {
        Self::with_settings(DirectorySettings::default())
    }

    pub fn with_settings(settings: DirectorySettings) -> Self {
        Self {
            inner: Arc::new(DirectoryInner {
                dispatcher: Dispatcher::new(format!("directory:{}", settings.name)),
                state: Mutex::new(DirectoryState::new(settings.warn_on_conflict)),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &DirectorySettings {
        &self.inner.settings
    }

    /// Subscribe to `provider` and fold its descriptions into the aggregate.
    ///
    /// Fails with [`ApiError::DuplicateProvider`] if the same instance is
    /// already registered and with [`ApiError::DirectoryClosed`] after
    /// [`shutdown`](Self::shutdown).
    pub fn register_provider(
        &self,
        provider: Arc<dyn ConfigDescriptionProvider>,
    ) -> Result<(), ApiError> {
        let key = instance_key(&provider);
        let (seq, subscription) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(ApiError::DirectoryClosed);
            }
            if state.contains_provider(key) {
                return Err(ApiError::DuplicateProvider(provider.name().to_string()));
            }
            let seq = state.allocate_seq();
            let subscription: Arc<dyn ConfigDescriptionListener> =
                Arc::new(ProviderSubscription {
                    directory: Arc::downgrade(&self.inner),
                    seq,
                });
            state.insert_provider(seq, key, Arc::clone(&provider), Arc::clone(&subscription));
            (seq, subscription)
        };

        // The provider replays its content into the subscription before
        // returning; those events are buffered by the state.
        provider.add_listener(Arc::clone(&subscription));

        let committed = {
            let mut state = self.inner.state.lock();
            state.finish_registration(seq).map(|events| {
                let count = events.len();
                (count, self.inner.dispatcher.enqueue(events, &state.listeners))
            })
        };

        match committed {
            Some((events, ticket)) => {
                self.inner.dispatcher.drain(ticket);
                info!(
                    directory = %self.inner.settings.name,
                    provider = %provider.name(),
                    events,
                    "Registered description provider"
                );
            }
            None => {
                // Unregistered (or shut down) before the subscription was
                // installed, so nobody else will detach it.
                provider.remove_listener(&subscription);
                debug!(
                    directory = %self.inner.settings.name,
                    provider = %provider.name(),
                    "Provider unregistered while registering"
                );
            }
        }
        Ok(())
    }

    /// Unsubscribe from `provider` and withdraw everything it contributed.
    ///
    /// Returns `false` if the provider was not registered.
    pub fn unregister_provider(&self, provider: &Arc<dyn ConfigDescriptionProvider>) -> bool {
        let key = instance_key(provider);
        let (entry, ticket) = {
            let mut state = self.inner.state.lock();
            let Some((entry, events)) = state.remove_provider(key) else {
                return false;
            };
            let ticket = self.inner.dispatcher.enqueue(events, &state.listeners);
            (entry, ticket)
        };

        entry.provider.remove_listener(&entry.subscription);
        self.inner.dispatcher.drain(ticket);

        info!(
            directory = %self.inner.settings.name,
            provider = %entry.name,
            "Unregistered description provider"
        );
        true
    }

    /// Replay the current aggregate to `listener`, then deliver live events.
    ///
    /// The replay has been delivered when this returns. Called from inside a
    /// listener callback while another thread is delivering, the replay is
    /// left to that thread and may arrive after this returns.
    ///
    /// Fails with [`ApiError::DuplicateListener`] if the same instance is
    /// already registered and with [`ApiError::DirectoryClosed`] after
    /// [`shutdown`](Self::shutdown).
    pub fn add_listener(&self, listener: Arc<dyn ConfigDescriptionListener>) -> Result<(), ApiError> {
        let key = instance_key(&listener);
        let ticket = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(ApiError::DirectoryClosed);
            }
            if state.listeners.iter().any(|slot| slot.key() == key) {
                return Err(ApiError::DuplicateListener(format!("{:#x}", key)));
            }

            let slot = ListenerSlot::new(listener);
            let replay: Vec<_> = state
                .list()
                .into_iter()
                .map(DescriptionEvent::Added)
                .collect();
            debug!(
                directory = %self.inner.settings.name,
                listener = key,
                replayed = replay.len(),
                "Adding listener"
            );
            let ticket = self
                .inner
                .dispatcher
                .enqueue(replay, std::slice::from_ref(&slot));
            state.listeners.push(slot);
            ticket
        };
        self.inner.dispatcher.drain(ticket);
        Ok(())
    }

    /// Stop delivering to `listener` and release it.
    ///
    /// No callback starts after this returns; a callback already running on
    /// another thread is waited for. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn ConfigDescriptionListener>) -> bool {
        let key = instance_key(listener);
        let slot = {
            let mut state = self.inner.state.lock();
            match state.listeners.iter().position(|slot| slot.key() == key) {
                Some(index) => state.listeners.remove(index),
                None => return false,
            }
        };
        slot.close();
        debug!(directory = %self.inner.settings.name, listener = key, "Removed listener");
        true
    }

    /// Live description for `uri`
    pub fn lookup(&self, uri: &str) -> Option<Arc<ConfigDescription>> {
        self.inner.state.lock().lookup(uri)
    }

    /// All live descriptions, ordered by provider registration then insertion
    pub fn list(&self) -> Vec<Arc<ConfigDescription>> {
        self.inner.state.lock().list()
    }

    /// Name of the provider whose description is live for `uri`
    pub fn owner_of(&self, uri: &str) -> Option<String> {
        self.inner.state.lock().owner_of(uri).map(str::to_string)
    }

    pub fn stats(&self) -> DirectoryStats {
        let state = self.inner.state.lock();
        DirectoryStats {
            providers: state.provider_count(),
            listeners: state.listeners.len(),
            descriptions: state.live_count(),
            shadowed: state.shadowed_count(),
            listener_failures: self.inner.dispatcher.failures(),
        }
    }

    /// Release every provider subscription and drop every listener.
    ///
    /// No removal events are emitted. Later registrations fail with
    /// [`ApiError::DirectoryClosed`]. Calling it again is a no-op.
    pub fn shutdown(&self) {
        let (providers, listeners) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.take_all()
        };

        for slot in &listeners {
            slot.close();
        }
        for entry in &providers {
            entry.provider.remove_listener(&entry.subscription);
        }

        info!(
            directory = %self.inner.settings.name,
            providers = providers.len(),
            listeners = listeners.len(),
            "Directory shut down"
        );
    }
}

impl Default for ConfigDescriptionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// A directory is itself a provider, so directories can be stacked.
impl ConfigDescriptionProvider for ConfigDescriptionDirectory {
    fn add_listener(&self, listener: Arc<dyn ConfigDescriptionListener>) {
        if let Err(e) = ConfigDescriptionDirectory::add_listener(self, listener) {
            warn!(directory = %self.inner.settings.name, "Listener not added: {}", e);
        }
    }

    fn remove_listener(&self, listener: &Arc<dyn ConfigDescriptionListener>) {
        ConfigDescriptionDirectory::remove_listener(self, listener);
    }

    fn name(&self) -> &str {
        &self.inner.settings.name
    }
}
