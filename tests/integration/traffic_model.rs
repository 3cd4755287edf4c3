//! Random provider traffic checked against a reference model of URI ownership.

use crate::support::{assert_mirrors, desc, RecordingListener};
use cfgdesc::{
    ApiError, ConfigDescriptionDirectory, ConfigDescriptionProvider, StaticDescriptionProvider,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

const PROVIDERS: usize = 3;
const URIS: usize = 5;

#[derive(Debug, Clone)]
enum Op {
    Add(usize, usize),
    Remove(usize, usize),
    Register(usize),
    Unregister(usize),
    AttachListener,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..PROVIDERS, 0..URIS).prop_map(|(p, u)| Op::Add(p, u)),
        2 => (0..PROVIDERS, 0..URIS).prop_map(|(p, u)| Op::Remove(p, u)),
        2 => (0..PROVIDERS).prop_map(Op::Register),
        1 => (0..PROVIDERS).prop_map(Op::Unregister),
        1 => Just(Op::AttachListener),
    ]
}

fn uri(index: usize) -> String {
    format!("thing-type://model:u{}", index)
}

/// Reference model: what each provider holds, who is registered, who owns what.
#[derive(Default)]
struct Model {
    content: HashMap<usize, Vec<String>>,
    registered: Vec<usize>,
    owner: HashMap<String, usize>,
}

impl Model {
    fn is_registered(&self, provider: usize) -> bool {
        self.registered.contains(&provider)
    }

    fn holds(&self, provider: usize, uri: &str) -> bool {
        self.content
            .get(&provider)
            .is_some_and(|c| c.iter().any(|u| u == uri))
    }

    fn publish(&mut self, provider: usize, uri: &str) {
        let content = self.content.entry(provider).or_default();
        if !content.iter().any(|u| u == uri) {
            content.push(uri.to_string());
        }
        if self.is_registered(provider) {
            self.owner.entry(uri.to_string()).or_insert(provider);
        }
    }

    fn withdraw(&mut self, provider: usize, uri: &str) {
        if let Some(content) = self.content.get_mut(&provider) {
            content.retain(|u| u != uri);
        }
        if self.is_registered(provider) {
            self.release(provider, uri);
        }
    }

    fn register(&mut self, provider: usize) {
        self.registered.push(provider);
        for uri in self.content.get(&provider).cloned().unwrap_or_default() {
            self.owner.entry(uri).or_insert(provider);
        }
    }

    fn unregister(&mut self, provider: usize) {
        self.registered.retain(|p| *p != provider);
        for uri in self.content.get(&provider).cloned().unwrap_or_default() {
            self.release(provider, &uri);
        }
    }

    /// Hand `uri` to the earliest registered provider still holding it.
    fn release(&mut self, provider: usize, uri: &str) {
        if self.owner.get(uri) != Some(&provider) {
            return;
        }
        self.owner.remove(uri);
        let successor = self
            .registered
            .iter()
            .copied()
            .find(|p| *p != provider && self.holds(*p, uri));
        if let Some(successor) = successor {
            self.owner.insert(uri.to_string(), successor);
        }
    }

    fn expected_list(&self) -> Vec<String> {
        self.registered
            .iter()
            .flat_map(|p| {
                self.content
                    .get(p)
                    .into_iter()
                    .flatten()
                    .filter(move |u| self.owner.get(*u) == Some(p))
                    .cloned()
            })
            .collect()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_directory_matches_ownership_model(
        ops in proptest::collection::vec(op_strategy(), 1..60)
    ) {
        let directory = ConfigDescriptionDirectory::new();
        let providers: Vec<Arc<StaticDescriptionProvider>> = (0..PROVIDERS)
            .map(|i| Arc::new(StaticDescriptionProvider::new(format!("p{}", i))))
            .collect();
        let handles: Vec<Arc<dyn ConfigDescriptionProvider>> = providers
            .iter()
            .map(|p| p.clone() as Arc<dyn ConfigDescriptionProvider>)
            .collect();

        let mut listeners = vec![RecordingListener::new()];
        directory.add_listener(listeners[0].clone()).unwrap();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Add(p, u) => {
                    providers[p].add(desc(&uri(u)));
                    model.publish(p, &uri(u));
                }
                Op::Remove(p, u) => {
                    let removed = providers[p].remove(&uri(u));
                    prop_assert_eq!(removed.is_some(), model.holds(p, &uri(u)));
                    model.withdraw(p, &uri(u));
                }
                Op::Register(p) => {
                    let result = directory.register_provider(handles[p].clone());
                    if model.is_registered(p) {
                        prop_assert!(matches!(result, Err(ApiError::DuplicateProvider(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        model.register(p);
                    }
                }
                Op::Unregister(p) => {
                    prop_assert_eq!(directory.unregister_provider(&handles[p]), model.is_registered(p));
                    model.unregister(p);
                }
                Op::AttachListener => {
                    let listener = RecordingListener::new();
                    directory.add_listener(listener.clone()).unwrap();
                    listeners.push(listener);
                }
            }

            let listed: Vec<String> = directory.list().iter().map(|d| d.uri().to_string()).collect();
            prop_assert_eq!(listed, model.expected_list());
        }

        for (uri, owner) in &model.owner {
            let live = directory.lookup(uri);
            prop_assert!(live.is_some());
            let expected = providers[*owner].get(uri);
            prop_assert!(Arc::ptr_eq(&live.unwrap(), &expected.unwrap()));
            let owner_name = format!("p{}", owner);
            prop_assert_eq!(directory.owner_of(uri), Some(owner_name));
        }
        for listener in &listeners {
            assert_mirrors(&directory, listener);
        }
        prop_assert_eq!(directory.stats().listener_failures, 0);
    }
}
