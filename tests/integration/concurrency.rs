use crate::support::{assert_mirrors, desc, RecordingListener};
use cfgdesc::{
    ConfigDescription, ConfigDescriptionDirectory, ConfigDescriptionListener,
    ConfigDescriptionProvider, StaticDescriptionProvider,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PROVIDERS: usize = 4;
const ROUNDS: usize = 200;

/// URIs overlap across providers so that shadowing and promotion are exercised.
fn uri_for(provider: usize, round: usize) -> String {
    format!("thing-type://shared:{}", (round * 7 + provider * 3) % 16)
}

#[test]
fn test_concurrent_traffic_keeps_listeners_consistent() {
    let directory = ConfigDescriptionDirectory::new();
    let observer = RecordingListener::new();
    directory.add_listener(observer.clone()).unwrap();

    let providers: Vec<Arc<StaticDescriptionProvider>> = (0..PROVIDERS)
        .map(|i| Arc::new(StaticDescriptionProvider::new(format!("p{}", i))))
        .collect();
    for provider in &providers {
        directory.register_provider(provider.clone()).unwrap();
    }

    let mut handles = vec![];
    for (i, provider) in providers.iter().enumerate() {
        let provider = provider.clone();
        handles.push(thread::spawn(move || {
            for round in 0..ROUNDS {
                let uri = uri_for(i, round);
                if round % 3 == 2 {
                    provider.remove(&uri);
                } else {
                    provider.add(desc(&uri));
                }
                if round % 17 == 0 {
                    thread::yield_now();
                }
            }
        }));
    }

    // Listeners come and go while the providers publish
    let churned: Vec<Arc<RecordingListener>> =
        (0..8).map(|_| RecordingListener::new()).collect();
    for chunk in churned.chunks(2) {
        let directory = directory.clone();
        let chunk = chunk.to_vec();
        handles.push(thread::spawn(move || {
            for listener in chunk {
                let dyn_listener: Arc<dyn ConfigDescriptionListener> = listener;
                directory.add_listener(dyn_listener.clone()).unwrap();
                thread::yield_now();
                assert!(directory.remove_listener(&dyn_listener));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_mirrors(&directory, &observer);
    for listener in &churned {
        // A truncated stream must still be self-consistent
        listener.reconstructed();
    }

    let late = RecordingListener::new();
    directory.add_listener(late.clone()).unwrap();
    assert_mirrors(&directory, &late);
    assert_eq!(directory.stats().listeners, 2);
}

#[test]
fn test_concurrent_registration_and_unregistration() {
    let directory = ConfigDescriptionDirectory::new();
    let observer = RecordingListener::new();
    directory.add_listener(observer.clone()).unwrap();

    let stable = Arc::new(StaticDescriptionProvider::with_descriptions(
        "stable",
        (0..4).map(|i| desc(&format!("binding://b{}", i))),
    ));
    directory.register_provider(stable.clone()).unwrap();

    let mut handles = vec![];
    for i in 0..PROVIDERS {
        let directory = directory.clone();
        handles.push(thread::spawn(move || {
            let provider = Arc::new(StaticDescriptionProvider::with_descriptions(
                format!("transient{}", i),
                (0..6).map(|j| desc(&format!("binding://b{}", (i + j) % 8))),
            ));
            let as_dyn: Arc<dyn ConfigDescriptionProvider> = provider.clone();
            for round in 0..50 {
                directory.register_provider(as_dyn.clone()).unwrap();
                provider.add(desc(&format!("binding://b{}", (round + i) % 8)));
                assert!(directory.unregister_provider(&as_dyn));
            }
        }));
    }

    let publisher = {
        let stable = stable.clone();
        thread::spawn(move || {
            for round in 0..ROUNDS {
                let uri = format!("binding://b{}", round % 8);
                if round % 2 == 0 {
                    stable.add(desc(&uri));
                } else {
                    stable.remove(&uri);
                }
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    publisher.join().unwrap();

    assert_eq!(directory.stats().providers, 1);
    assert_eq!(directory.stats().shadowed, 0);
    assert_eq!(directory.list(), stable.descriptions());
    assert_mirrors(&directory, &observer);
}

/// Listener whose callbacks take a while, counting deliveries.
struct SlowListener {
    calls: AtomicUsize,
}

impl ConfigDescriptionListener for SlowListener {
    fn added(&self, _description: &Arc<ConfigDescription>) {
        thread::sleep(Duration::from_millis(1));
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn removed(&self, _description: &Arc<ConfigDescription>) {
        thread::sleep(Duration::from_millis(1));
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_remove_listener_from_another_thread_stops_delivery() {
    let directory = ConfigDescriptionDirectory::new();
    let provider = Arc::new(StaticDescriptionProvider::new("p"));
    directory.register_provider(provider.clone()).unwrap();

    let slow = Arc::new(SlowListener {
        calls: AtomicUsize::new(0),
    });
    let listener: Arc<dyn ConfigDescriptionListener> = slow.clone();
    directory.add_listener(listener.clone()).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let publisher = {
        let provider = provider.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut round = 0usize;
            while !stop.load(Ordering::SeqCst) && round < 10_000 {
                provider.add(desc(&format!("a://{}", round % 32)));
                round += 1;
            }
        })
    };

    while slow.calls.load(Ordering::SeqCst) < 5 {
        thread::yield_now();
    }
    assert!(directory.remove_listener(&listener));
    let delivered = slow.calls.load(Ordering::SeqCst);

    thread::sleep(Duration::from_millis(20));
    stop.store(true, Ordering::SeqCst);
    publisher.join().unwrap();

    assert_eq!(slow.calls.load(Ordering::SeqCst), delivered);
    assert_eq!(directory.stats().listeners, 0);
}

/// Listener that stalls on `a://busy`, keeping its publisher's drain occupied.
struct Stalling {
    entered: AtomicBool,
}

impl ConfigDescriptionListener for Stalling {
    fn added(&self, description: &Arc<ConfigDescription>) {
        if description.uri() == "a://busy" {
            self.entered.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
        }
    }

    fn removed(&self, _description: &Arc<ConfigDescription>) {}
}

#[test]
fn test_registration_completes_while_provider_busy_on_another_thread() {
    let provider = Arc::new(StaticDescriptionProvider::with_descriptions(
        "p",
        vec![desc("a://1")],
    ));
    let stalling = Arc::new(Stalling {
        entered: AtomicBool::new(false),
    });
    provider.add_listener(stalling.clone());

    let busy = {
        let provider = provider.clone();
        thread::spawn(move || {
            provider.add(desc("a://busy"));
        })
    };
    while !stalling.entered.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    let directory = ConfigDescriptionDirectory::new();
    let observer = RecordingListener::new();
    directory.add_listener(observer.clone()).unwrap();
    directory.register_provider(provider.clone()).unwrap();

    // The provider's full content is in place as soon as registration returns
    assert!(directory.lookup("a://1").is_some());
    assert!(directory.lookup("a://busy").is_some());
    assert_eq!(observer.events(), vec!["+a://1", "+a://busy"]);

    // A listener added to the busy provider gets its replay before returning
    busy.join().unwrap();
    stalling.entered.store(false, Ordering::SeqCst);
    let busy_again = {
        let provider = provider.clone();
        thread::spawn(move || {
            provider.add(desc("a://busy"));
        })
    };
    while !stalling.entered.load(Ordering::SeqCst) {
        thread::yield_now();
    }
    let late = RecordingListener::new();
    provider.add_listener(late.clone());
    assert_eq!(late.events(), vec!["+a://1", "+a://busy"]);

    busy_again.join().unwrap();
    assert_mirrors(&directory, &observer);
}
