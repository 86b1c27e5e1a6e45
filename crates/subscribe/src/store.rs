//! The shared event registry and subscriber list.
//!
//! Lock order is always registry first, then an individual subscriber.
//! Subscriber methods only ever take their own lock, so nothing acquires
//! the registry while holding a subscriber.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use tracing::{debug, info};

use crate::{
    Error, Result,
    clock::{Clock, SystemClock},
    filter::api_enabled,
    state_file::{self, StateDocument, SubscriberRecord},
    subscriber::{Rules, Subscriber, SubscriberState, Subscription},
};

#[derive(Debug, Default)]
struct Registry {
    events: BTreeMap<String, Rules>,
    subscribers: Vec<Arc<Subscriber>>,
}

/// Events, subscribers, and the state file they persist to.
#[derive(Debug)]
pub struct SubscriptionStore {
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    registry: RwLock<Registry>,
    /// Held for the whole snapshot-and-write of [`save`](Self::save).
    save_lock: Mutex<()>,
}

impl SubscriptionStore {
    /// A store with no backing file. [`save`](Self::save) is a no-op.
    pub fn in_memory() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            path: None,
            clock,
            registry: RwLock::new(Registry::default()),
            save_lock: Mutex::new(()),
        }
    }

    /// Load state from `path`, creating the file when it does not exist.
    ///
    /// An empty path gives an in-memory store. Unreadable or corrupt state is
    /// an error; the caller must not carry on with an empty store in that case.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            debug!("no state file configured, subscribers will not be saved");
            return Ok(Self::with_clock(clock));
        }

        match state_file::read(path)? {
            Some(doc) => {
                let store = Self::from_document(doc, Some(path.to_path_buf()), clock);
                info!(
                    path = %path.display(),
                    events = store.event_count(),
                    subscribers = store.subscriber_count(),
                    "loaded state file"
                );
                Ok(store)
            },
            None => {
                let mut store = Self::with_clock(clock);
                store.path = Some(path.to_path_buf());
                store.save()?;
                info!(path = %path.display(), "created new state file");
                Ok(store)
            },
        }
    }

    fn from_document(doc: StateDocument, path: Option<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let subscribers = doc
            .subscribers
            .into_iter()
            .map(|mut record| {
                let subscriptions = record
                    .events
                    .into_iter()
                    .map(|(event, resume_at)| {
                        let rules = record.rules.remove(&event).unwrap_or_default();
                        (event, Subscription { resume_at, rules })
                    })
                    .collect();
                let state = SubscriberState {
                    admin: record.admin,
                    ignored: record.ignored,
                    subscriptions,
                };
                Arc::new(Subscriber::new(
                    record.api,
                    record.contact,
                    clock.clone(),
                    state,
                ))
            })
            .collect();

        Self {
            path,
            clock,
            registry: RwLock::new(Registry {
                events: doc.events,
                subscribers,
            }),
            save_lock: Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ── Persistence ────────────────────────────────────────────────────────

    /// Build the on-disk document from a consistent snapshot.
    pub fn to_document(&self) -> StateDocument {
        let registry = self.read();
        let subscribers = registry
            .subscribers
            .iter()
            .map(|sub| {
                let state = sub.read();
                let mut events = BTreeMap::new();
                let mut rules = BTreeMap::new();
                for (name, subscription) in &state.subscriptions {
                    events.insert(name.clone(), subscription.resume_at);
                    if !subscription.rules.is_empty() {
                        rules.insert(name.clone(), subscription.rules.clone());
                    }
                }
                SubscriberRecord {
                    api: sub.api().to_string(),
                    contact: sub.contact().to_string(),
                    events,
                    admin: state.admin,
                    ignored: state.ignored,
                    rules,
                }
            })
            .collect();

        StateDocument {
            events: registry.events.clone(),
            subscribers,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    /// Write the state file. Does nothing for an in-memory store.
    ///
    /// Saves are serialized, and each one snapshots the state after the
    /// previous write finished, so the file never goes backwards.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());
        let doc = self.to_document();
        state_file::write(path, &doc)
    }

    // ── Events ─────────────────────────────────────────────────────────────

    /// Snapshot of every event and its rules.
    pub fn events(&self) -> BTreeMap<String, Rules> {
        self.read().events.clone()
    }

    /// Event names in sorted order.
    pub fn event_names(&self) -> Vec<String> {
        self.read().events.keys().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.read().events.len()
    }

    pub fn event_exists(&self, name: &str) -> bool {
        self.read().events.contains_key(name)
    }

    pub fn get_event(&self, name: &str) -> Result<Rules> {
        self.read()
            .events
            .get(name)
            .cloned()
            .ok_or_else(|| Error::event_not_found(name))
    }

    pub fn event_rule(&self, name: &str, key: &str) -> Option<String> {
        self.read()
            .events
            .get(name)
            .and_then(|rules| rules.get(key).cloned())
    }

    /// Add an event, or merge `rules` into an existing one.
    ///
    /// When merging, an empty value deletes that rule. Returns `true` when
    /// the event was created.
    pub fn upsert_event(&self, name: &str, rules: Rules) -> bool {
        let mut registry = self.write();
        match registry.events.get_mut(name) {
            None => {
                let rules = rules.into_iter().filter(|(_, v)| !v.is_empty()).collect();
                registry.events.insert(name.to_string(), rules);
                true
            },
            Some(existing) => {
                for (key, value) in rules {
                    if value.is_empty() {
                        existing.remove(&key);
                    } else {
                        existing.insert(key, value);
                    }
                }
                false
            },
        }
    }

    /// Subscribe `sub` to the registered event `event`.
    ///
    /// The registry stays read-locked across the check and the insert, so a
    /// concurrent [`remove_event`](Self::remove_event) either runs first
    /// (and this fails with `EventNotFound`) or cascades over the new
    /// subscription.
    pub fn subscribe_to_event(&self, sub: &Subscriber, event: &str) -> Result<()> {
        let registry = self.read();
        if !registry.events.contains_key(event) {
            return Err(Error::event_not_found(event));
        }
        sub.subscribe(event)
    }

    /// Delete an event and every subscription to it. Returns the number of
    /// subscriptions removed.
    pub fn remove_event(&self, name: &str) -> usize {
        let mut registry = self.write();
        registry.events.remove(name);
        let removed = registry
            .subscribers
            .iter()
            .filter(|sub| sub.unsubscribe(name).is_ok())
            .count();
        debug!(event = name, removed, "removed event");
        removed
    }

    // ── Subscribers ────────────────────────────────────────────────────────

    /// Create a subscriber, or update the flags of an existing one.
    pub fn create_or_update_subscriber(
        &self,
        api: &str,
        contact: &str,
        admin: bool,
        ignored: bool,
    ) -> Arc<Subscriber> {
        let mut registry = self.write();
        if let Some(existing) = registry.subscribers.iter().find(|s| s.matches(api, contact)) {
            existing.set_flags(admin, ignored);
            return existing.clone();
        }

        let sub = Arc::new(Subscriber::new(
            api,
            contact,
            self.clock.clone(),
            SubscriberState {
                admin,
                ignored,
                ..Default::default()
            },
        ));
        registry.subscribers.push(sub.clone());
        debug!(api, contact, admin, "created subscriber");
        sub
    }

    /// Return the subscriber for `(api, contact)`, creating it if needed.
    ///
    /// A new subscriber becomes an admin when there are no admins yet. The
    /// boolean is `true` when the subscriber was created.
    pub fn get_or_create_subscriber(&self, api: &str, contact: &str) -> (Arc<Subscriber>, bool) {
        let mut registry = self.write();
        if let Some(existing) = registry.subscribers.iter().find(|s| s.matches(api, contact)) {
            return (existing.clone(), false);
        }

        let admin = !registry.subscribers.iter().any(|s| s.is_admin());
        let sub = Arc::new(Subscriber::new(
            api,
            contact,
            self.clock.clone(),
            SubscriberState {
                admin,
                ..Default::default()
            },
        ));
        registry.subscribers.push(sub.clone());
        (sub, true)
    }

    pub fn get_subscriber(&self, api: &str, contact: &str) -> Result<Arc<Subscriber>> {
        self.read()
            .subscribers
            .iter()
            .find(|s| s.matches(api, contact))
            .cloned()
            .ok_or_else(|| Error::subscriber_not_found(api, contact))
    }

    /// Every subscriber with this contact, across all APIs.
    pub fn find_by_contact(&self, contact: &str) -> Vec<Arc<Subscriber>> {
        self.filtered(|s| s.contact() == contact)
    }

    fn filtered(&self, keep: impl Fn(&Subscriber) -> bool) -> Vec<Arc<Subscriber>> {
        self.read()
            .subscribers
            .iter()
            .filter(|s| keep(s))
            .cloned()
            .collect()
    }

    pub fn admins(&self) -> Vec<Arc<Subscriber>> {
        self.filtered(Subscriber::is_admin)
    }

    pub fn admin_count(&self) -> usize {
        self.read()
            .subscribers
            .iter()
            .filter(|s| s.is_admin())
            .count()
    }

    pub fn ignored(&self) -> Vec<Arc<Subscriber>> {
        self.filtered(Subscriber::is_ignored)
    }

    pub fn all(&self) -> Vec<Arc<Subscriber>> {
        self.read().subscribers.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().subscribers.len()
    }

    /// Subscribers that should be notified about `event` right now.
    ///
    /// Excludes ignored subscribers, paused subscriptions, and APIs not in
    /// `enabled_apis` (see [`api_enabled`]).
    pub fn eligible_subscribers(&self, event: &str, enabled_apis: &[String]) -> Vec<Arc<Subscriber>> {
        let now = self.clock.now();
        self.filtered(|s| api_enabled(s.api(), enabled_apis) && s.wants(event, now))
    }
}
