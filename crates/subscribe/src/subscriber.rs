//! A single chat identity and its event subscriptions.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};

use crate::{
    Error, Result,
    clock::{Clock, add_duration},
};

/// Free-form string rules attached to events and subscriptions.
pub type Rules = BTreeMap<String, String>;

/// Subscription rule holding the minimum number of seconds between two
/// notifications for the same event.
pub const DELAY_RULE: &str = "delay";

/// One subscriber's link to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Notifications are suppressed until this instant.
    pub resume_at: DateTime<Utc>,
    pub rules: Rules,
}

impl Subscription {
    pub fn new(resume_at: DateTime<Utc>) -> Self {
        Self {
            resume_at,
            rules: Rules::new(),
        }
    }

    #[must_use]
    pub fn is_paused_at(&self, now: DateTime<Utc>) -> bool {
        self.resume_at > now
    }
}

#[derive(Debug, Default)]
pub(crate) struct SubscriberState {
    pub(crate) admin: bool,
    pub(crate) ignored: bool,
    pub(crate) subscriptions: BTreeMap<String, Subscription>,
}

/// A chat identity, keyed by `(api, contact)`.
///
/// Handles are shared (`Arc<Subscriber>`); every accessor takes this
/// subscriber's own lock, so callers never observe a half-applied update.
#[derive(Debug)]
pub struct Subscriber {
    api: String,
    contact: String,
    clock: Arc<dyn Clock>,
    state: RwLock<SubscriberState>,
}

impl Subscriber {
    pub(crate) fn new(
        api: impl Into<String>,
        contact: impl Into<String>,
        clock: Arc<dyn Clock>,
        state: SubscriberState,
    ) -> Self {
        Self {
            api: api.into(),
            contact: contact.into(),
            clock,
            state: RwLock::new(state),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SubscriberState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SubscriberState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub(crate) fn matches(&self, api: &str, contact: &str) -> bool {
        self.api == api && self.contact == contact
    }

    // ── Flags ──────────────────────────────────────────────────────────────

    pub fn is_admin(&self) -> bool {
        self.read().admin
    }

    pub fn is_ignored(&self) -> bool {
        self.read().ignored
    }

    pub fn set_admin(&self, admin: bool) {
        self.write().admin = admin;
    }

    pub fn set_ignored(&self, ignored: bool) {
        self.write().ignored = ignored;
    }

    /// Ignore this subscriber. Ignored subscribers also lose admin access.
    pub fn ignore(&self) {
        let mut state = self.write();
        state.ignored = true;
        state.admin = false;
    }

    pub(crate) fn set_flags(&self, admin: bool, ignored: bool) {
        let mut state = self.write();
        state.admin = admin;
        state.ignored = ignored;
    }

    // ── Subscriptions ──────────────────────────────────────────────────────

    /// Start receiving notifications for `event`, effective immediately.
    pub fn subscribe(&self, event: &str) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.write();
        if state.subscriptions.contains_key(event) {
            return Err(Error::event_exists(event));
        }
        state
            .subscriptions
            .insert(event.to_string(), Subscription::new(now));
        Ok(())
    }

    pub fn unsubscribe(&self, event: &str) -> Result<()> {
        match self.write().subscriptions.remove(event) {
            Some(_) => Ok(()),
            None => Err(Error::event_not_found(event)),
        }
    }

    /// Drop every subscription. Returns how many were removed.
    pub fn unsubscribe_all(&self) -> usize {
        let mut state = self.write();
        let count = state.subscriptions.len();
        state.subscriptions.clear();
        count
    }

    /// Suppress `event` for `duration`. A zero duration resumes it now.
    pub fn pause(&self, event: &str, duration: Duration) -> Result<()> {
        let resume_at = add_duration(self.clock.now(), duration);
        let mut state = self.write();
        let sub = state
            .subscriptions
            .get_mut(event)
            .ok_or_else(|| Error::event_not_found(event))?;
        sub.resume_at = resume_at;
        Ok(())
    }

    /// Pause every subscription. Returns how many were paused.
    pub fn pause_all(&self, duration: Duration) -> usize {
        let resume_at = add_duration(self.clock.now(), duration);
        let mut state = self.write();
        for sub in state.subscriptions.values_mut() {
            sub.resume_at = resume_at;
        }
        state.subscriptions.len()
    }

    /// Snapshot of all subscriptions.
    pub fn subscriptions(&self) -> BTreeMap<String, Subscription> {
        self.read().subscriptions.clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.read().subscriptions.len()
    }

    pub fn is_subscribed(&self, event: &str) -> bool {
        self.read().subscriptions.contains_key(event)
    }

    /// Find the stored name of a subscription, ignoring case.
    pub fn subscription_name(&self, query: &str) -> Option<String> {
        let state = self.read();
        if state.subscriptions.contains_key(query) {
            return Some(query.to_string());
        }
        state
            .subscriptions
            .keys()
            .find(|name| name.eq_ignore_ascii_case(query))
            .cloned()
    }

    pub fn resume_at(&self, event: &str) -> Option<DateTime<Utc>> {
        self.read().subscriptions.get(event).map(|s| s.resume_at)
    }

    /// Time left until `event` resumes, or `None` when it is not paused.
    pub fn paused_for(&self, event: &str) -> Option<Duration> {
        let now = self.clock.now();
        let resume_at = self.resume_at(event)?;
        if resume_at <= now {
            return None;
        }
        (resume_at - now).to_std().ok()
    }

    pub fn is_paused(&self, event: &str) -> bool {
        self.paused_for(event).is_some()
    }

    /// Set a rule on an existing subscription. An empty value deletes it.
    pub fn set_rule(&self, event: &str, key: &str, value: &str) -> Result<()> {
        let mut state = self.write();
        let sub = state
            .subscriptions
            .get_mut(event)
            .ok_or_else(|| Error::event_not_found(event))?;
        if value.is_empty() {
            sub.rules.remove(key);
        } else {
            sub.rules.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn get_rule(&self, event: &str, key: &str) -> Option<String> {
        self.read()
            .subscriptions
            .get(event)
            .and_then(|s| s.rules.get(key).cloned())
    }

    /// The repeat delay for `event`, stored as whole seconds.
    pub fn delay(&self, event: &str) -> Option<Duration> {
        self.get_rule(event, DELAY_RULE)?
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    pub fn set_delay(&self, event: &str, delay: Duration) -> Result<()> {
        self.set_rule(event, DELAY_RULE, &delay.as_secs().to_string())
    }

    /// Whether `event` should notify at `now`.
    pub(crate) fn wants(&self, event: &str, now: DateTime<Utc>) -> bool {
        let state = self.read();
        !state.ignored
            && state
                .subscriptions
                .get(event)
                .is_some_and(|sub| !sub.is_paused_at(now))
    }
}
