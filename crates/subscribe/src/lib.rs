//! Subscribers, their event subscriptions, and the global event registry.
//!
//! Everything lives in one [`SubscriptionStore`] that is shared between the
//! chat command handlers and the event notifier. State is persisted as a
//! single JSON document (see [`state_file`]).

pub mod clock;
pub mod error;
pub mod filter;
pub mod state_file;
pub mod store;
pub mod subscriber;

pub use {
    clock::{Clock, ManualClock, SystemClock},
    error::{Error, Result},
    filter::api_enabled,
    store::SubscriptionStore,
    subscriber::{DELAY_RULE, Rules, Subscriber, Subscription},
};
