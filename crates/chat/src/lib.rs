//! Chat command dispatcher and event notifier.
//!
//! Inbound messages are split into words and matched against permission
//! tiered [`CommandGroup`]s. Handlers work on the shared
//! [`motifini_subscribe::SubscriptionStore`]; camera access goes through the
//! [`CameraDirectory`] and [`Capture`] traits so the transport layers stay
//! outside this crate.

pub mod camera;
pub mod command;
pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod notify;

pub use {
    camera::{CameraDirectory, Capture, NoCapture, StaticCameras},
    command::{Command, CommandGroup, Handler, Level, Reply, Request, handler},
    context::ChatContext,
    dispatcher::Dispatcher,
    error::{CommandError, Result},
    notify::{DEFAULT_REPEAT_DELAY, Notification, Notifier, Outbound},
};
