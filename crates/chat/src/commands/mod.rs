//! Built-in command groups.

mod admin;
mod user;

use std::{fmt::Write, future::Future, sync::Arc, time::Duration};

use motifini_subscribe::Subscriber;

use crate::{
    Result,
    command::{Handler, Reply, Request, handler},
    context::ChatContext,
};

pub use {admin::admin_commands, user::user_commands};

/// Bind a command function to the shared context.
fn bind<F, Fut>(ctx: &Arc<ChatContext>, f: F) -> Handler
where
    F: Fn(Arc<ChatContext>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    let ctx = ctx.clone();
    handler(move |req| f(ctx.clone(), req))
}

/// `1h2m3s`, `4m0s`, `12s`.
pub(crate) fn format_duration(d: Duration) -> String {
    let secs = (d.as_millis() + 500) / 1000;
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}

/// One numbered line per subscription, with pause and delay state.
fn subscription_lines(sub: &Subscriber) -> String {
    let mut msg = String::new();
    for (i, event) in sub.subscriptions().keys().enumerate() {
        let _ = write!(msg, "\n{}: {event}", i + 1);
        if let Some(left) = sub.paused_for(event) {
            let _ = write!(msg, ", paused {}", format_duration(left));
        }
        if let Some(delay) = sub.delay(event) {
            let _ = write!(msg, ", delay: {}", format_duration(delay));
        }
    }
    msg
}

fn flags(sub: &Subscriber) -> &'static str {
    if sub.is_ignored() {
        ", ignored"
    } else if sub.is_admin() {
        ", admin"
    } else {
        ""
    }
}

fn subscriber_line(index: usize, sub: &Subscriber) -> String {
    format!(
        "\n{}: ({}) {}{} ({} subscriptions)",
        index + 1,
        sub.api(),
        sub.contact(),
        flags(sub),
        sub.subscription_count()
    )
}
