//! Fan an event out to every eligible subscriber.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    futures::future::join_all,
    motifini_subscribe::{DELAY_RULE, Subscriber},
    tracing::{debug, info, warn},
};

use crate::{command::Request, context::ChatContext};

/// Quiet period after a notification when neither the subscription nor the
/// event sets a `delay` rule.
pub const DEFAULT_REPEAT_DELAY: Duration = Duration::from_secs(60);

/// One outgoing event notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub event: String,
    pub text: String,
    /// Camera picture attached to the message, when one was captured.
    pub file: Option<PathBuf>,
}

/// Delivers a notification to one subscriber on its channel.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, subscriber: &Subscriber, notification: &Notification)
    -> anyhow::Result<()>;
}

pub struct Notifier {
    ctx: Arc<ChatContext>,
    outbound: Arc<dyn Outbound>,
    enabled_apis: Vec<String>,
    default_delay: Duration,
}

impl Notifier {
    pub fn new(ctx: Arc<ChatContext>, outbound: Arc<dyn Outbound>, enabled_apis: Vec<String>) -> Self {
        Self {
            ctx,
            outbound,
            enabled_apis,
            default_delay: DEFAULT_REPEAT_DELAY,
        }
    }

    #[must_use]
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Subscribers that would receive `event` right now.
    pub fn recipients(&self, event: &str) -> Vec<Arc<Subscriber>> {
        self.ctx.store.eligible_subscribers(event, &self.enabled_apis)
    }

    /// How long `sub` stays quiet on `event` after being notified.
    fn repeat_delay(&self, sub: &Subscriber, event: &str) -> Duration {
        sub.delay(event)
            .or_else(|| {
                self.ctx
                    .store
                    .event_rule(event, DELAY_RULE)
                    .and_then(|v| v.trim().parse().ok())
                    .map(Duration::from_secs)
            })
            .unwrap_or(self.default_delay)
    }

    /// Notify everyone subscribed to `event`. Returns how many deliveries
    /// succeeded.
    pub async fn notify(&self, event: &str, text: &str) -> usize {
        let recipients = self.recipients(event);
        if recipients.is_empty() {
            debug!(event, "no eligible subscribers");
            return 0;
        }

        let id = Request::new_id();
        let file = match self.ctx.cameras.by_name(event) {
            Some(camera) => {
                let path = self
                    .ctx
                    .artifact_path("motifini_camera_motion", &id, &camera, "jpg");
                match self.ctx.capture.save_picture(&camera, &path).await {
                    Ok(()) => Some(path),
                    Err(e) => {
                        warn!(event, camera = %camera, error = %e, "motion picture capture failed");
                        None
                    },
                }
            },
            None => None,
        };

        let notification = Notification {
            id,
            event: event.to_string(),
            text: text.to_string(),
            file,
        };

        let sends = recipients.iter().map(|sub| {
            let notification = &notification;
            async move { (sub, self.outbound.send(sub, notification).await) }
        });

        let mut delivered = 0;
        for (sub, result) in join_all(sends).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        event,
                        api = sub.api(),
                        contact = sub.contact(),
                        error = %e,
                        "notification failed"
                    );
                },
            }
            if let Err(e) = sub.pause(event, self.repeat_delay(sub, event)) {
                debug!(event, contact = sub.contact(), error = %e, "subscription vanished before pause");
            }
        }

        info!(
            request_id = %notification.id,
            event,
            recipients = recipients.len(),
            delivered,
            "notified subscribers"
        );
        delivered
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled_apis", &self.enabled_apis)
            .field("default_delay", &self.default_delay)
            .finish_non_exhaustive()
    }
}
