use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    motifini_chat::{ChatContext, Dispatcher, NoCapture, Notifier, Outbound, StaticCameras},
    motifini_config::{MotifiniConfig, validate},
    motifini_subscribe::SubscriptionStore,
    tracing::{error, info, warn},
};

/// The running daemon: one store, one dispatcher, shared by every channel.
pub struct App {
    pub config: MotifiniConfig,
    pub store: Arc<SubscriptionStore>,
    pub ctx: Arc<ChatContext>,
    pub dispatcher: Dispatcher,
}

impl App {
    /// Open the state file and wire up the command handlers.
    pub fn open(mut config: MotifiniConfig) -> anyhow::Result<Self> {
        let report = validate(&mut config);
        for d in &report.diagnostics {
            warn!(severity = %d.severity, path = %d.path, "{}", d.message);
        }
        if report.has_errors() {
            anyhow::bail!("invalid configuration, run `motifini check` for details");
        }

        let store = SubscriptionStore::open(&config.state_file).with_context(|| {
            format!("failed to open state file {}", config.state_file.display())
        })?;
        let store = Arc::new(store);

        std::fs::create_dir_all(&config.temp_dir)
            .with_context(|| format!("failed to create {}", config.temp_dir.display()))?;

        let ctx = Arc::new(ChatContext::new(
            store.clone(),
            Arc::new(StaticCameras::new(config.cameras.clone())),
            Arc::new(NoCapture),
            config.temp_dir.clone(),
        ));
        let dispatcher = Dispatcher::new(ctx.clone());

        info!(
            state_file = %config.state_file.display(),
            subscribers = store.subscriber_count(),
            events = store.event_count(),
            cameras = config.cameras.len(),
            "state loaded"
        );
        Ok(Self {
            config,
            store,
            ctx,
            dispatcher,
        })
    }

    pub fn notifier(&self, outbound: Arc<dyn Outbound>) -> Notifier {
        Notifier::new(
            self.ctx.clone(),
            outbound,
            self.config.enabled_apis.clone(),
        )
        .with_default_delay(Duration::from_secs(self.config.default_delay_secs))
    }

    /// Wait for background saves, then write the state file, logging
    /// instead of failing.
    pub async fn save(&self) {
        self.dispatcher.flush().await;
        match self.store.save() {
            Ok(()) => info!("state saved"),
            Err(e) => error!(error = %e, "failed to save state"),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_state_and_temp_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = MotifiniConfig {
            state_file: tmp.path().join("state/subscribers.json"),
            temp_dir: tmp.path().join("captures"),
            cameras: vec!["Porch".into()],
            ..Default::default()
        };
        let app = App::open(config).unwrap();
        assert!(tmp.path().join("state/subscribers.json").exists());
        assert!(tmp.path().join("captures").is_dir());

        let reply = app
            .dispatcher
            .handle_message("console", "local", "sub porch")
            .await;
        assert!(reply.text.starts_with("You've been subscribed to camera: Porch"));
        app.dispatcher.flush().await;

        let reopened = SubscriptionStore::open(tmp.path().join("state/subscribers.json")).unwrap();
        let sub = reopened.get_subscriber("console", "local").unwrap();
        assert!(sub.is_admin());
        assert!(sub.is_subscribed("Porch"));
    }

    #[test]
    fn invalid_config_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = MotifiniConfig {
            state_file: tmp.path().join("subscribers.json"),
            temp_dir: tmp.path().to_path_buf(),
            cameras: vec!["Porch".into(), "PORCH".into()],
            ..Default::default()
        };
        config.console.contact = String::new();
        assert!(App::open(config).is_err());
        assert!(!tmp.path().join("subscribers.json").exists());
    }

    #[test]
    fn corrupt_state_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("subscribers.json");
        std::fs::write(&path, "not json").unwrap();
        let config = MotifiniConfig {
            state_file: path,
            temp_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let err = App::open(config).err().unwrap();
        assert!(err.to_string().starts_with("failed to open state file"));
    }
}
