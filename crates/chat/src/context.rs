use std::{path::PathBuf, sync::Arc};

use motifini_subscribe::SubscriptionStore;

use crate::camera::{CameraDirectory, Capture};

/// Everything the built-in commands need, shared by reference.
#[derive(Clone)]
pub struct ChatContext {
    pub store: Arc<SubscriptionStore>,
    pub cameras: Arc<dyn CameraDirectory>,
    pub capture: Arc<dyn Capture>,
    /// Where pictures and videos for replies are written.
    pub temp_dir: PathBuf,
    pub http: reqwest::Client,
}

impl ChatContext {
    pub fn new(
        store: Arc<SubscriptionStore>,
        cameras: Arc<dyn CameraDirectory>,
        capture: Arc<dyn Capture>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            cameras,
            capture,
            temp_dir: temp_dir.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Path for a reply artifact, e.g. `chat_command_<id>_<camera>.jpg`.
    pub fn artifact_path(&self, prefix: &str, id: &str, camera: &str, ext: &str) -> PathBuf {
        let camera = camera.replace(['/', '\\'], "_");
        self.temp_dir.join(format!("{prefix}_{id}_{camera}.{ext}"))
    }
}

impl std::fmt::Debug for ChatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatContext")
            .field("store", &self.store.path())
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}
