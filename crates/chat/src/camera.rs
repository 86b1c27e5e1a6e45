//! Camera capabilities the commands depend on. Implemented outside this crate.

use std::path::Path;

use {anyhow::Result, async_trait::async_trait};

/// Directory of known cameras.
pub trait CameraDirectory: Send + Sync {
    /// Camera names in display order.
    fn names(&self) -> Vec<String>;

    /// Canonical name of the camera called `name`, ignoring case.
    fn by_name(&self, name: &str) -> Option<String> {
        self.names()
            .into_iter()
            .find(|n| n.eq_ignore_ascii_case(name))
    }
}

/// Saves stills and clips from a camera to disk.
#[async_trait]
pub trait Capture: Send + Sync {
    async fn save_picture(&self, camera: &str, path: &Path) -> Result<()>;
    async fn save_video(&self, camera: &str, path: &Path) -> Result<()>;
}

/// A fixed list of cameras, usually from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticCameras {
    names: Vec<String>,
}

impl StaticCameras {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl CameraDirectory for StaticCameras {
    fn names(&self) -> Vec<String> {
        self.names.clone()
    }
}

/// Capture backend used when no camera server is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapture;

#[async_trait]
impl Capture for NoCapture {
    async fn save_picture(&self, _camera: &str, _path: &Path) -> Result<()> {
        anyhow::bail!("camera capture is not configured")
    }

    async fn save_video(&self, _camera: &str, _path: &Path) -> Result<()> {
        anyhow::bail!("camera capture is not configured")
    }
}
