//! Only as much of the filesystem/storage model as the install state
//! machine needs to consume (spec.md §1 Non-goals: the disk-probing and
//! partitioning model itself is out of scope).

use async_trait::async_trait;
use serde_json::Value;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default)]
pub struct FilesystemModel {
    pub probe_done: bool,
    /// Disk ids surfaced by the (stubbed) probe, for `/storage`'s response.
    pub disks: Vec<String>,
    /// The config as first proposed, before any user/autoinstall edits.
    pub orig_config: Value,
    /// Whatever curtin storage config the user (or autoinstall) settled on.
    pub config: Value,
    /// Whether `/target` already exists and must be unmounted before a
    /// fresh curtin run (spec.md §4.5).
    pub target_mounted: bool,
    configured: bool,
}

impl FilesystemModel {
    pub fn has_config(&self) -> bool {
        !self.config.is_null()
    }
}

#[async_trait]
impl Controller for FilesystemModel {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("storage")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        self.orig_config = slice.clone();
        self.config = slice;
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        self.config.clone()
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
