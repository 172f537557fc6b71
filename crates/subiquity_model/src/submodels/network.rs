use async_trait::async_trait;
use serde_json::Value;
use subiquity_core::types::NetDevInfo;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default)]
pub struct NetworkModel {
    pub devices: Vec<NetDevInfo>,
    pub config: Value,
    configured: bool,
}

impl NetworkModel {
    pub fn has_network(&self) -> bool {
        self.devices.iter().any(|d| d.is_connected)
    }

    /// Autoinstall compatibility unwrap (spec.md §11, grounded in
    /// `network.py::load_autoinstall_data`): a slice of the form
    /// `{"network": {...}}` is the same document nested one level too deep
    /// and is transparently flattened.
    pub fn unwrap_legacy_nesting(mut slice: Value) -> Value {
        if let Value::Object(ref mut map) = slice {
            if map.len() == 1 {
                if let Some(inner) = map.remove("network") {
                    return inner;
                }
            }
        }
        slice
    }
}

#[async_trait]
impl Controller for NetworkModel {
    fn name(&self) -> &'static str {
        "network"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("network")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        self.config = Self::unwrap_legacy_nesting(slice);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_doubly_nested_network_key() {
        let nested = serde_json::json!({"network": {"version": 2, "ethernets": {}}});
        let unwrapped = NetworkModel::unwrap_legacy_nesting(nested);
        assert_eq!(unwrapped, serde_json::json!({"version": 2, "ethernets": {}}));
    }

    #[test]
    fn leaves_already_flat_slice_alone() {
        let flat = serde_json::json!({"version": 2, "ethernets": {}});
        let unwrapped = NetworkModel::unwrap_legacy_nesting(flat.clone());
        assert_eq!(unwrapped, flat);
    }
}
