use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subiquity_core::types::KeyboardSetting;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardModel {
    pub setting: KeyboardSetting,
    #[serde(skip)]
    configured: bool,
}

impl Default for KeyboardModel {
    fn default() -> Self {
        Self {
            setting: KeyboardSetting {
                layout: "us".to_string(),
                variant: String::new(),
                toggle: None,
            },
            configured: false,
        }
    }
}

#[async_trait]
impl Controller for KeyboardModel {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("keyboard")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        self.setting = serde_json::from_value(slice)
            .map_err(|_| AutoinstallError::Malformed("keyboard".to_string()))?;
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        serde_json::to_value(&self.setting).unwrap_or(Value::Null)
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
