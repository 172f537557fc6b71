use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleModel {
    pub locale: String,
    #[serde(skip)]
    configured: bool,
}

impl Default for LocaleModel {
    fn default() -> Self {
        Self {
            locale: "en_US.UTF-8".to_string(),
            configured: false,
        }
    }
}

#[async_trait]
impl Controller for LocaleModel {
    fn name(&self) -> &'static str {
        "locale"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("locale")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        let locale = slice
            .as_str()
            .ok_or_else(|| AutoinstallError::Malformed("locale".to_string()))?;
        self.locale = locale.to_string();
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        Value::String(self.locale.clone())
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
