use async_trait::async_trait;
use serde_json::Value;

use crate::controller::Controller;
use crate::error::{AutoinstallError, ControllerError};

#[derive(Debug, Clone, Default)]
pub struct SourceModel {
    pub current: Option<String>,
    pub search_drivers: bool,
    configured: bool,
}

#[async_trait]
impl Controller for SourceModel {
    fn name(&self) -> &'static str {
        "source"
    }

    fn autoinstall_key(&self) -> Option<&'static str> {
        Some("source")
    }

    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
        if let Some(id) = slice.get("search_drivers").and_then(|v| v.as_bool()) {
            self.search_drivers = id;
        }
        let current = slice
            .get("id")
            .and_then(|v| v.as_str())
            .or_else(|| slice.as_str())
            .ok_or_else(|| AutoinstallError::Malformed("source".to_string()))?;
        self.current = Some(current.to_string());
        Ok(())
    }

    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
        self.configured = true;
        Ok(())
    }

    fn make_autoinstall(&self) -> Value {
        match &self.current {
            Some(id) => serde_json::json!({"id": id, "search_drivers": self.search_drivers}),
            None => Value::Null,
        }
    }

    fn configured(&self) -> bool {
        self.configured
    }
}
