//! The controller framework (spec.md §4.4).
//!
//! Each controller owns one named fragment of the installation model. The
//! orchestrator functions here (`setup_autoinstall`, `is_interactive`) are
//! free functions rather than trait defaults so they can see the loaded
//! `AutoinstallDocument` without every controller needing a reference to
//! it.

use async_trait::async_trait;
use serde_json::Value;
use subiquity_core::types::AutoinstallDocument;

use crate::error::{AutoinstallError, ControllerError};

/// The three statuses a controller may contribute to a response envelope
/// (spec.md §4.4 `generic_result()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericStatus {
    Ok,
    Skip,
    Confirm,
}

#[async_trait]
pub trait Controller: Send + Sync {
    /// The name this controller is registered under, and the key `configured()`
    /// events are indexed by.
    fn name(&self) -> &'static str;

    /// The autoinstall document key this controller's slice lives under, if any.
    fn autoinstall_key(&self) -> Option<&'static str> {
        None
    }

    /// Used when the key is absent from a loaded autoinstall document.
    fn autoinstall_default(&self) -> Option<Value> {
        None
    }

    /// Validate and apply a raw autoinstall slice to this controller's
    /// sub-model (spec.md §4.4 step 3).
    fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError>;

    /// Non-interactive controllers must block here until their slice is
    /// fully settled, including any upstream events (spec.md §4.4
    /// "Interactivity predicate").
    async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError>;

    /// This controller's contribution to a re-exported autoinstall
    /// document (spec.md §11 `make_autoinstall()` aggregation).
    fn make_autoinstall(&self) -> Value {
        Value::Null
    }

    async fn start(&mut self) {}

    /// True once this controller has called `configured()` and the base
    /// model has recorded the corresponding event.
    fn configured(&self) -> bool;

    /// spec.md §4.4 `generic_result()`.
    fn generic_result(&self) -> GenericStatus {
        GenericStatus::Ok
    }
}

/// spec.md §4.4 step 1-3: resolve a controller's autoinstall slice and load
/// it, failing startup with a precise error if the slice can't be applied.
pub fn setup_autoinstall(
    controller: &mut dyn Controller,
    doc: Option<&AutoinstallDocument>,
) -> Result<(), AutoinstallError> {
    let Some(key) = controller.autoinstall_key() else {
        return Ok(());
    };

    let slice = doc
        .and_then(|d| d.slices.get(key).cloned())
        .or_else(|| controller.autoinstall_default());

    let Some(slice) = slice else {
        // No document loaded and no default: this controller stays fully
        // interactive, nothing to load.
        return Ok(());
    };

    controller.load_autoinstall_data(slice)
}

/// spec.md §4.4 "Interactivity predicate": a controller is interactive iff
/// no document is loaded, or the document's `interactive-sections` names it
/// (or `*`).
pub fn is_interactive(controller: &dyn Controller, doc: Option<&AutoinstallDocument>) -> bool {
    let Some(doc) = doc else {
        return true;
    };
    match controller.autoinstall_key() {
        Some(key) => doc.is_section_interactive(key),
        None => doc.is_wildcard_interactive(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        configured: bool,
        loaded: Option<Value>,
    }

    #[async_trait]
    impl Controller for Stub {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn autoinstall_key(&self) -> Option<&'static str> {
            Some("stub")
        }
        fn load_autoinstall_data(&mut self, slice: Value) -> Result<(), AutoinstallError> {
            self.loaded = Some(slice);
            Ok(())
        }
        async fn apply_autoinstall_config(&mut self) -> Result<(), ControllerError> {
            Ok(())
        }
        fn configured(&self) -> bool {
            self.configured
        }
    }

    #[test]
    fn setup_autoinstall_loads_matching_slice() {
        let mut doc = AutoinstallDocument {
            version: 1,
            ..Default::default()
        };
        doc.slices
            .insert("stub".to_string(), serde_json::json!({"enabled": true}));
        let mut ctrl = Stub {
            configured: false,
            loaded: None,
        };
        setup_autoinstall(&mut ctrl, Some(&doc)).unwrap();
        assert_eq!(ctrl.loaded, Some(serde_json::json!({"enabled": true})));
    }

    #[test]
    fn no_document_is_fully_interactive() {
        let ctrl = Stub {
            configured: false,
            loaded: None,
        };
        assert!(is_interactive(&ctrl, None));
    }

    #[test]
    fn wildcard_section_is_interactive() {
        let doc = AutoinstallDocument {
            version: 1,
            interactive_sections: vec!["*".to_string()],
            ..Default::default()
        };
        let ctrl = Stub {
            configured: false,
            loaded: None,
        };
        assert!(is_interactive(&ctrl, Some(&doc)));
    }
}
