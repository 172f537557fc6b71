//! Autoinstall document loading and top-level validation (spec.md §4.7 step 3,
//! §6 "Autoinstall document").
//!
//! The document on disk is a JSON-compatible tree (the Serializer's domain,
//! spec.md §4.1); this module owns only the `{version: 1, ...}` envelope
//! check. Each controller's own slice is validated by that controller's
//! `load_autoinstall_data`.

use std::path::Path;

use subiquity_core::types::AutoinstallDocument;

use crate::error::AutoinstallError;

/// Reads and parses the autoinstall document at `path`, applying the base
/// schema check (`version` present and `== 1`). The document on disk is
/// YAML (spec.md §6); a JSON document parses identically since JSON is a
/// subset of YAML 1.2.
pub fn load_from_path(path: &Path) -> Result<AutoinstallDocument, AutoinstallError> {
    let raw = std::fs::read_to_string(path)?;
    let doc: AutoinstallDocument = serde_yaml::from_str(&raw)?;
    Ok(doc)
}

/// spec.md §4.7 step 3: "validate it against the base schema
/// (`{version: 1, …}`)".
pub fn validate_base_schema(doc: &AutoinstallDocument) -> Result<(), AutoinstallError> {
    if doc.version == 0 {
        return Err(AutoinstallError::MissingVersion);
    }
    if doc.version != 1 {
        return Err(AutoinstallError::UnsupportedVersion(doc.version));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn validate_base_schema_accepts_version_one() {
        let doc = AutoinstallDocument {
            version: 1,
            ..Default::default()
        };
        assert!(validate_base_schema(&doc).is_ok());
    }

    #[test]
    fn validate_base_schema_rejects_missing_version() {
        let doc = AutoinstallDocument::default();
        assert!(matches!(
            validate_base_schema(&doc),
            Err(AutoinstallError::MissingVersion)
        ));
    }

    #[test]
    fn validate_base_schema_rejects_future_version() {
        let doc = AutoinstallDocument {
            version: 2,
            ..Default::default()
        };
        assert!(matches!(
            validate_base_schema(&doc),
            Err(AutoinstallError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn load_from_path_reads_a_json_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"version": 1, "keyboard": {{"layout": "us"}}}}"#).unwrap();
        let doc = load_from_path(file.path()).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.slices["keyboard"]["layout"], "us");
    }

    #[test]
    fn load_from_path_reads_a_real_yaml_document_with_kebab_case_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "version: 1\n\
             interactive-sections:\n  - network\n\
             early-commands:\n  - [\"true\"]\n\
             keyboard:\n  layout: us\n"
        )
        .unwrap();
        let doc = load_from_path(file.path()).unwrap();
        assert_eq!(doc.version, 1);
        assert!(doc.is_section_interactive("network"));
        assert_eq!(
            doc.early_commands.as_ref().unwrap()[0],
            subiquity_core::types::Command::Argv(vec!["true".to_string()])
        );
        assert_eq!(doc.slices["keyboard"]["layout"], "us");
    }
}
