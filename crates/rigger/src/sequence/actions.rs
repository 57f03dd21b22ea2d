//! Action catalog data model.
//!
//! The per-feature command sequences are operator-supplied content (the
//! action catalog); this module defines only their shape and loading.
//! Steps may reference `{value}`, `{version}` and `{binary}`
//! placeholders, rendered once per invocation after version resolution.

use std::collections::HashMap;

use serde::Deserialize;

fn default_true() -> bool {
    true
}

/// One provisioning step. Every step is idempotent content
/// (remove-if-exists, create-if-absent) so repeated runs converge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Narration written to the audit log as a `$> ` line.
    Note { text: String },
    /// Shell command sent through the remote runner. `log` controls
    /// whether the runner echoes the command and its output into the
    /// audit log.
    Run {
        cmd: String,
        #[serde(default = "default_true")]
        log: bool,
    },
}

/// Ordered step lists for one feature key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeatureActions {
    /// Ecosystem whose release catalog resolves `{version}`/`{binary}`.
    /// Features without one (e.g. docker) skip version resolution and
    /// the install branches entirely.
    pub ecosystem: Option<String>,
    /// Fail before any remote action when no prebuilt binary matches
    /// the request (ecosystems that cannot build from source remotely).
    pub require_binary: bool,
    /// Steps for `value == "off"`.
    pub disable: Vec<Step>,
    /// Steps always run when enabling or changing the feature.
    pub enable: Vec<Step>,
    /// Branch taken when a prebuilt binary asset was resolved.
    pub binary_install: Vec<Step>,
    /// Branch taken when installation goes through the ecosystem's own
    /// version manager.
    pub manager_install: Vec<Step>,
    /// Steps run after either branch (typically `tool --version`).
    pub verify: Vec<Step>,
}

/// Feature key -> action lists. Unknown keys are a no-op by contract,
/// so consumers can ship partial catalogs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ActionCatalog {
    features: HashMap<String, FeatureActions>,
}

impl ActionCatalog {
    pub fn new(features: HashMap<String, FeatureActions>) -> Self {
        Self { features }
    }

    /// Load a catalog from TOML content.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn get(&self, key: &str) -> Option<&FeatureActions> {
        self.features.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, actions: FeatureActions) {
        self.features.insert(key.into(), actions);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_from_toml() {
        let raw = r#"
            [python]
            ecosystem = "python"

            [[python.disable]]
            kind = "note"
            text = "Removing Python engine"

            [[python.disable]]
            kind = "run"
            cmd = "rm -rf ~/.pyenv"

            [[python.enable]]
            kind = "note"
            text = "Changing Python engine to {version}"

            [[python.manager_install]]
            kind = "run"
            cmd = "pyenv install {version} -s"
            log = false

            [[python.verify]]
            kind = "run"
            cmd = "python --version"

            [docker]

            [[docker.disable]]
            kind = "run"
            cmd = "dockerd-rootless-setuptool.sh uninstall"
        "#;
        let catalog = ActionCatalog::from_toml_str(raw).unwrap();

        let python = catalog.get("python").unwrap();
        assert_eq!(python.ecosystem.as_deref(), Some("python"));
        assert!(!python.require_binary);
        assert_eq!(python.disable.len(), 2);
        assert_eq!(
            python.disable[0],
            Step::Note {
                text: "Removing Python engine".to_string()
            }
        );
        assert_eq!(
            python.manager_install[0],
            Step::Run {
                cmd: "pyenv install {version} -s".to_string(),
                log: false
            }
        );
        // log defaults to true when omitted.
        assert_eq!(
            python.verify[0],
            Step::Run {
                cmd: "python --version".to_string(),
                log: true
            }
        );

        let docker = catalog.get("docker").unwrap();
        assert!(docker.ecosystem.is_none());
        assert_eq!(docker.disable.len(), 1);
        assert!(catalog.get("fortran").is_none());
    }

    #[test]
    fn test_catalog_rejects_unknown_step_kind() {
        let raw = r#"
            [node]
            [[node.enable]]
            kind = "teleport"
            cmd = "nvm install"
        "#;
        assert!(ActionCatalog::from_toml_str(raw).is_err());
    }
}
