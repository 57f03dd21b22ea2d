//! Feature sequencing.
//!
//! Applies ordered action lists for `{key, value}` feature requests:
//! docker on/off, language engine versions, and so on. The data
//! (which commands, in what order) lives in [`ActionCatalog`]; this
//! module owns only the mechanism: pick the branch, resolve the
//! version once, substitute placeholders, run the steps in order and
//! stop at the first failure.

mod actions;

pub use actions::{ActionCatalog, FeatureActions, Step};

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::catalog::{ReleaseCatalog, ResolvedVersion};
use crate::error::{ProvisionError, ProvisionResult};

/// Sentinel value meaning "remove this feature".
pub const OFF: &str = "off";

/// Executes one rendered command in the target account's context.
///
/// Implementations decide transport (local shell, ssh, sudo helper);
/// the sequencer only cares about success or failure. `log` mirrors
/// the step's flag: when false the runner should suppress command
/// echo in the user-visible transcript.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cmd: &str, log: bool) -> ProvisionResult<()>;
}

/// Receives narration lines for the user-visible provisioning log.
pub trait AuditLog: Send + Sync {
    fn note(&self, line: &str);
}

/// Applies feature requests against an action catalog.
pub struct Sequencer {
    actions: ActionCatalog,
    releases: Arc<ReleaseCatalog>,
}

impl Sequencer {
    pub fn new(actions: ActionCatalog, releases: Arc<ReleaseCatalog>) -> Self {
        Self { actions, releases }
    }

    /// Apply one `{key, value}` request.
    ///
    /// Unknown keys are a no-op and return `Ok(None)`. Otherwise the
    /// resolved version string (when the feature has an ecosystem) is
    /// returned so the caller can record what was installed.
    ///
    /// Version resolution happens exactly once, before any remote
    /// action, so an unresolvable request fails without side effects.
    pub async fn apply(
        &self,
        key: &str,
        value: &str,
        runner: &dyn CommandRunner,
        audit: &dyn AuditLog,
    ) -> ProvisionResult<Option<String>> {
        let Some(feature) = self.actions.get(key) else {
            debug!("no actions registered for feature '{key}', skipping");
            return Ok(None);
        };

        if value == OFF {
            info!("disabling feature '{key}'");
            self.run_steps(&feature.disable, value, None, runner, audit)
                .await?;
            return Ok(None);
        }

        let resolved = match &feature.ecosystem {
            Some(ecosystem) => {
                let resolved = self.releases.resolve(ecosystem, value)?;
                if feature.require_binary && resolved.binary_url.is_none() {
                    return Err(ProvisionError::UnresolvedVersion {
                        ecosystem: ecosystem.clone(),
                        request: value.to_string(),
                    });
                }
                Some(resolved)
            }
            None => None,
        };

        info!(
            "enabling feature '{key}' (version {})",
            resolved
                .as_ref()
                .map(|r| r.version.as_str())
                .unwrap_or(value)
        );

        self.run_steps(&feature.enable, value, resolved.as_ref(), runner, audit)
            .await?;

        if let Some(resolved) = &resolved {
            let branch = if resolved.binary_url.is_some() {
                &feature.binary_install
            } else {
                &feature.manager_install
            };
            self.run_steps(branch, value, Some(resolved), runner, audit)
                .await?;
        }

        self.run_steps(&feature.verify, value, resolved.as_ref(), runner, audit)
            .await?;

        Ok(resolved.map(|r| r.version))
    }

    async fn run_steps(
        &self,
        steps: &[Step],
        value: &str,
        resolved: Option<&ResolvedVersion>,
        runner: &dyn CommandRunner,
        audit: &dyn AuditLog,
    ) -> ProvisionResult<()> {
        for step in steps {
            match step {
                Step::Note { text } => {
                    audit.note(&render(text, value, resolved));
                }
                Step::Run { cmd, log } => {
                    runner.run(&render(cmd, value, resolved), *log).await?;
                }
            }
        }
        Ok(())
    }
}

/// Substitute `{value}`, `{version}` and `{binary}` placeholders.
///
/// `{version}` renders the concrete form: a floating resolution hands
/// its bare prefix to the ecosystem-native installer, never the
/// sentinel tag.
fn render(template: &str, value: &str, resolved: Option<&ResolvedVersion>) -> String {
    let mut out = template.replace("{value}", value);
    if let Some(resolved) = resolved {
        out = out.replace("{version}", resolved.concrete());
        if let Some(binary) = &resolved.binary_url {
            out = out.replace("{binary}", binary);
        }
    }
    out
}
