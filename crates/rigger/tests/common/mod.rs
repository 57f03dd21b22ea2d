//! Test utilities and common setup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rigger::{
    ActionCatalog, AuditLog, CommandRunner, EscalationStrategy, ProvisionResult, ReleaseCatalog,
    ReleaseIndex, Sequencer, SudoUtil, term,
};

/// Route log output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Runs sequenced commands through a local shell and keeps the
/// user-visible transcript the way the bridge would: a `$> ` echo per
/// logged command followed by its normalized output.
pub struct ShellRunner {
    shell: SudoUtil,
    transcript: Mutex<String>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: SudoUtil::new("/bin/sh", EscalationStrategy::Direct),
            transcript: Mutex::new(String::new()),
        }
    }

    pub fn transcript(&self) -> String {
        term::normalize(&self.transcript.lock().unwrap())
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, cmd: &str, log: bool) -> ProvisionResult<()> {
        if log {
            let mut transcript = self.transcript.lock().unwrap();
            transcript.push_str("$> ");
            transcript.push_str(cmd);
            transcript.push('\n');
        }
        let output = self.shell.run("-c", &[cmd]).await?;
        if log {
            self.transcript.lock().unwrap().push_str(&output.stdout);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAudit {
    lines: Mutex<Vec<String>>,
}

impl MemoryAudit {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl AuditLog for MemoryAudit {
    fn note(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// A release catalog with one python-like ecosystem: 3.12.0 (no asset)
/// and 3.11.4 (with a prebuilt asset).
pub fn test_release_catalog() -> Arc<ReleaseCatalog> {
    let catalog = ReleaseCatalog::new();
    let binaries = HashMap::from([(
        "3.11.4".to_string(),
        "https://assets.invalid/cpython-3.11.4.tar.zst".to_string(),
    )]);
    catalog.install(
        "python",
        ReleaseIndex::new(
            vec!["3.11.4".to_string(), "3.12.0".to_string()],
            binaries,
        ),
    );
    Arc::new(catalog)
}

/// Sequencer over shell-friendly actions: every step is an `echo` or
/// `printf` so tests run anywhere a POSIX shell exists.
pub fn test_sequencer() -> Sequencer {
    let raw = r#"
        [python]
        ecosystem = "python"

        [[python.disable]]
        kind = "note"
        text = "Removing python"

        [[python.disable]]
        kind = "run"
        cmd = "echo removed"

        [[python.enable]]
        kind = "note"
        text = "Installing python {version}"

        [[python.binary_install]]
        kind = "run"
        cmd = "echo fetch {binary}"

        [[python.manager_install]]
        kind = "run"
        cmd = "echo build {version}"

        [[python.verify]]
        kind = "run"
        cmd = "printf 'checking 10%%\\r'; printf 'checking 100%%\\n'"
    "#;
    let actions = ActionCatalog::from_toml_str(raw).expect("valid test actions");
    Sequencer::new(actions, test_release_catalog())
}
