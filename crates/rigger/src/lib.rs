//! Provisioning bridge core for per-user development environments.
//!
//! This library drives remote provisioning of language runtimes and
//! containerization features for shell accounts on shared hosting nodes.
//! The per-feature command sequences themselves are configuration data
//! (an external action catalog); this crate provides the execution
//! machinery every feature depends on:
//!
//! - [`catalog`] — release catalogs per ecosystem, refreshed in the
//!   background, resolving abstract version requests ("latest", "lts",
//!   "3.11") to concrete releases with optional prebuilt-binary assets.
//! - [`term`] — reconstruction of a clean, linear audit log from raw
//!   interactive terminal output full of carriage returns and cursor
//!   control sequences.
//! - [`exec`] — privilege-separated execution of the `rigger-sudoutil`
//!   helper with incremental output capture.
//! - [`lock`] — per-account advisory file locks so concurrent requests
//!   for the same account never interleave.
//! - [`sequence`] — the desired-state dispatcher that turns a
//!   `{feature key, value}` pair into an ordered, awaited run of the
//!   feature's action list through a caller-supplied remote runner.
//!
//! The SSH transport, the HTTP API surface, and the sudoers policy are
//! external collaborators and out of scope here.

pub mod catalog;
pub mod config;
pub mod error;
pub mod exec;
pub mod lock;
pub mod sequence;
pub mod term;

pub use catalog::{CatalogRefresher, ReleaseCatalog, ReleaseIndex, ResolvedVersion, VersionRequest};
pub use config::BridgeConfig;
pub use error::{ProvisionError, ProvisionResult};
pub use exec::{EscalationStrategy, ExecOutput, ExitDisposition, SudoUtil};
pub use lock::LockManager;
pub use sequence::{ActionCatalog, AuditLog, CommandRunner, FeatureActions, Sequencer, Step};
pub use term::{normalize, normalize_chunks};
