//! Release catalogs and version resolution.
//!
//! Each ecosystem (an interpreter family managed as a unit) has a
//! [`ReleaseIndex`]: its available versions newest-first, plus prebuilt
//! binary assets where upstream publishes them. Indexes are replaced
//! atomically on refresh, so readers either see the old snapshot or the
//! new one, never a half-updated catalog.

mod fetch;

pub use fetch::{CatalogRefresher, EcosystemSource, UpstreamSource, default_sources};

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::error::{ProvisionError, ProvisionResult};

/// Suffix marking a best-effort floating resolution: the requested prefix
/// matched no catalog entry, so the ecosystem's own version manager must
/// resolve it natively instead of a prebuilt asset.
pub const FLOATING_TAG: &str = ":latest";

/// Compare two dotted version strings by numeric segments.
///
/// Segments are compared as integers with missing segments padded as
/// zero, so `"2.9" < "2.10"` and `"1.2" < "1.2.1"`. Non-numeric
/// segments count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let pa: Vec<u64> = a.split('.').map(|s| s.parse().unwrap_or(0)).collect();
    let pb: Vec<u64> = b.split('.').map(|s| s.parse().unwrap_or(0)).collect();
    let len = pa.len().max(pb.len());
    for i in 0..len {
        let x = pa.get(i).copied().unwrap_or(0);
        let y = pb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Available releases for one ecosystem, newest first.
#[derive(Debug, Clone, Default)]
pub struct ReleaseIndex {
    versions: Vec<String>,
    binaries: HashMap<String, String>,
}

impl ReleaseIndex {
    /// Build an index from an unordered version list and optional
    /// version -> prebuilt-binary URL mapping. Versions are sorted
    /// newest-first and deduplicated.
    pub fn new(mut versions: Vec<String>, binaries: HashMap<String, String>) -> Self {
        versions.sort_by(|a, b| compare_versions(b, a));
        versions.dedup();
        Self { versions, binaries }
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn binary_url(&self, version: &str) -> Option<&str> {
        self.binaries.get(version).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn newest(&self) -> Option<&str> {
        self.versions.first().map(String::as_str)
    }

    fn expand(&self, version: &str) -> ResolvedVersion {
        ResolvedVersion {
            version: version.to_string(),
            binary_url: self.binary_url(version).map(str::to_string),
        }
    }
}

/// An abstract version request as received from the desired-state API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    /// Empty request: latest stable.
    Default,
    /// Exact dotted version, trusted verbatim without a catalog lookup.
    Exact(String),
    /// Major or major.minor prefix.
    Partial(String),
    /// `lts` / `security`: newest release of the previous stable branch.
    Lts,
    /// `latest` / `current` / `stable` and anything else symbolic.
    Latest,
}

impl VersionRequest {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::Default;
        }
        if is_dotted_numeric(raw) {
            return match raw.split('.').count() {
                1 | 2 => Self::Partial(raw.to_string()),
                _ => Self::Exact(raw.to_string()),
            };
        }
        match raw {
            "lts" | "security" => Self::Lts,
            _ => Self::Latest,
        }
    }
}

fn is_dotted_numeric(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .split('.')
            .all(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()))
}

/// Concrete release chosen for a request.
///
/// When `binary_url` is present the version is installable from that
/// prebuilt asset without a source build; when absent, installation goes
/// through the ecosystem's own version manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version: String,
    pub binary_url: Option<String>,
}

impl ResolvedVersion {
    /// Whether this is a floating sentinel (`"3.12:latest"`) rather than
    /// a concrete catalog entry.
    pub fn is_floating(&self) -> bool {
        self.version.ends_with(FLOATING_TAG)
    }

    /// The version string with any floating tag stripped, suitable for
    /// handing to an ecosystem-native installer.
    pub fn concrete(&self) -> &str {
        self.version.strip_suffix(FLOATING_TAG).unwrap_or(&self.version)
    }
}

/// Shared, read-mostly catalog of release indexes per ecosystem.
#[derive(Debug, Default)]
pub struct ReleaseCatalog {
    indexes: RwLock<HashMap<String, Arc<ReleaseIndex>>>,
}

impl ReleaseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace one ecosystem's index. Readers holding the old
    /// snapshot keep seeing it unchanged.
    pub fn install(&self, ecosystem: &str, index: ReleaseIndex) {
        debug!(
            "installing release index for '{}' ({} versions)",
            ecosystem,
            index.versions.len()
        );
        let mut map = match self.indexes.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.insert(ecosystem.to_string(), Arc::new(index));
    }

    /// Current snapshot for an ecosystem, if one has been fetched.
    pub fn snapshot(&self, ecosystem: &str) -> Option<Arc<ReleaseIndex>> {
        let map = match self.indexes.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(ecosystem).cloned()
    }

    /// All known versions per ecosystem, for status reporting.
    pub fn supported(&self) -> HashMap<String, Vec<String>> {
        let map = match self.indexes.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.iter()
            .map(|(eco, index)| (eco.clone(), index.versions.clone()))
            .collect()
    }

    /// Resolve a raw version request against the current snapshot.
    pub fn resolve(&self, ecosystem: &str, raw: &str) -> ProvisionResult<ResolvedVersion> {
        self.resolve_request(ecosystem, &VersionRequest::parse(raw))
    }

    /// Resolve a parsed request. Pure given a fixed snapshot: the same
    /// (ecosystem, request) pair always yields the same answer.
    pub fn resolve_request(
        &self,
        ecosystem: &str,
        request: &VersionRequest,
    ) -> ProvisionResult<ResolvedVersion> {
        let index = self
            .snapshot(ecosystem)
            .unwrap_or_else(|| Arc::new(ReleaseIndex::default()));

        match request {
            // Exact versions are trusted verbatim; only the binary asset
            // is looked up.
            VersionRequest::Exact(v) => Ok(index.expand(v)),

            VersionRequest::Partial(prefix) => {
                match index.versions.iter().find(|v| v.starts_with(prefix.as_str())) {
                    Some(v) => Ok(index.expand(v)),
                    // No catalog match: hand back a floating sentinel so
                    // the caller falls back to ecosystem-native resolution.
                    None => Ok(ResolvedVersion {
                        version: format!("{prefix}{FLOATING_TAG}"),
                        binary_url: None,
                    }),
                }
            }

            VersionRequest::Lts => {
                let newest = self.require_newest(ecosystem, &index, "lts")?;
                let branch = branch_of(newest);
                let pick = index
                    .versions
                    .iter()
                    .find(|v| branch_of(v) != branch)
                    .map(String::as_str)
                    .unwrap_or(newest);
                Ok(index.expand(pick))
            }

            VersionRequest::Default | VersionRequest::Latest => {
                let newest = self.require_newest(ecosystem, &index, "latest")?;
                Ok(index.expand(newest))
            }
        }
    }

    fn require_newest<'a>(
        &self,
        ecosystem: &str,
        index: &'a ReleaseIndex,
        request: &str,
    ) -> ProvisionResult<&'a str> {
        index.newest().ok_or_else(|| ProvisionError::UnresolvedVersion {
            ecosystem: ecosystem.to_string(),
            request: request.to_string(),
        })
    }
}

/// The major.minor branch of a dotted version ("3.11.4" -> "3.11").
fn branch_of(version: &str) -> String {
    version.split('.').take(2).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_index() -> ReleaseIndex {
        let binaries = HashMap::from([
            (
                "3.11.4".to_string(),
                "https://assets.example/cpython-3.11.4.tar.zst".to_string(),
            ),
            (
                "3.12.0".to_string(),
                "https://assets.example/cpython-3.12.0.tar.zst".to_string(),
            ),
        ]);
        ReleaseIndex::new(
            vec![
                "3.10.2".to_string(),
                "3.12.0".to_string(),
                "3.11.4".to_string(),
                "3.11.2".to_string(),
            ],
            binaries,
        )
    }

    fn catalog_with_python() -> ReleaseCatalog {
        let catalog = ReleaseCatalog::new();
        catalog.install("python", python_index());
        catalog
    }

    #[test]
    fn test_compare_versions_numeric_not_lexicographic() {
        assert_eq!(compare_versions("2.9", "2.10"), Ordering::Less);
        assert_eq!(compare_versions("2.10", "2.9"), Ordering::Greater);
        assert_eq!(compare_versions("10.0", "9.9"), Ordering::Greater);
    }

    #[test]
    fn test_compare_versions_segment_count_padding() {
        assert_eq!(compare_versions("1.2", "1.2.1"), Ordering::Less);
        assert_eq!(compare_versions("1.2.0", "1.2"), Ordering::Equal);
        assert_eq!(compare_versions("1", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_index_sorted_newest_first() {
        let index = python_index();
        assert_eq!(
            index.versions(),
            &["3.12.0", "3.11.4", "3.11.2", "3.10.2"]
        );
    }

    #[test]
    fn test_request_parse() {
        assert_eq!(VersionRequest::parse(""), VersionRequest::Default);
        assert_eq!(VersionRequest::parse("  "), VersionRequest::Default);
        assert_eq!(
            VersionRequest::parse("3"),
            VersionRequest::Partial("3".to_string())
        );
        assert_eq!(
            VersionRequest::parse("3.11"),
            VersionRequest::Partial("3.11".to_string())
        );
        assert_eq!(
            VersionRequest::parse("3.11.4"),
            VersionRequest::Exact("3.11.4".to_string())
        );
        assert_eq!(VersionRequest::parse("lts"), VersionRequest::Lts);
        assert_eq!(VersionRequest::parse("security"), VersionRequest::Lts);
        assert_eq!(VersionRequest::parse("latest"), VersionRequest::Latest);
        assert_eq!(VersionRequest::parse("stable"), VersionRequest::Latest);
        assert_eq!(VersionRequest::parse("current"), VersionRequest::Latest);
    }

    #[test]
    fn test_resolve_default_is_newest() {
        let catalog = catalog_with_python();
        let resolved = catalog.resolve("python", "").unwrap();
        assert_eq!(resolved.version, "3.12.0");
        assert!(resolved.binary_url.is_some());
    }

    #[test]
    fn test_resolve_exact_trusts_caller() {
        let catalog = catalog_with_python();
        // Not in the catalog at all, still returned verbatim.
        let resolved = catalog.resolve("python", "3.9.18").unwrap();
        assert_eq!(resolved.version, "3.9.18");
        assert!(resolved.binary_url.is_none());

        let resolved = catalog.resolve("python", "3.11.4").unwrap();
        assert_eq!(
            resolved.binary_url.as_deref(),
            Some("https://assets.example/cpython-3.11.4.tar.zst")
        );
    }

    #[test]
    fn test_resolve_partial_newest_first() {
        let catalog = catalog_with_python();
        let resolved = catalog.resolve("python", "3.11").unwrap();
        assert_eq!(resolved.version, "3.11.4");
        assert!(!resolved.is_floating());
    }

    #[test]
    fn test_resolve_partial_miss_is_floating_sentinel() {
        let catalog = catalog_with_python();
        let resolved = catalog.resolve("python", "3.7").unwrap();
        assert_eq!(resolved.version, "3.7:latest");
        assert!(resolved.is_floating());
        assert!(resolved.binary_url.is_none());
        assert_eq!(resolved.concrete(), "3.7");
    }

    #[test]
    fn test_resolve_lts_is_previous_branch() {
        let catalog = catalog_with_python();
        let latest = catalog.resolve("python", "latest").unwrap();
        let lts = catalog.resolve("python", "lts").unwrap();
        assert_eq!(lts.version, "3.11.4");
        assert_ne!(branch_of(&lts.version), branch_of(&latest.version));
    }

    #[test]
    fn test_resolve_lts_single_branch_falls_back_to_newest() {
        let catalog = ReleaseCatalog::new();
        catalog.install(
            "ruby",
            ReleaseIndex::new(
                vec!["3.2.2".to_string(), "3.2.1".to_string()],
                HashMap::new(),
            ),
        );
        let resolved = catalog.resolve("ruby", "lts").unwrap();
        assert_eq!(resolved.version, "3.2.2");
    }

    #[test]
    fn test_resolve_empty_catalog_is_unresolved() {
        let catalog = ReleaseCatalog::new();
        let err = catalog.resolve("python", "latest").unwrap_err();
        assert!(matches!(
            err,
            crate::error::ProvisionError::UnresolvedVersion { .. }
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let catalog = catalog_with_python();
        let a = catalog.resolve("python", "3.11").unwrap();
        let b = catalog.resolve("python", "3.11").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_install_replaces_snapshot_atomically() {
        let catalog = catalog_with_python();
        let old = catalog.snapshot("python").unwrap();
        catalog.install(
            "python",
            ReleaseIndex::new(vec!["3.13.0".to_string()], HashMap::new()),
        );
        // The held snapshot still shows the old contents.
        assert_eq!(old.newest(), Some("3.12.0"));
        let new = catalog.snapshot("python").unwrap();
        assert_eq!(new.newest(), Some("3.13.0"));
    }
}
