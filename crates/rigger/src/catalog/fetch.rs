//! Upstream release-index fetchers and the refresh scheduler.
//!
//! Fetch failures are logged and swallowed: a stale catalog is preferred
//! over no service, so the previous snapshot stays installed until a
//! refresh succeeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use regex::Regex;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{ReleaseCatalog, ReleaseIndex};

/// Release tag of the prebuilt CPython distribution we track.
const PYTHON_STANDALONE_TAG: &str = "20230507";

/// Where one ecosystem's release index comes from.
#[derive(Debug, Clone)]
pub enum UpstreamSource {
    /// JSON release document whose branches each list `supported_versions`
    /// (php.net style).
    ReleaseJson { url: String },
    /// HTML directory index scanned with a capture regex; group 1 is the
    /// version (RVM binary index style).
    HtmlIndex { url: String, pattern: String },
    /// Release-assets page scanned with a capture regex; the whole match
    /// is the asset file name and group 1 the version. Asset URLs are the
    /// file name joined onto `download_base` (python-build-standalone
    /// style).
    AssetIndex {
        url: String,
        pattern: String,
        download_base: String,
    },
}

/// One ecosystem paired with its upstream source.
#[derive(Debug, Clone)]
pub struct EcosystemSource {
    pub ecosystem: String,
    pub source: UpstreamSource,
}

/// The upstream sources tracked in production.
pub fn default_sources() -> Vec<EcosystemSource> {
    vec![
        EcosystemSource {
            ecosystem: "php".to_string(),
            source: UpstreamSource::ReleaseJson {
                url: "https://www.php.net/releases/?json".to_string(),
            },
        },
        EcosystemSource {
            ecosystem: "ruby".to_string(),
            source: UpstreamSource::HtmlIndex {
                url: "https://rvm.io/binaries/centos/9/x86_64/".to_string(),
                pattern: r#"href="ruby-([.\d]+)\.tar\.bz2""#.to_string(),
            },
        },
        EcosystemSource {
            ecosystem: "python".to_string(),
            source: UpstreamSource::AssetIndex {
                url: format!(
                    "https://github.com/indygreg/python-build-standalone/releases/expanded_assets/{PYTHON_STANDALONE_TAG}"
                ),
                // x86_64_v3 requires AVX2 CPU support
                pattern: r"cpython-(\d+\.\d+\.\d+)\+\d+-x86_64_v3-unknown-linux-gnu-pgo\+lto-full\.tar\.zst"
                    .to_string(),
                download_base: format!(
                    "https://github.com/indygreg/python-build-standalone/releases/download/{PYTHON_STANDALONE_TAG}/"
                ),
            },
        },
    ]
}

/// Fetch and parse one upstream index.
pub async fn fetch_index(client: &reqwest::Client, source: &UpstreamSource) -> Result<ReleaseIndex> {
    match source {
        UpstreamSource::ReleaseJson { url } => {
            let doc: Value = client
                .get(url)
                .send()
                .await
                .context("fetching release json")?
                .error_for_status()?
                .json()
                .await
                .context("parsing release json")?;
            Ok(parse_release_json(&doc))
        }
        UpstreamSource::HtmlIndex { url, pattern } => {
            let re = Regex::new(pattern).context("compiling index pattern")?;
            let body = client
                .get(url)
                .send()
                .await
                .context("fetching html index")?
                .error_for_status()?
                .text()
                .await?;
            Ok(scan_html_index(&body, &re))
        }
        UpstreamSource::AssetIndex {
            url,
            pattern,
            download_base,
        } => {
            let re = Regex::new(pattern).context("compiling asset pattern")?;
            let body = client
                .get(url)
                .send()
                .await
                .context("fetching asset index")?
                .error_for_status()?
                .text()
                .await?;
            Ok(scan_asset_index(&body, &re, download_base))
        }
    }
}

fn parse_release_json(doc: &Value) -> ReleaseIndex {
    let mut versions = Vec::new();
    if let Some(branches) = doc.as_object() {
        for branch in branches.values() {
            if let Some(list) = branch.get("supported_versions").and_then(Value::as_array) {
                for v in list {
                    if let Some(s) = v.as_str() {
                        versions.push(s.to_string());
                    }
                }
            }
        }
    }
    ReleaseIndex::new(versions, HashMap::new())
}

fn scan_html_index(body: &str, pattern: &Regex) -> ReleaseIndex {
    let versions = pattern
        .captures_iter(body)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    ReleaseIndex::new(versions, HashMap::new())
}

fn scan_asset_index(body: &str, pattern: &Regex, download_base: &str) -> ReleaseIndex {
    let mut versions = Vec::new();
    let mut binaries = HashMap::new();
    for cap in pattern.captures_iter(body) {
        let (Some(asset), Some(version)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        // First occurrence wins; the assets page lists newest tags first.
        binaries
            .entry(version.as_str().to_string())
            .or_insert_with(|| format!("{download_base}{}", asset.as_str()));
        versions.push(version.as_str().to_string());
    }
    ReleaseIndex::new(versions, binaries)
}

/// Refresh every source into the catalog, keeping previous snapshots on
/// failure.
pub async fn refresh_all(
    client: &reqwest::Client,
    catalog: &ReleaseCatalog,
    sources: &[EcosystemSource],
) {
    for src in sources {
        match fetch_index(client, &src.source).await {
            Ok(index) if !index.is_empty() => {
                debug!(
                    "refreshed {} releases for '{}'",
                    index.versions().len(),
                    src.ecosystem
                );
                catalog.install(&src.ecosystem, index);
            }
            Ok(_) => warn!(
                "release index for '{}' came back empty, keeping previous snapshot",
                src.ecosystem
            ),
            Err(e) => warn!(
                "failed to refresh release index for '{}': {e:#}",
                src.ecosystem
            ),
        }
    }
}

/// Background refresh scheduler owning its own task lifecycle.
pub struct CatalogRefresher {
    catalog: Arc<ReleaseCatalog>,
    sources: Arc<Vec<EcosystemSource>>,
    client: reqwest::Client,
    task: Option<JoinHandle<()>>,
}

impl CatalogRefresher {
    pub fn new(catalog: Arc<ReleaseCatalog>, sources: Vec<EcosystemSource>) -> Self {
        Self {
            catalog,
            sources: Arc::new(sources),
            client: reqwest::Client::new(),
            task: None,
        }
    }

    /// Run one refresh pass immediately.
    pub async fn refresh_once(&self) {
        refresh_all(&self.client, &self.catalog, &self.sources).await;
    }

    /// Start periodic refreshing. The first pass runs right away. A
    /// second `start` while running is a no-op.
    pub fn start(&mut self, interval: Duration) {
        if self.task.is_some() {
            return;
        }
        let catalog = Arc::clone(&self.catalog);
        let sources = Arc::clone(&self.sources);
        let client = self.client.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                refresh_all(&client, &catalog, &sources).await;
            }
        }));
    }

    /// Stop the background task, if running.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CatalogRefresher {
    fn drop(&mut self) {
        self.stop();
    }
}
