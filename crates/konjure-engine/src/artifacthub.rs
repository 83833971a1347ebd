//! Artifact Hub chart resolution
//!
//! Artifact Hub package pages (`https://artifacthub.io/packages/helm/<repo>/<chart>`)
//! do not point at a chart directly; the package API provides the chart
//! name, version and the URL of the Helm repository hosting it.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Public Artifact Hub API endpoint
pub const ARTIFACT_HUB_API: &str = "https://artifacthub.io/api/v1";

/// Chart coordinates usable with `helm template --repo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChart {
    pub name: String,
    pub version: String,
    pub repository: String,
}

/// Looks up chart coordinates for an Artifact Hub package
pub trait ChartResolver {
    fn resolve(&self, repo: &str, chart: &str, version: Option<&str>) -> Result<ResolvedChart>;
}

#[derive(Debug, Deserialize)]
struct PackageResponse {
    name: String,
    version: String,
    repository: RepositoryResponse,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    url: String,
}

/// Artifact Hub API client
#[derive(Debug, Clone)]
pub struct ArtifactHubClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl ArtifactHubClient {
    /// Client for the public Artifact Hub
    pub fn new() -> Self {
        Self::with_base_url(ARTIFACT_HUB_API)
    }

    /// Client for another API endpoint (mirrors, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("konjure/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn package_url(&self, repo: &str, chart: &str, version: Option<&str>) -> String {
        let mut url = format!(
            "{}/packages/helm/{}/{}",
            self.base_url.trim_end_matches('/'),
            repo,
            chart
        );
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            url.push('/');
            url.push_str(version);
        }
        url
    }
}

impl Default for ArtifactHubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartResolver for ArtifactHubClient {
    fn resolve(&self, repo: &str, chart: &str, version: Option<&str>) -> Result<ResolvedChart> {
        let url = self.package_url(repo, chart, version);
        tracing::debug!(%url, "resolving chart with Artifact Hub");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let package: PackageResponse = response.json()?;
        Ok(ResolvedChart {
            name: package.name,
            version: package.version,
            repository: package.repository.url,
        })
    }
}
