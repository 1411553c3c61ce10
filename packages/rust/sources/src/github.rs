//! GitHub repository source.
//!
//! Lists a branch with the git trees API (`?recursive=1`) and keeps entries
//! under a path prefix. File text is fetched lazily from the raw content host.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use docuify_core::{ContentLoader, Item, Metadata, Source};
use docuify_shared::{DocuifyError, GithubDefaults, Result, extension_of};

/// Source name recorded in build footers.
const SOURCE_NAME: &str = "github";

/// User-Agent string for GitHub requests (the API rejects requests without one).
const USER_AGENT: &str = concat!("Docuify/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Parameters of a [`GithubSource`].
#[derive(Clone)]
pub struct GithubConfig {
    pub token: String,
    pub branch: String,
    /// `owner/repo`.
    pub repo_full_name: String,
    /// Only entries whose path starts with this prefix are kept.
    pub path: String,
    pub api_base: String,
    pub raw_base: String,
    pub api_version: String,
    /// Tree entry fields copied into item metadata.
    pub metadata_fields: Vec<String>,
}

impl GithubConfig {
    /// Config with endpoint settings taken from the `[github]` config section.
    pub fn from_defaults(
        defaults: &GithubDefaults,
        token: impl Into<String>,
        repo_full_name: impl Into<String>,
        branch: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            branch: branch.into(),
            repo_full_name: repo_full_name.into(),
            path: path.into(),
            api_base: defaults.api_base.clone(),
            raw_base: defaults.raw_base.clone(),
            api_version: defaults.api_version.clone(),
            metadata_fields: defaults.metadata_fields.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("token", &self.token),
            ("branch", &self.branch),
            ("repo_full_name", &self.repo_full_name),
            ("path", &self.path),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(DocuifyError::config(format!("github source requires a non-empty `{field}`")));
        }
        if !self.repo_full_name.contains('/') {
            return Err(DocuifyError::config(format!(
                "github repository must be `owner/repo`, got '{}'",
                self.repo_full_name
            )));
        }
        for base in [&self.api_base, &self.raw_base] {
            Url::parse(base)
                .map_err(|e| DocuifyError::config(format!("invalid github base url '{base}': {e}")))?;
        }
        Ok(())
    }

    fn tree_url(&self) -> String {
        format!(
            "{}/repos/{}/git/trees/{}?recursive=1",
            self.api_base.trim_end_matches('/'),
            self.repo_full_name,
            self.branch
        )
    }

    fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.raw_base.trim_end_matches('/'),
            self.repo_full_name,
            self.branch,
            path
        )
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &"<redacted>")
            .field("branch", &self.branch)
            .field("repo_full_name", &self.repo_full_name)
            .field("path", &self.path)
            .field("api_base", &self.api_base)
            .field("raw_base", &self.raw_base)
            .field("api_version", &self.api_version)
            .field("metadata_fields", &self.metadata_fields)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<serde_json::Map<String, Value>>,
    #[serde(default)]
    truncated: bool,
}

/// Items from one branch of a GitHub repository.
#[derive(Debug)]
pub struct GithubSource {
    config: GithubConfig,
    client: Client,
}

impl GithubSource {
    /// Validate `config` and build the HTTP client.
    pub fn new(config: GithubConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DocuifyError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        authorize(self.client.get(url), &self.config.token, &self.config.api_version)
    }

    fn to_item(&self, entry: &serde_json::Map<String, Value>) -> Option<Item> {
        let path = entry.get("path")?.as_str()?;
        if !path.starts_with(&self.config.path) {
            return None;
        }

        let metadata: Metadata = self
            .config
            .metadata_fields
            .iter()
            .filter_map(|field| entry.get(field).map(|v| (field.clone(), v.clone())))
            .collect();

        if entry.get("type").and_then(Value::as_str) == Some("tree") {
            return Some(Item::folder(path).with_metadata(metadata));
        }

        let loader = GithubContentLoader {
            client: self.client.clone(),
            url: self.config.raw_url(path),
            path: path.to_string(),
            token: self.config.token.clone(),
            api_version: self.config.api_version.clone(),
        };
        let mut item = Item::file(path).with_metadata(metadata).with_loader(loader);
        item.extension = extension_of(path);
        Some(item)
    }
}

#[async_trait]
impl Source for GithubSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(skip_all, fields(repo = %self.config.repo_full_name, branch = %self.config.branch))]
    async fn fetch(&self) -> Result<Vec<Item>> {
        let url = self.config.tree_url();
        debug!(%url, "requesting repository tree");

        let response = self
            .request(&url)
            .send()
            .await
            .map_err(|e| DocuifyError::source_fetch(SOURCE_NAME, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocuifyError::source_fetch(
                SOURCE_NAME,
                format!("{url}: HTTP {status}"),
            ));
        }

        let body: TreeResponse = response.json().await.map_err(|e| {
            DocuifyError::source_fetch(SOURCE_NAME, format!("{url}: invalid tree response: {e}"))
        })?;

        if body.truncated {
            warn!("repository tree was truncated by the API, some entries are missing");
        }

        let items: Vec<Item> = body.tree.iter().filter_map(|entry| self.to_item(entry)).collect();

        info!(entries = body.tree.len(), items = items.len(), "repository tree listed");
        Ok(items)
    }
}

fn authorize(request: reqwest::RequestBuilder, token: &str, api_version: &str) -> reqwest::RequestBuilder {
    request
        .bearer_auth(token)
        .header("X-GitHub-Api-Version", api_version)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
}

// ---------------------------------------------------------------------------
// Content loader
// ---------------------------------------------------------------------------

/// Fetches one file from the raw content host on demand.
struct GithubContentLoader {
    client: Client,
    url: String,
    path: String,
    token: String,
    api_version: String,
}

#[async_trait]
impl ContentLoader for GithubContentLoader {
    async fn load(&self) -> Result<String> {
        debug!(url = %self.url, "fetching file content");

        let response = authorize(self.client.get(&self.url), &self.token, &self.api_version)
            .send()
            .await
            .map_err(|e| DocuifyError::content_load(&self.path, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocuifyError::content_load(&self.path, format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| DocuifyError::content_load(&self.path, format!("body read failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
