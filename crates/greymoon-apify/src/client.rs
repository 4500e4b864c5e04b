use std::time::Duration;

use async_trait::async_trait;
use greymoon_core::RunStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::cities::{search_urls, validate_selection};
use crate::{parse_remote_status, DatasetSource, JobLauncher, LaunchedRun, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";
pub const DEFAULT_ACTOR_ID: &str = "ivanvs~craigslist-scraper";

/// Posts older than this many days are skipped by the actor.
const MAX_POST_AGE_DAYS: u32 = 15;

#[derive(Debug, Clone)]
pub struct ApifyConfig {
    pub base_url: String,
    pub token: String,
    pub actor_id: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for ApifyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            actor_id: DEFAULT_ACTOR_ID.to_string(),
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

#[derive(Debug, Clone, Deserialize)]
struct RunData {
    id: String,
    status: String,
    #[serde(rename = "defaultDatasetId")]
    default_dataset_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfiguration {
    #[serde(rename = "useApifyProxy")]
    pub use_apify_proxy: bool,
    #[serde(rename = "apifyProxyGroups")]
    pub apify_proxy_groups: Vec<String>,
    #[serde(rename = "apifyProxyCountry")]
    pub apify_proxy_country: String,
}

/// Input for the Craigslist scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct CraigslistScraperInput {
    pub urls: Vec<StartUrl>,
    #[serde(rename = "maxAge")]
    pub max_age: u32,
    #[serde(rename = "maxConcurrency")]
    pub max_concurrency: u32,
    #[serde(rename = "proxyConfiguration")]
    pub proxy_configuration: ProxyConfiguration,
}

impl CraigslistScraperInput {
    /// One start URL per (city, category), crawled serially through US residential proxies.
    pub fn for_cities(selection: &[String]) -> Self {
        Self {
            urls: search_urls(selection)
                .into_iter()
                .map(|url| StartUrl { url })
                .collect(),
            max_age: MAX_POST_AGE_DAYS,
            max_concurrency: 1,
            proxy_configuration: ProxyConfiguration {
                use_apify_proxy: true,
                apify_proxy_groups: vec!["RESIDENTIAL".to_string()],
                apify_proxy_country: "US".to_string(),
            },
        }
    }
}

pub struct ApifyClient {
    client: reqwest::Client,
    config: ApifyConfig,
}

impl ApifyClient {
    pub fn new(config: ApifyConfig) -> Result<Self, SourceError> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SourceError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(SourceError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl JobLauncher for ApifyClient {
    async fn start(&self, selection: &[String]) -> Result<LaunchedRun, SourceError> {
        validate_selection(selection)?;
        let input = CraigslistScraperInput::for_cities(selection);

        let resp = self
            .client
            .post(self.url(&format!("acts/{}/runs", self.config.actor_id)))
            .bearer_auth(&self.config.token)
            .json(&input)
            .send()
            .await?;
        let api_resp: ApiResponse<RunData> = Self::check(resp).await?.json().await?;

        info!(
            run_id = %api_resp.data.id,
            dataset_id = %api_resp.data.default_dataset_id,
            cities = selection.len(),
            start_urls = input.urls.len(),
            "apify run started"
        );
        Ok(LaunchedRun {
            run_id: api_resp.data.id,
            dataset_id: api_resp.data.default_dataset_id,
        })
    }
}

#[async_trait]
impl DatasetSource for ApifyClient {
    async fn fetch_page(
        &self,
        dataset_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<JsonValue>, SourceError> {
        let resp = self
            .client
            .get(self.url(&format!(
                "datasets/{dataset_id}/items?clean=true&offset={offset}&limit={limit}"
            )))
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        let items: Vec<JsonValue> = Self::check(resp).await?.json().await?;
        debug!(dataset_id, offset, count = items.len(), "fetched dataset page");
        Ok(items)
    }

    async fn get_status(&self, run_id: &str) -> Result<RunStatus, SourceError> {
        let resp = self
            .client
            .get(self.url(&format!("actor-runs/{run_id}")))
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        let api_resp: ApiResponse<RunData> = Self::check(resp).await?.json().await?;
        parse_remote_status(&api_resp.data.status)
    }

    async fn abort(&self, run_id: &str) -> Result<(), SourceError> {
        let resp = self
            .client
            .post(self.url(&format!("actor-runs/{run_id}/abort")))
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        Self::check(resp).await?;
        info!(run_id, "apify run abort requested");
        Ok(())
    }
}
