//! Online courses module.
//!
//! Searches the public Coursera catalog API for courses matching the topic.
//! The catalog endpoint needs no credentials, so this module is always
//! available. Partner (provider) names arrive as linked resources and are
//! joined back onto each course.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::modules::{
    parse_config, Module, ModuleConfig, ModuleError, ModuleOutput, ModuleResult, Table,
};
use crate::pipeline::cancel::CancelToken;

/// Coursera catalog search endpoint.
const COURSERA_CATALOG_API: &str = "https://api.coursera.org/api/courses.v1";

/// Page size per catalog request.
const PAGE_SIZE: usize = 25;

/// Configuration accepted by the courses module.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoursesConfig {
    /// Search keywords. The run topic is used when absent.
    #[serde(default)]
    pub keywords: Option<String>,
    /// Maximum courses to retrieve (5-50).
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    15
}

impl Default for CoursesConfig {
    fn default() -> Self {
        Self {
            keywords: None,
            max_results: default_max_results(),
        }
    }
}

/// One course row.
#[derive(Debug, Clone, Serialize)]
pub struct CourseRow {
    pub source: String,
    pub title: String,
    pub provider: String,
    pub url: String,
    pub description: String,
    pub workload: String,
}

/// Searches the Coursera catalog.
pub struct CoursesModule {
    http_client: Client,
}

impl Default for CoursesModule {
    fn default() -> Self {
        Self::new()
    }
}

impl CoursesModule {
    /// Creates the module. No credentials are required.
    pub fn new() -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Fetches one page of catalog search results.
    async fn fetch_page(
        &self,
        keywords: &str,
        start: usize,
        limit: usize,
    ) -> ModuleResult<CatalogResponse> {
        let url = format!(
            "{}?q=search&query={}&start={}&limit={}&fields=description,workload,partnerIds&includes=partnerIds",
            COURSERA_CATALOG_API,
            urlencoding::encode(keywords),
            start,
            limit,
        );
        debug!(%url, "Fetching Coursera catalog page");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ModuleError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(ModuleError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(ModuleError::Network(format!(
                "Coursera catalog returned status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ModuleError::Network(format!("Failed to parse catalog response: {}", e)))
    }
}

#[async_trait]
impl Module for CoursesModule {
    fn name(&self) -> &'static str {
        "courses"
    }

    fn display_name(&self) -> &'static str {
        "Online Courses"
    }

    fn description(&self) -> &'static str {
        "Search the Coursera catalog for relevant online courses"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(180)
    }

    fn validate(&self, config: &ModuleConfig) -> ModuleResult<()> {
        let config: CoursesConfig = parse_config(config)?;
        if !(5..=50).contains(&config.max_results) {
            return Err(ModuleError::Config(format!(
                "max_results must be between 5 and 50, got {}",
                config.max_results
            )));
        }
        if let Some(keywords) = &config.keywords {
            if keywords.trim().len() < 2 {
                return Err(ModuleError::Config(
                    "keywords must be at least 2 characters".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        topic: &str,
        config: &ModuleConfig,
        cancel: CancelToken,
    ) -> ModuleResult<ModuleOutput> {
        let config: CoursesConfig = parse_config(config)?;
        let keywords = config.keywords.as_deref().unwrap_or(topic);
        info!(keywords, max_results = config.max_results, "Searching Coursera catalog");

        let mut rows: Vec<CourseRow> = Vec::new();
        let mut start = 0;
        while rows.len() < config.max_results {
            if cancel.is_cancelled() {
                return Err(ModuleError::Cancelled);
            }

            let remaining = config.max_results - rows.len();
            let page = self
                .fetch_page(keywords, start, remaining.min(PAGE_SIZE))
                .await?;
            if page.elements.is_empty() {
                break;
            }

            let fetched = page.elements.len();
            rows.extend(course_rows(&page));
            if page.paging.next.is_none() {
                break;
            }
            start += fetched;
        }

        if rows.is_empty() {
            return Err(ModuleError::EmptyResult(format!(
                "no courses found for '{}'",
                keywords
            )));
        }

        rows.truncate(config.max_results);
        Ok(ModuleOutput::new().with_table(Table::new("courses", &rows)))
    }
}

/// Joins course elements with their linked partners into flat rows.
fn course_rows(page: &CatalogResponse) -> Vec<CourseRow> {
    let partners: HashMap<&str, &str> = page
        .linked
        .partners
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect();

    page.elements
        .iter()
        .map(|course| {
            let provider = course
                .partner_ids
                .iter()
                .filter_map(|id| partners.get(id.as_str()).copied())
                .collect::<Vec<_>>()
                .join(", ");

            let mut description = course.description.clone().unwrap_or_default();
            crate::modules::truncate_utf8(&mut description, 500);

            CourseRow {
                source: "coursera".to_string(),
                title: course.name.clone(),
                provider,
                url: format!("https://www.coursera.org/learn/{}", course.slug),
                description,
                workload: course.workload.clone().unwrap_or_default(),
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    elements: Vec<CatalogCourse>,
    #[serde(default)]
    linked: LinkedResources,
    #[serde(default)]
    paging: Paging,
}

#[derive(Debug, Deserialize)]
struct CatalogCourse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    workload: Option<String>,
    #[serde(rename = "partnerIds", default)]
    partner_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LinkedResources {
    #[serde(rename = "partners.v1", default)]
    partners: Vec<Partner>,
}

#[derive(Debug, Deserialize)]
struct Partner {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}
