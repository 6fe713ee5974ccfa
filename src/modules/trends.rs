//! Search-interest trends module.
//!
//! Tracks Google search interest for up to five terms over a configurable
//! timeframe using the SerpAPI Google Trends engine, and derives per-term
//! summary statistics including a coarse trend direction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Settings;
use crate::modules::{
    parse_config, Module, ModuleConfig, ModuleError, ModuleOutput, ModuleResult, Table,
};
use crate::pipeline::cancel::CancelToken;

/// SerpAPI search endpoint.
const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";

/// Timeframes accepted by the Google Trends engine.
const TIMEFRAMES: &[&str] = &["today 1-m", "today 3-m", "today 12-m", "today 5-y"];

/// Maximum terms Google Trends compares in one request.
const MAX_TERMS: usize = 5;

/// Configuration accepted by the trends module.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrendsConfig {
    /// Terms to track. The run topic is used when absent.
    #[serde(default)]
    pub terms: Option<Vec<String>>,
    /// Trend timeframe, one of the Google Trends presets.
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// Geographic region code; empty string means worldwide.
    #[serde(default = "default_geo")]
    pub geo: String,
}

fn default_timeframe() -> String {
    "today 12-m".to_string()
}

fn default_geo() -> String {
    "US".to_string()
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            terms: None,
            timeframe: default_timeframe(),
            geo: default_geo(),
        }
    }
}

/// One interest-over-time row.
#[derive(Debug, Clone, Serialize)]
pub struct InterestPoint {
    pub date: String,
    pub term: String,
    pub interest: u32,
}

/// Coarse direction of a term's interest over the timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Rising,
    Declining,
    Stable,
    /// Not enough data points to judge.
    Unknown,
}

/// Per-term summary row.
#[derive(Debug, Clone, Serialize)]
pub struct TrendSummary {
    pub term: String,
    pub avg_interest: f64,
    pub peak_interest: u32,
    pub current_interest: u32,
    pub trend_direction: TrendDirection,
}

/// Collects search-interest trends.
pub struct TrendsModule {
    http_client: Client,
    serpapi_key: String,
}

impl TrendsModule {
    /// Creates the module, capturing the SerpAPI key.
    pub fn new(settings: &Settings) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            serpapi_key: settings.serpapi_key.clone(),
        }
    }

    async fn fetch_timeseries(
        &self,
        terms: &[String],
        timeframe: &str,
        geo: &str,
    ) -> ModuleResult<Vec<TimelinePoint>> {
        info!(?terms, timeframe, geo, "Fetching Google Trends timeseries");

        let query = terms.join(",");
        let mut params = vec![
            ("engine", "google_trends"),
            ("q", query.as_str()),
            ("data_type", "TIMESERIES"),
            ("date", timeframe),
            ("api_key", self.serpapi_key.as_str()),
        ];
        if !geo.is_empty() {
            params.push(("geo", geo));
        }

        let response = self
            .http_client
            .get(SERPAPI_ENDPOINT)
            .query(&params)
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
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ModuleError::Auth(format!(
                "SerpAPI rejected the request with status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ModuleError::Network(format!(
                "SerpAPI returned status {}",
                status
            )));
        }

        let body: SerpApiTrendsResponse = response
            .json()
            .await
            .map_err(|e| ModuleError::Network(format!("Failed to parse SerpAPI response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(ModuleError::EmptyResult(format!("SerpAPI error: {}", error)));
        }

        let timeline = body.interest_over_time.timeline_data;
        debug!(points = timeline.len(), "Parsed trends timeline");
        Ok(timeline)
    }
}

#[async_trait]
impl Module for TrendsModule {
    fn name(&self) -> &'static str {
        "trends"
    }

    fn display_name(&self) -> &'static str {
        "Search Interest Trends"
    }

    fn description(&self) -> &'static str {
        "Track Google search interest for skills and topics over time"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    fn validate(&self, config: &ModuleConfig) -> ModuleResult<()> {
        if self.serpapi_key.is_empty() {
            return Err(ModuleError::Config(
                "SERPAPI_KEY is not configured".to_string(),
            ));
        }

        let config: TrendsConfig = parse_config(config)?;
        if let Some(terms) = &config.terms {
            let non_empty = terms.iter().filter(|t| !t.trim().is_empty()).count();
            if non_empty == 0 {
                return Err(ModuleError::Config(
                    "at least one non-empty term is required".to_string(),
                ));
            }
            if non_empty > MAX_TERMS {
                return Err(ModuleError::Config(format!(
                    "at most {} terms can be compared at once, got {}",
                    MAX_TERMS, non_empty
                )));
            }
        }
        if !TIMEFRAMES.contains(&config.timeframe.as_str()) {
            return Err(ModuleError::Config(format!(
                "timeframe must be one of {:?}, got '{}'",
                TIMEFRAMES, config.timeframe
            )));
        }
        Ok(())
    }

    async fn execute(
        &self,
        topic: &str,
        config: &ModuleConfig,
        cancel: CancelToken,
    ) -> ModuleResult<ModuleOutput> {
        let config: TrendsConfig = parse_config(config)?;
        let terms: Vec<String> = config
            .terms
            .unwrap_or_else(|| vec![topic.to_string()])
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(MAX_TERMS)
            .collect();

        if cancel.is_cancelled() {
            return Err(ModuleError::Cancelled);
        }

        let timeline = self
            .fetch_timeseries(&terms, &config.timeframe, &config.geo)
            .await?;
        if timeline.is_empty() {
            return Err(ModuleError::EmptyResult(format!(
                "no trend data returned for {:?}",
                terms
            )));
        }

        let points = flatten_timeline(&timeline);
        let summaries = summarize_terms(&terms, &points);

        Ok(ModuleOutput::new()
            .with_table(Table::new("interest_over_time", &points))
            .with_table(Table::new("trend_summary", &summaries)))
    }
}

/// Flattens the SerpAPI timeline into one row per (date, term).
fn flatten_timeline(timeline: &[TimelinePoint]) -> Vec<InterestPoint> {
    timeline
        .iter()
        .flat_map(|point| {
            point.values.iter().map(|value| InterestPoint {
                date: point.date.clone(),
                term: value.query.clone(),
                interest: value.extracted_value,
            })
        })
        .collect()
}

/// Derives per-term summary statistics from the flattened points.
fn summarize_terms(terms: &[String], points: &[InterestPoint]) -> Vec<TrendSummary> {
    terms
        .iter()
        .filter_map(|term| {
            let interests: Vec<u32> = points
                .iter()
                .filter(|p| &p.term == term)
                .map(|p| p.interest)
                .collect();
            if interests.is_empty() {
                return None;
            }

            let sum: u32 = interests.iter().sum();
            let avg = sum as f64 / interests.len() as f64;
            Some(TrendSummary {
                term: term.clone(),
                avg_interest: (avg * 10.0).round() / 10.0,
                peak_interest: interests.iter().copied().max().unwrap_or(0),
                current_interest: interests.last().copied().unwrap_or(0),
                trend_direction: trend_direction(&interests),
            })
        })
        .collect()
}

/// Compares the first and last four data points to classify the direction.
fn trend_direction(interests: &[u32]) -> TrendDirection {
    if interests.len() < 8 {
        return TrendDirection::Unknown;
    }

    let older: f64 = interests[..4].iter().sum::<u32>() as f64 / 4.0;
    let recent: f64 =
        interests[interests.len() - 4..].iter().sum::<u32>() as f64 / 4.0;

    if recent > older * 1.1 {
        TrendDirection::Rising
    } else if recent < older * 0.9 {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiTrendsResponse {
    #[serde(default)]
    interest_over_time: InterestOverTime,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InterestOverTime {
    #[serde(default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    #[serde(default)]
    date: String,
    #[serde(default)]
    values: Vec<TimelineValue>,
}

#[derive(Debug, Deserialize)]
struct TimelineValue {
    #[serde(default)]
    query: String,
    #[serde(default)]
    extracted_value: u32,
}
