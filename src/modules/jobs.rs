//! Job postings and labor data module.
//!
//! Collects current job postings from Google Jobs via SerpAPI and enriches
//! them with BLS Occupational Employment and Wage Statistics. Skills are
//! extracted from posting descriptions by keyword matching, which keeps the
//! module useful without Lightcast credentials.
//!
//! Free tier limits:
//! - SerpAPI: 100 searches/month
//! - BLS API v1: 25 queries/day (no key), v2: 500 queries/day (with key)

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::modules::{
    parse_config, Module, ModuleConfig, ModuleError, ModuleOutput, ModuleResult, Table,
};
use crate::pipeline::cancel::CancelToken;

/// SerpAPI search endpoint.
const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";

/// BLS public API v2 timeseries endpoint.
const BLS_TIMESERIES_ENDPOINT: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";

/// Keywords matched against posting descriptions for skill extraction.
const COMMON_SKILLS: &[&str] = &[
    // Technical
    "python",
    "java",
    "javascript",
    "typescript",
    "sql",
    "nosql",
    "aws",
    "azure",
    "gcp",
    "docker",
    "kubernetes",
    "react",
    "angular",
    "vue",
    "node.js",
    "django",
    "flask",
    "machine learning",
    "deep learning",
    "data science",
    "data analysis",
    "statistics",
    "excel",
    "tableau",
    "power bi",
    "salesforce",
    "sap",
    "oracle",
    // Soft skills
    "communication",
    "leadership",
    "project management",
    "problem solving",
    "teamwork",
    "analytical",
    "critical thinking",
    "time management",
    // Certifications
    "pmp",
    "cpa",
    "cissp",
    "aws certified",
    "azure certified",
    "six sigma",
    "scrum",
    "agile",
    "itil",
];

/// SOC occupations the BLS lookup can match a query against.
///
/// A small curated subset of the SOC taxonomy covering the most common
/// searches; the full crosswalk is out of scope.
const SOC_OCCUPATIONS: &[(&str, &str)] = &[
    ("15-1252", "Software Developers"),
    ("15-1251", "Computer Programmers"),
    ("15-1211", "Computer Systems Analysts"),
    ("15-1212", "Information Security Analysts"),
    ("15-2051", "Data Scientists"),
    ("15-1244", "Network and Computer Systems Administrators"),
    ("13-2011", "Accountants and Auditors"),
    ("13-1111", "Management Analysts"),
    ("13-2051", "Financial Analysts"),
    ("13-1161", "Market Research Analysts"),
    ("29-1141", "Registered Nurses"),
    ("29-1071", "Physician Assistants"),
    ("11-1021", "General and Operations Managers"),
    ("11-2021", "Marketing Managers"),
    ("11-3021", "Computer and Information Systems Managers"),
    ("25-2031", "Secondary School Teachers"),
];

/// Configuration accepted by the jobs module.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    /// Search keywords. The run topic is used when absent.
    #[serde(default)]
    pub query: Option<String>,
    /// Search location.
    #[serde(default = "default_location")]
    pub location: String,
    /// Maximum postings to retrieve (5-100).
    #[serde(default = "default_results_limit")]
    pub results_limit: usize,
    /// Whether to fetch BLS employment and wage statistics.
    #[serde(default = "default_true")]
    pub include_bls: bool,
    /// Whether to extract skills from posting descriptions.
    #[serde(default = "default_true")]
    pub extract_skills: bool,
}

fn default_location() -> String {
    "United States".to_string()
}

fn default_results_limit() -> usize {
    20
}

fn default_true() -> bool {
    true
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            query: None,
            location: default_location(),
            results_limit: default_results_limit(),
            include_bls: true,
            extract_skills: true,
        }
    }
}

/// One job posting row.
#[derive(Debug, Clone, Serialize)]
pub struct JobPosting {
    pub job_title: String,
    pub company: String,
    pub location: String,
    pub posted_date: String,
    pub employment_type: String,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub description: String,
    pub skills_extracted: String,
    pub source: String,
    pub apply_url: String,
}

/// One BLS occupation row.
#[derive(Debug, Clone, Serialize)]
pub struct WageStat {
    pub soc_code: String,
    pub occupation_title: String,
    pub employment: Option<f64>,
    pub mean_annual_wage: Option<f64>,
    pub median_hourly_wage: Option<f64>,
}

/// One skill-frequency row.
#[derive(Debug, Clone, Serialize)]
pub struct SkillCount {
    pub skill: String,
    pub frequency: usize,
    pub percentage: f64,
}

/// Collects job postings and labor statistics.
pub struct JobsModule {
    http_client: Client,
    serpapi_key: String,
    bls_api_key: String,
}

impl JobsModule {
    /// Creates the module, capturing the credentials it needs.
    pub fn new(settings: &Settings) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            serpapi_key: settings.serpapi_key.clone(),
            bls_api_key: settings.bls_api_key.clone(),
        }
    }

    /// Fetches postings from the SerpAPI Google Jobs engine.
    async fn fetch_postings(
        &self,
        query: &str,
        location: &str,
        limit: usize,
    ) -> ModuleResult<Vec<SerpApiJob>> {
        info!(query, location, limit, "Fetching Google Jobs postings");

        let limit_param = limit.min(100).to_string();
        let response = self
            .http_client
            .get(SERPAPI_ENDPOINT)
            .query(&[
                ("engine", "google_jobs"),
                ("q", query),
                ("location", location),
                ("api_key", self.serpapi_key.as_str()),
                ("num", limit_param.as_str()),
            ])
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

        let body: SerpApiJobsResponse = response
            .json()
            .await
            .map_err(|e| ModuleError::Network(format!("Failed to parse SerpAPI response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(ModuleError::EmptyResult(format!("SerpAPI error: {}", error)));
        }

        debug!(count = body.jobs_results.len(), "Parsed SerpAPI postings");
        Ok(body.jobs_results)
    }

    /// Fetches BLS employment and wage series for occupations matching the
    /// query.
    async fn fetch_wage_stats(&self, query: &str) -> ModuleResult<Vec<WageStat>> {
        let occupations = relevant_soc_codes(query);
        if occupations.is_empty() {
            debug!(query, "No SOC codes matched the query");
            return Ok(Vec::new());
        }

        let series_ids = build_series_ids(&occupations);
        info!(series = series_ids.len(), "Fetching BLS timeseries");

        let mut payload = serde_json::json!({
            "seriesid": series_ids,
            "startyear": "2023",
            "endyear": "2024",
        });
        if !self.bls_api_key.is_empty() {
            payload["registrationkey"] = serde_json::Value::String(self.bls_api_key.clone());
        }

        let response = self
            .http_client
            .post(BLS_TIMESERIES_ENDPOINT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ModuleError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModuleError::Network(format!(
                "BLS API returned status {}",
                status
            )));
        }

        let body: BlsResponse = response
            .json()
            .await
            .map_err(|e| ModuleError::Network(format!("Failed to parse BLS response: {}", e)))?;

        if body.status != "REQUEST_SUCCEEDED" {
            return Err(ModuleError::EmptyResult(format!(
                "BLS request failed: {}",
                body.message.join("; ")
            )));
        }

        Ok(parse_bls_series(&body.results.series, &occupations))
    }
}

#[async_trait]
impl Module for JobsModule {
    fn name(&self) -> &'static str {
        "jobs"
    }

    fn display_name(&self) -> &'static str {
        "Job Postings & Labor Data"
    }

    fn description(&self) -> &'static str {
        "Search Google Jobs for current postings and enrich with BLS employment and wage statistics"
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

        let config: JobsConfig = parse_config(config)?;
        if !(5..=100).contains(&config.results_limit) {
            return Err(ModuleError::Config(format!(
                "results_limit must be between 5 and 100, got {}",
                config.results_limit
            )));
        }
        if let Some(query) = &config.query {
            if query.trim().len() < 2 {
                return Err(ModuleError::Config(
                    "query must be at least 2 characters".to_string(),
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
        let config: JobsConfig = parse_config(config)?;
        let query = config.query.as_deref().unwrap_or(topic);

        if cancel.is_cancelled() {
            return Err(ModuleError::Cancelled);
        }

        let postings = self
            .fetch_postings(query, &config.location, config.results_limit)
            .await?;
        if postings.is_empty() {
            return Err(ModuleError::EmptyResult(format!(
                "no job postings found for '{}' in '{}'",
                query, config.location
            )));
        }

        let mut all_skills = Vec::new();
        let rows: Vec<JobPosting> = postings
            .iter()
            .map(|job| {
                let skills = if config.extract_skills {
                    extract_skills(&job.description)
                } else {
                    Vec::new()
                };
                all_skills.extend(skills.iter().cloned());
                posting_row(job, &skills)
            })
            .collect();

        let mut output = ModuleOutput::new().with_table(Table::new("jobs", &rows));

        if cancel.is_cancelled() {
            return Err(ModuleError::Cancelled);
        }

        // Wage statistics are an enrichment, not a hard requirement: a BLS
        // failure downgrades to a warning instead of failing the module.
        if config.include_bls {
            match self.fetch_wage_stats(query).await {
                Ok(stats) if !stats.is_empty() => {
                    output = output.with_table(Table::new("wages", &stats));
                }
                Ok(_) => debug!(query, "No BLS occupation data matched the query"),
                Err(e) => warn!(error = %e, "BLS enrichment failed, continuing without wages"),
            }
        }

        if config.extract_skills && !all_skills.is_empty() {
            let summary = skills_summary(&all_skills, rows.len());
            output = output.with_table(Table::new("skills_summary", &summary));
        }

        Ok(output)
    }
}

fn posting_row(job: &SerpApiJob, skills: &[String]) -> JobPosting {
    let extensions = job.detected_extensions.clone().unwrap_or_default();
    let (salary_min, salary_max) = parse_salary(extensions.salary.as_deref().unwrap_or(""));

    let mut description = job.description.clone();
    crate::modules::truncate_utf8(&mut description, 1000);

    JobPosting {
        job_title: job.title.clone(),
        company: job.company_name.clone(),
        location: job.location.clone(),
        posted_date: extensions.posted_at.unwrap_or_default(),
        employment_type: extensions.schedule_type.unwrap_or_default(),
        salary_min,
        salary_max,
        description,
        skills_extracted: skills.join(", "),
        source: job.via.clone(),
        apply_url: job.share_link.clone().unwrap_or_default(),
    }
}

/// Parses a salary range string like "$50,000 - $70,000" or "$60K-$80K"
/// into numeric bounds.
fn parse_salary(salary: &str) -> (Option<f64>, Option<f64>) {
    if salary.is_empty() {
        return (None, None);
    }

    let k_notation = salary.to_lowercase().contains('k');
    let mut numbers = Vec::new();
    let mut current = String::new();
    for c in salary.chars() {
        if c.is_ascii_digit() || c == '.' {
            current.push(c);
        } else if c != ',' && !current.is_empty() {
            numbers.push(current.clone());
            current.clear();
        }
    }
    if !current.is_empty() {
        numbers.push(current);
    }

    let parse = |s: &String| -> Option<f64> {
        let value: f64 = s.parse().ok()?;
        Some(if k_notation { value * 1000.0 } else { value })
    };

    match numbers.as_slice() {
        [] => (None, None),
        [single] => (parse(single), None),
        [min, max, ..] => (parse(min), parse(max)),
    }
}

/// Extracts known skills mentioned in free text by word-boundary matching.
fn extract_skills(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let text_lower = text.to_lowercase();
    COMMON_SKILLS
        .iter()
        .filter(|skill| contains_word(&text_lower, skill))
        .map(|skill| skill.to_string())
        .collect()
}

/// Whole-word containment check; avoids matching "java" inside "javascript".
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = begin == 0
            || !haystack[..begin]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after_ok = end == haystack.len()
            || !haystack[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = begin + needle.len();
    }
    false
}

/// Aggregates extracted skills into frequency rows, most frequent first.
fn skills_summary(all_skills: &[String], total_postings: usize) -> Vec<SkillCount> {
    if all_skills.is_empty() || total_postings == 0 {
        return Vec::new();
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for skill in all_skills {
        *counts.entry(skill.as_str()).or_insert(0) += 1;
    }

    let mut rows: Vec<SkillCount> = counts
        .into_iter()
        .map(|(skill, frequency)| SkillCount {
            skill: skill.to_string(),
            frequency,
            percentage: (frequency as f64 / total_postings as f64 * 1000.0).round() / 10.0,
        })
        .collect();
    rows.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.skill.cmp(&b.skill)));
    rows
}

/// Maps a search query to matching SOC occupations, capped at five to stay
/// within BLS request limits.
fn relevant_soc_codes(query: &str) -> Vec<(&'static str, &'static str)> {
    let query_lower = query.to_lowercase();
    let keywords: Vec<&str> = query_lower.split_whitespace().collect();

    SOC_OCCUPATIONS
        .iter()
        .filter(|(_, title)| {
            let title_lower = title.to_lowercase();
            keywords.iter().any(|kw| title_lower.contains(kw))
                || (query_lower.contains("data")
                    && (title_lower.contains("data") || title_lower.contains("analyst")))
                || (query_lower.contains("cyber") && title_lower.contains("security"))
        })
        .take(5)
        .copied()
        .collect()
}

/// Builds BLS OEWS series IDs for national, all-industry data.
///
/// Series ID format: OEUN + area(7) + industry(6) + occupation(6) + datatype(2).
/// Datatypes: 01 = employment, 04 = mean annual wage, 13 = median hourly wage.
fn build_series_ids(occupations: &[(&str, &str)]) -> Vec<String> {
    let mut ids = Vec::with_capacity(occupations.len() * 3);
    for (soc_code, _) in occupations {
        let soc_clean = soc_code.replace('-', "");
        let base = format!("OEUN0000000000000{}", soc_clean);
        ids.push(format!("{}01", base));
        ids.push(format!("{}04", base));
        ids.push(format!("{}13", base));
    }
    ids
}

/// Folds BLS series responses back into one row per occupation.
fn parse_bls_series(
    series: &[BlsSeries],
    occupations: &[(&str, &str)],
) -> Vec<WageStat> {
    let titles: HashMap<&str, &str> = occupations.iter().copied().collect();
    let mut stats: HashMap<String, WageStat> = HashMap::new();

    for entry in series {
        // OEUN(4) + area(7) + industry(6) + SOC(6) + datatype(2) = 25 chars
        if entry.series_id.len() < 25 {
            warn!(series_id = %entry.series_id, "Unexpected BLS series id format");
            continue;
        }
        let soc_raw = &entry.series_id[17..23];
        let soc_code = format!("{}-{}", &soc_raw[..2], &soc_raw[2..]);
        let datatype = &entry.series_id[23..25];

        let Some(latest) = entry.data.first() else {
            continue;
        };
        let value: Option<f64> = latest.value.parse().ok();

        let stat = stats.entry(soc_code.clone()).or_insert_with(|| WageStat {
            occupation_title: titles
                .get(soc_code.as_str())
                .map(|t| t.to_string())
                .unwrap_or_default(),
            soc_code,
            employment: None,
            mean_annual_wage: None,
            median_hourly_wage: None,
        });
        match datatype {
            "01" => stat.employment = value,
            "04" => stat.mean_annual_wage = value,
            "13" => stat.median_hourly_wage = value,
            _ => {}
        }
    }

    let mut rows: Vec<WageStat> = stats.into_values().collect();
    rows.sort_by(|a, b| a.soc_code.cmp(&b.soc_code));
    rows
}

#[derive(Debug, Deserialize)]
struct SerpApiJobsResponse {
    #[serde(default)]
    jobs_results: Vec<SerpApiJob>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpApiJob {
    #[serde(default)]
    title: String,
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    via: String,
    #[serde(default)]
    share_link: Option<String>,
    #[serde(default)]
    detected_extensions: Option<DetectedExtensions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DetectedExtensions {
    #[serde(default)]
    posted_at: Option<String>,
    #[serde(default)]
    schedule_type: Option<String>,
    #[serde(default)]
    salary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlsResponse {
    status: String,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results", default)]
    results: BlsResults,
}

#[derive(Debug, Default, Deserialize)]
struct BlsResults {
    #[serde(default)]
    series: Vec<BlsSeries>,
}

#[derive(Debug, Deserialize)]
struct BlsSeries {
    #[serde(rename = "seriesID")]
    series_id: String,
    #[serde(default)]
    data: Vec<BlsDataPoint>,
}

#[derive(Debug, Deserialize)]
struct BlsDataPoint {
    #[serde(default)]
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_salary_range() {
        let (min, max) = parse_salary("$50,000 - $70,000");
        assert_eq!(min, Some(50000.0));
        assert_eq!(max, Some(70000.0));
    }

    #[test]
    fn test_parse_salary_k_notation() {
        let (min, max) = parse_salary("$60K-$80K");
        assert_eq!(min, Some(60000.0));
        assert_eq!(max, Some(80000.0));
    }

    #[test]
    fn test_parse_salary_single_value() {
        let (min, max) = parse_salary("$25 an hour");
        assert_eq!(min, Some(25.0));
        assert_eq!(max, None);
    }

    #[test]
    fn test_parse_salary_empty() {
        assert_eq!(parse_salary(""), (None, None));
    }

    #[test]
    fn test_extract_skills_word_boundaries() {
        let skills = extract_skills("Experience with Java and SQL required. JavaScript a plus.");
        assert!(skills.contains(&"java".to_string()));
        assert!(skills.contains(&"javascript".to_string()));
        assert!(skills.contains(&"sql".to_string()));
    }

    #[test]
    fn test_extract_skills_no_partial_match() {
        // "javascript" alone must not match "java"
        let skills = extract_skills("We use javascript everywhere");
        assert!(!skills.contains(&"java".to_string()));
        assert!(skills.contains(&"javascript".to_string()));
    }

    #[test]
    fn test_skills_summary_sorted_by_frequency() {
        let skills = vec![
            "python".to_string(),
            "sql".to_string(),
            "python".to_string(),
        ];
        let summary = skills_summary(&skills, 4);

        assert_eq!(summary[0].skill, "python");
        assert_eq!(summary[0].frequency, 2);
        assert_eq!(summary[0].percentage, 50.0);
        assert_eq!(summary[1].skill, "sql");
        assert_eq!(summary[1].frequency, 1);
    }

    #[test]
    fn test_relevant_soc_codes() {
        let codes = relevant_soc_codes("data analyst");
        assert!(!codes.is_empty());
        assert!(codes.len() <= 5);
        assert!(codes.iter().any(|(code, _)| *code == "15-2051"));

        assert!(relevant_soc_codes("zookeeper").is_empty());
    }

    #[test]
    fn test_build_series_ids() {
        let ids = build_series_ids(&[("15-2051", "Data Scientists")]);
        assert_eq!(
            ids,
            vec![
                "OEUN000000000000015205101",
                "OEUN000000000000015205104",
                "OEUN000000000000015205113",
            ]
        );
        assert!(ids.iter().all(|id| id.len() == 25));
    }

    #[test]
    fn test_parse_bls_series() {
        let series = vec![
            BlsSeries {
                series_id: "OEUN000000000000015205101".to_string(),
                data: vec![BlsDataPoint {
                    value: "202900".to_string(),
                }],
            },
            BlsSeries {
                series_id: "OEUN000000000000015205104".to_string(),
                data: vec![BlsDataPoint {
                    value: "112590".to_string(),
                }],
            },
        ];
        let stats = parse_bls_series(&series, &[("15-2051", "Data Scientists")]);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].soc_code, "15-2051");
        assert_eq!(stats[0].occupation_title, "Data Scientists");
        assert_eq!(stats[0].employment, Some(202900.0));
        assert_eq!(stats[0].mean_annual_wage, Some(112590.0));
        assert_eq!(stats[0].median_hourly_wage, None);
    }

    #[test]
    fn test_serpapi_response_parsing() {
        let body = serde_json::json!({
            "jobs_results": [{
                "title": "Data Analyst",
                "company_name": "Acme",
                "location": "Phoenix, AZ",
                "description": "SQL and Python required",
                "via": "LinkedIn",
                "share_link": "https://example.com/job/1",
                "detected_extensions": {
                    "posted_at": "3 days ago",
                    "schedule_type": "Full-time",
                    "salary": "$70,000 - $90,000"
                }
            }]
        });
        let parsed: SerpApiJobsResponse =
            serde_json::from_value(body).expect("parse response");
        assert_eq!(parsed.jobs_results.len(), 1);

        let job = &parsed.jobs_results[0];
        let row = posting_row(job, &["sql".to_string(), "python".to_string()]);
        assert_eq!(row.job_title, "Data Analyst");
        assert_eq!(row.salary_min, Some(70000.0));
        assert_eq!(row.salary_max, Some(90000.0));
        assert_eq!(row.skills_extracted, "sql, python");
    }

    #[test]
    fn test_validate_requires_serpapi_key() {
        let module = JobsModule::new(&Settings::default());
        let err = module.validate(&serde_json::Value::Null).unwrap_err();
        assert!(matches!(err, ModuleError::Config(_)));
        assert!(err.to_string().contains("SERPAPI_KEY"));
    }

    #[test]
    fn test_validate_results_limit_bounds() {
        let settings = Settings::default().with_serpapi_key("key");
        let module = JobsModule::new(&settings);

        assert!(module.validate(&serde_json::Value::Null).is_ok());
        assert!(module
            .validate(&serde_json::json!({"results_limit": 3}))
            .is_err());
        assert!(module
            .validate(&serde_json::json!({"results_limit": 101}))
            .is_err());
        assert!(module
            .validate(&serde_json::json!({"results_limit": 50}))
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_short_query() {
        let settings = Settings::default().with_serpapi_key("key");
        let module = JobsModule::new(&settings);
        assert!(module.validate(&serde_json::json!({"query": "x"})).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_fields() {
        let settings = Settings::default().with_serpapi_key("key");
        let module = JobsModule::new(&settings);
        assert!(module
            .validate(&serde_json::json!({"result_limit": 20}))
            .is_err());
    }
}
