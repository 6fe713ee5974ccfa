//! Skills enrichment module backed by the Lightcast Open Skills API.
//!
//! Normalizes raw skill strings to canonical Lightcast skills, then finds
//! skills that commonly appear together with them. Authentication is OAuth
//! client-credentials; the access token is cached and refreshed shortly
//! before expiry.
//!
//! Free tier limits: 50 lookups/month, 5 requests/second.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::modules::{
    parse_config, Module, ModuleConfig, ModuleError, ModuleOutput, ModuleResult, Table,
};
use crate::pipeline::cancel::CancelToken;

/// Lightcast OAuth token endpoint.
const AUTH_ENDPOINT: &str = "https://auth.emsicloud.com/connect/token";

/// Lightcast skills search endpoint.
const SKILLS_ENDPOINT: &str = "https://emsiservices.com/skills/versions/latest/skills";

/// Lightcast related-skills endpoint.
const RELATED_ENDPOINT: &str = "https://emsiservices.com/skills/versions/latest/related";

/// Configuration accepted by the skills module.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillsConfig {
    /// Skills to analyze. The run topic is used when absent.
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    /// Number of related skills to return (5-20).
    #[serde(default = "default_max_related")]
    pub max_related: usize,
}

fn default_max_related() -> usize {
    10
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            skills: None,
            max_related: default_max_related(),
        }
    }
}

/// One normalized input skill row.
#[derive(Debug, Clone, Serialize)]
pub struct InputSkill {
    pub skill_name: String,
    pub lightcast_id: String,
    pub skill_type: String,
    pub category: String,
}

/// One related skill row.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedSkill {
    pub skill_name: String,
    pub skill_type: String,
    pub category: String,
    pub description: String,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Finds skills related to the input skills.
pub struct SkillsModule {
    http_client: Client,
    client_id: String,
    client_secret: String,
    /// Cached OAuth token, refreshed one minute before expiry.
    token: Mutex<Option<CachedToken>>,
}

impl SkillsModule {
    /// Creates the module, capturing the Lightcast credentials.
    pub fn new(settings: &Settings) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            client_id: settings.lightcast_client_id.clone(),
            client_secret: settings.lightcast_client_secret.clone(),
            token: Mutex::new(None),
        }
    }

    /// Returns a valid access token, requesting a new one when the cached
    /// token is missing or close to expiry.
    async fn access_token(&self) -> ModuleResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + Duration::from_secs(60) < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        info!("Obtaining Lightcast access token");
        let response = self
            .http_client
            .post(AUTH_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", "emsi_open"),
            ])
            .send()
            .await
            .map_err(|e| ModuleError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 || status.as_u16() == 400 {
            return Err(ModuleError::Auth(format!(
                "Lightcast rejected the credentials with status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ModuleError::Network(format!(
                "Lightcast auth returned status {}",
                status
            )));
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| ModuleError::Network(format!("Failed to parse auth response: {}", e)))?;

        let token = body.access_token.clone();
        *cached = Some(CachedToken {
            token: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        });
        Ok(token)
    }

    /// Looks up the closest canonical skill for a raw skill string.
    async fn normalize_skill(&self, skill: &str) -> ModuleResult<Option<LightcastSkill>> {
        let token = self.access_token().await?;
        debug!(skill, "Normalizing skill");

        let response = self
            .http_client
            .get(SKILLS_ENDPOINT)
            .query(&[("q", skill), ("limit", "1")])
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ModuleError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ModuleError::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            return Err(ModuleError::Network(format!(
                "Lightcast skills search returned status {}",
                status
            )));
        }

        let body: SkillsResponse = response
            .json()
            .await
            .map_err(|e| ModuleError::Network(format!("Failed to parse skills response: {}", e)))?;

        Ok(body.data.into_iter().next())
    }

    /// Fetches skills commonly found together with the given skill ids.
    async fn related_skills(
        &self,
        skill_ids: &[String],
        limit: usize,
    ) -> ModuleResult<Vec<LightcastSkill>> {
        let token = self.access_token().await?;
        info!(ids = skill_ids.len(), limit, "Fetching related skills");

        let response = self
            .http_client
            .post(RELATED_ENDPOINT)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "ids": skill_ids, "limit": limit }))
            .send()
            .await
            .map_err(|e| ModuleError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ModuleError::RateLimited { retry_after: None });
        }
        if !status.is_success() {
            return Err(ModuleError::Network(format!(
                "Lightcast related skills returned status {}",
                status
            )));
        }

        let body: SkillsResponse = response
            .json()
            .await
            .map_err(|e| ModuleError::Network(format!("Failed to parse related response: {}", e)))?;

        Ok(body.data)
    }
}

#[async_trait]
impl Module for SkillsModule {
    fn name(&self) -> &'static str {
        "skills"
    }

    fn display_name(&self) -> &'static str {
        "Skills Enrichment"
    }

    fn description(&self) -> &'static str {
        "Find related skills that commonly appear together, via the Lightcast Open Skills API"
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    fn validate(&self, config: &ModuleConfig) -> ModuleResult<()> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(ModuleError::Config(
                "LIGHTCAST_CLIENT_ID / LIGHTCAST_CLIENT_SECRET are not configured".to_string(),
            ));
        }

        let config: SkillsConfig = parse_config(config)?;
        if !(5..=20).contains(&config.max_related) {
            return Err(ModuleError::Config(format!(
                "max_related must be between 5 and 20, got {}",
                config.max_related
            )));
        }
        if let Some(skills) = &config.skills {
            if skills.iter().all(|s| s.trim().is_empty()) {
                return Err(ModuleError::Config(
                    "at least one non-empty skill is required".to_string(),
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
        let config: SkillsConfig = parse_config(config)?;
        let skills: Vec<String> = config
            .skills
            .unwrap_or_else(|| vec![topic.to_string()])
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let mut input_rows = Vec::new();
        let mut skill_ids = Vec::new();
        for skill in &skills {
            if cancel.is_cancelled() {
                return Err(ModuleError::Cancelled);
            }

            match self.normalize_skill(skill).await? {
                Some(normalized) => {
                    skill_ids.push(normalized.id.clone());
                    input_rows.push(input_row(&normalized));
                }
                None => warn!(skill, "No Lightcast match for skill"),
            }
        }

        if skill_ids.is_empty() {
            return Err(ModuleError::EmptyResult(format!(
                "no Lightcast skills matched {:?}",
                skills
            )));
        }

        if cancel.is_cancelled() {
            return Err(ModuleError::Cancelled);
        }

        let related = self.related_skills(&skill_ids, config.max_related).await?;
        let related_rows: Vec<RelatedSkill> = related.iter().map(related_row).collect();

        Ok(ModuleOutput::new()
            .with_table(Table::new("input_skills", &input_rows))
            .with_table(Table::new("related_skills", &related_rows)))
    }
}

fn input_row(skill: &LightcastSkill) -> InputSkill {
    InputSkill {
        skill_name: skill.name.clone(),
        lightcast_id: skill.id.clone(),
        skill_type: skill.type_info.as_ref().map(|t| t.name.clone()).unwrap_or_default(),
        category: skill
            .category
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_default(),
    }
}

fn related_row(skill: &LightcastSkill) -> RelatedSkill {
    let mut description = skill.description.clone().unwrap_or_default();
    crate::modules::truncate_utf8(&mut description, 200);

    RelatedSkill {
        skill_name: skill.name.clone(),
        skill_type: skill.type_info.as_ref().map(|t| t.name.clone()).unwrap_or_default(),
        category: skill
            .category
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_default(),
        description,
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct SkillsResponse {
    #[serde(default)]
    data: Vec<LightcastSkill>,
}

#[derive(Debug, Deserialize)]
struct LightcastSkill {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    type_info: Option<NamedEntity>,
    category: Option<NamedEntity>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedEntity {
    #[serde(default)]
    name: String,
}
