//! Data-collection modules and the contract they implement.
//!
//! A module is a self-contained client for one external labor-market data
//! source. The pipeline core only depends on the [`Module`] trait; concrete
//! modules live here and are wired up through the [`registry`].
//!
//! Available modules:
//! - `jobs`: job postings via SerpAPI Google Jobs + BLS wage statistics
//! - `courses`: course catalog search (Coursera)
//! - `trends`: search-interest trends via SerpAPI Google Trends
//! - `skills`: related-skills enrichment via the Lightcast Open Skills API

pub mod courses;
pub mod jobs;
pub mod registry;
pub mod skills;
pub mod trends;

pub use registry::{ModuleRegistry, RegistryError};

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::types::{ErrorDescriptor, ErrorKind};

/// Module configuration as submitted by the caller, opaque to the core.
///
/// Concrete modules deserialize this into their own config struct; `Null`
/// means "all defaults".
pub type ModuleConfig = serde_json::Value;

/// Errors a module can produce during validation or execution.
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    /// Required credentials or parameters are missing or invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A network request failed.
    #[error("Network failure: {0}")]
    Network(String),

    /// The external API rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The external API rate limit was hit.
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited {
        /// Optional retry-after hint in seconds.
        retry_after: Option<u64>,
    },

    /// The source returned no usable data.
    #[error("No usable results: {0}")]
    EmptyResult(String),

    /// The module observed its cancellation token and stopped.
    #[error("Cancelled before completion")]
    Cancelled,
}

impl ModuleError {
    /// Classification of this error for the final report.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModuleError::Config(_) => ErrorKind::Config,
            ModuleError::Cancelled => ErrorKind::Cancelled,
            ModuleError::Network(_)
            | ModuleError::Auth(_)
            | ModuleError::RateLimited { .. }
            | ModuleError::EmptyResult(_) => ErrorKind::Execution,
        }
    }

    /// Converts this error into a report descriptor.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor::new(self.kind(), self.to_string())
    }
}

/// Result type alias for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// One named table of collected rows.
///
/// Rows are opaque JSON objects; the core never interprets them, it only
/// carries them into the aggregated report (the output collaborator decides
/// how to render each table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name, unique within one module's output.
    pub name: String,
    /// Collected rows.
    pub rows: Vec<serde_json::Value>,
}

impl Table {
    /// Creates a table from serializable rows.
    ///
    /// Rows that fail to serialize are dropped; module row types derive
    /// `Serialize` so this does not happen in practice.
    pub fn new<T: Serialize>(name: impl Into<String>, rows: &[T]) -> Self {
        Self {
            name: name.into(),
            rows: rows
                .iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
        }
    }
}

/// Successful payload of one module execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleOutput {
    /// Collected tables, in module-defined order.
    pub tables: Vec<Table>,
}

impl ModuleOutput {
    /// Creates an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a table.
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Total row count across all tables.
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}

/// Contract implemented by every data-collection module.
///
/// Implementations must honor the cancellation token by checking it at
/// natural suspension points (between requests) and returning
/// [`ModuleError::Cancelled`] promptly, and must release any scoped
/// resource on every exit path.
#[async_trait]
pub trait Module: Send + Sync {
    /// Unique identifier (e.g. "jobs").
    fn name(&self) -> &'static str;

    /// Human-readable name (e.g. "Job Postings & Labor Data").
    fn display_name(&self) -> &'static str;

    /// One-line description of what the module collects.
    fn description(&self) -> &'static str;

    /// Default execution timeout when the run request carries no override.
    fn default_timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    /// Checks required credentials and parameters without network I/O.
    fn validate(&self, config: &ModuleConfig) -> ModuleResult<()>;

    /// Collects data for the topic.
    async fn execute(
        &self,
        topic: &str,
        config: &ModuleConfig,
        cancel: CancelToken,
    ) -> ModuleResult<ModuleOutput>;
}

impl std::fmt::Debug for dyn Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module").field("name", &self.name()).finish()
    }
}

/// Truncates a string to at most `max_bytes`, backing off to the nearest
/// character boundary so multibyte text never panics.
pub(crate) fn truncate_utf8(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Deserializes an opaque module config into a typed config struct.
///
/// `Null` (no config submitted) yields the default.
pub fn parse_config<T>(config: &ModuleConfig) -> ModuleResult<T>
where
    T: DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| ModuleError::Config(e.to_string()))
}
