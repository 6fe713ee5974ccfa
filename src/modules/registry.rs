//! Module registry: static mapping from module identifier to instance.
//!
//! Modules are registered at construction time (no runtime discovery).
//! The registry also answers availability queries (whether the credentials
//! a module needs are present in the settings) without touching the module
//! itself, so UIs can pre-filter selectable modules.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::Settings;
use crate::modules::courses::CoursesModule;
use crate::modules::jobs::JobsModule;
use crate::modules::skills::SkillsModule;
use crate::modules::trends::TrendsModule;
use crate::modules::Module;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No module is registered under the identifier.
    #[error("Module '{0}' not found in registry")]
    NotFound(String),

    /// A module with the identifier is already registered.
    #[error("Module '{0}' already registered")]
    Duplicate(String),
}

/// Availability predicate evaluated against the settings.
type AvailabilityCheck = Box<dyn Fn(&Settings) -> bool + Send + Sync>;

struct RegistryEntry {
    module: Arc<dyn Module>,
    available: AvailabilityCheck,
    unavailable_message: String,
}

/// Descriptive summary of one registered module, for listing in UIs.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    /// Module identifier.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// What the module collects.
    pub description: String,
    /// Whether required credentials are present.
    pub available: bool,
    /// Why the module is unavailable, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_message: Option<String>,
}

/// Registry of data-collection modules.
pub struct ModuleRegistry {
    settings: Settings,
    entries: HashMap<String, RegistryEntry>,
    /// Identifiers in registration order, for stable listings.
    order: Vec<String>,
}

impl ModuleRegistry {
    /// Creates an empty registry bound to the given settings.
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Creates a registry with the built-in data modules registered.
    pub fn builtin(settings: &Settings) -> Self {
        let mut registry = Self::new(settings);

        registry
            .register_with_availability(
                Arc::new(JobsModule::new(settings)),
                Box::new(|s| !s.serpapi_key.is_empty()),
                "SERPAPI_KEY is not configured",
            )
            .expect("builtin module ids are unique");

        registry
            .register(Arc::new(CoursesModule::new()))
            .expect("builtin module ids are unique");

        registry
            .register_with_availability(
                Arc::new(TrendsModule::new(settings)),
                Box::new(|s| !s.serpapi_key.is_empty()),
                "SERPAPI_KEY is not configured",
            )
            .expect("builtin module ids are unique");

        registry
            .register_with_availability(
                Arc::new(SkillsModule::new(settings)),
                Box::new(|s| {
                    !s.lightcast_client_id.is_empty() && !s.lightcast_client_secret.is_empty()
                }),
                "LIGHTCAST_CLIENT_ID / LIGHTCAST_CLIENT_SECRET are not configured",
            )
            .expect("builtin module ids are unique");

        registry
    }

    /// Registers a module that is always available.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Duplicate` if the identifier is taken.
    pub fn register(&mut self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        self.register_with_availability(module, Box::new(|_| true), "")
    }

    /// Registers a module with an availability predicate.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Duplicate` if the identifier is taken.
    pub fn register_with_availability(
        &mut self,
        module: Arc<dyn Module>,
        available: AvailabilityCheck,
        unavailable_message: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let id = module.name().to_string();
        if self.entries.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }

        self.order.push(id.clone());
        self.entries.insert(
            id,
            RegistryEntry {
                module,
                available,
                unavailable_message: unavailable_message.into(),
            },
        );
        Ok(())
    }

    /// Looks up a module instance by identifier.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for unknown identifiers.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Module>, RegistryError> {
        self.entries
            .get(id)
            .map(|entry| Arc::clone(&entry.module))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Returns whether an identifier is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Reports whether the module's required credentials are present,
    /// without touching the module.
    pub fn available(&self, id: &str) -> bool {
        self.entries
            .get(id)
            .map(|entry| (entry.available)(&self.settings))
            .unwrap_or(false)
    }

    /// Registered identifiers in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Describes every registered module, in registration order.
    pub fn describe(&self) -> Vec<ModuleInfo> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| {
                let available = (entry.available)(&self.settings);
                ModuleInfo {
                    id: entry.module.name().to_string(),
                    display_name: entry.module.display_name().to_string(),
                    description: entry.module.description().to_string(),
                    available,
                    availability_message: if available {
                        None
                    } else {
                        Some(entry.unavailable_message.clone())
                    },
                }
            })
            .collect()
    }
}
