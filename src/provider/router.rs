//! Provider routing.
//!
//! Holds several interchangeable backends under their names and forwards
//! every request to the one currently selected. The router never looks at
//! which provider is active beyond the name lookup.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::{BackendError, ChunkStream, GenerationBackend, GenerationRequest};
use crate::config::ProviderConfig;
use crate::error::{DialogueError, Result};

/// A backend that delegates to one of several registered providers.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn GenerationBackend>>,
    active: RwLock<String>,
}

impl ProviderRouter {
    /// Create an empty router with no active provider.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            active: RwLock::new(String::new()),
        }
    }

    /// Build a router from config, selecting `config.active`.
    ///
    /// # Errors
    /// Returns [`DialogueError::Config`] when the configured provider is not
    /// among `providers`.
    pub fn from_config(
        config: &ProviderConfig,
        providers: impl IntoIterator<Item = Arc<dyn GenerationBackend>>,
    ) -> Result<Self> {
        let mut router = Self::new();
        for provider in providers {
            router.register(provider);
        }
        router.select(&config.active)?;
        Ok(router)
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn GenerationBackend>) {
        let name = provider.name().to_owned();
        if self.providers.insert(name.clone(), provider).is_some() {
            tracing::warn!(provider = %name, "replaced existing provider registration");
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_provider(mut self, provider: Arc<dyn GenerationBackend>) -> Self {
        self.register(provider);
        self
    }

    /// Make `name` the provider used for subsequent requests.
    ///
    /// In-flight streams keep using the provider they were opened on.
    ///
    /// # Errors
    /// Returns [`DialogueError::Config`] when `name` is not registered.
    pub fn select(&self, name: &str) -> Result<()> {
        if !self.providers.contains_key(name) {
            return Err(DialogueError::Config(format!(
                "unknown provider '{name}' (registered: {})",
                self.provider_names().join(", ")
            )));
        }
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if *active != name {
            tracing::info!(from = %active, to = %name, "switching generation provider");
            *active = name.to_owned();
        }
        Ok(())
    }

    /// Name of the selected provider (empty when none is selected).
    pub fn active_name(&self) -> String {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registered provider names, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    fn active_provider(&self) -> std::result::Result<Arc<dyn GenerationBackend>, BackendError> {
        let name = self.active_name();
        self.providers
            .get(&name)
            .cloned()
            .ok_or_else(|| BackendError::ProviderError {
                status: None,
                message: format!("no provider registered as '{name}'"),
            })
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("providers", &self.provider_names())
            .field("active", &self.active_name())
            .finish()
    }
}

#[async_trait]
impl GenerationBackend for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn open(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<ChunkStream, BackendError> {
        let provider = self.active_provider()?;
        tracing::debug!(provider = provider.name(), "routing generation request");
        provider.open(request).await
    }
}
