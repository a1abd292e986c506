use crate::backends::claude::ClaudeAdapter;
use crate::backends::openai::OpenAiAdapter;
use crate::backends::ProviderAdapter;
use crate::config::{ProviderConfig, ProviderKind};
use coda_core::{CodaError, CodaResult};
use tracing::{info, warn};

/// The configured provider adapters and which one is active.
///
/// Switching the active adapter never touches conversation state; the
/// orchestrator keeps the history and hands all of it to whichever adapter
/// is active at request time.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: Vec<Box<dyn ProviderAdapter>>,
    active: Option<usize>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one adapter per config entry, in order.
    pub fn from_configs(configs: &[ProviderConfig]) -> Self {
        let mut registry = Self::new();
        for config in configs {
            let adapter: Box<dyn ProviderAdapter> = match config.kind {
                ProviderKind::OpenAi | ProviderKind::OpenRouter | ProviderKind::Groq => {
                    Box::new(OpenAiAdapter::new(config.clone()))
                }
                ProviderKind::Claude => Box::new(ClaudeAdapter::new(config.clone())),
            };
            registry.register(adapter);
        }
        registry
    }

    /// Adds an adapter. The first one registered becomes active.
    pub fn register(&mut self, adapter: Box<dyn ProviderAdapter>) {
        info!(provider = %adapter.id(), models = ?adapter.list_models(), "Registered provider");
        if let Some(existing) = self.adapters.iter().position(|a| a.id() == adapter.id()) {
            warn!(provider = %adapter.id(), "Replaced previously registered provider");
            self.adapters[existing] = adapter;
            return;
        }
        self.adapters.push(adapter);
        if self.active.is_none() {
            self.active = Some(self.adapters.len() - 1);
        }
    }

    /// Initializes every adapter. Adapters that fail (usually a missing API
    /// key) are dropped with a warning; it is an error only when none is
    /// left. The active adapter is kept if it survived, otherwise the first
    /// remaining one becomes active.
    pub async fn initialize_all(&mut self) -> CodaResult<()> {
        let active_id = self.active_id().map(str::to_string);
        let mut ready = Vec::with_capacity(self.adapters.len());
        let mut failures = Vec::new();

        for mut adapter in std::mem::take(&mut self.adapters) {
            match adapter.initialize().await {
                Ok(()) => ready.push(adapter),
                Err(e) => {
                    warn!(provider = %adapter.id(), error = %e, "Provider unavailable, skipping");
                    failures.push(format!("{}: {e}", adapter.id()));
                }
            }
        }

        self.adapters = ready;
        self.active = active_id
            .and_then(|id| self.adapters.iter().position(|a| a.id() == id))
            .or_else(|| (!self.adapters.is_empty()).then_some(0));

        if self.adapters.is_empty() && !failures.is_empty() {
            return Err(CodaError::Config(format!(
                "No provider could be initialized ({})",
                failures.join("; ")
            )));
        }
        Ok(())
    }

    fn position_for(&self, model: &str) -> Option<usize> {
        // The active adapter wins when several claim the same model.
        if let Some(i) = self.active {
            if self.adapters[i].claims_model(model) {
                return Some(i);
            }
        }
        self.adapters.iter().position(|a| a.claims_model(model))
    }

    /// The adapter serving `model`.
    pub fn resolve(&self, model: &str) -> CodaResult<&dyn ProviderAdapter> {
        self.position_for(model)
            .map(|i| self.adapters[i].as_ref())
            .ok_or_else(|| CodaError::ModelNotRecognized(model.to_string()))
    }

    /// Makes the adapter serving `model` active with `model` selected.
    pub fn activate_model(&mut self, model: &str) -> CodaResult<()> {
        let index = self
            .position_for(model)
            .ok_or_else(|| CodaError::ModelNotRecognized(model.to_string()))?;
        self.adapters[index].select_model(model)?;
        self.active = Some(index);
        info!(provider = %self.adapters[index].id(), model = %model, "Activated model");
        Ok(())
    }

    /// The adapter requests go to.
    pub fn active(&self) -> CodaResult<&dyn ProviderAdapter> {
        self.active
            .map(|i| self.adapters[i].as_ref())
            .ok_or_else(|| CodaError::Config("No provider registered".into()))
    }

    /// Id of the active adapter, if any.
    pub fn active_id(&self) -> Option<&str> {
        self.active.map(|i| self.adapters[i].id())
    }

    /// Every `(provider id, model)` pair on offer.
    pub fn list_models(&self) -> Vec<(String, String)> {
        self.adapters
            .iter()
            .flat_map(|a| {
                let id = a.id().to_string();
                a.list_models().into_iter().map(move |m| (id.clone(), m))
            })
            .collect()
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn configs() -> Vec<ProviderConfig> {
        let mut groq = ProviderConfig::new("groq", ProviderKind::Groq);
        groq.models = vec!["llama-3.3-70b-versatile".into(), "shared-model".into()];
        let mut claude = ProviderConfig::new("claude", ProviderKind::Claude);
        claude.models = vec!["claude-sonnet-4-20250514".into(), "shared-model".into()];
        vec![groq, claude]
    }

    #[test]
    fn test_first_registered_is_active() {
        let registry = ProviderRegistry::from_configs(&configs());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_id(), Some("groq"));
        assert_eq!(registry.active().unwrap().current_model(), "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_resolve_and_activate() {
        let mut registry = ProviderRegistry::from_configs(&configs());
        assert_eq!(registry.resolve("claude-sonnet-4-20250514").unwrap().id(), "claude");

        registry.activate_model("claude-sonnet-4-20250514").unwrap();
        assert_eq!(registry.active_id(), Some("claude"));

        // Shared model stays on the active adapter.
        registry.activate_model("shared-model").unwrap();
        assert_eq!(registry.active_id(), Some("claude"));
        assert_eq!(registry.active().unwrap().current_model(), "shared-model");
    }

    #[test]
    fn test_unknown_model() {
        let mut registry = ProviderRegistry::from_configs(&configs());
        assert!(matches!(
            registry.resolve("gpt-99"),
            Err(CodaError::ModelNotRecognized(m)) if m == "gpt-99"
        ));
        assert!(registry.activate_model("gpt-99").is_err());
        assert_eq!(registry.active_id(), Some("groq"));
    }

    #[test]
    fn test_empty_registry_has_no_active() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(registry.active(), Err(CodaError::Config(_))));
    }

    #[test]
    fn test_list_models() {
        let registry = ProviderRegistry::from_configs(&configs());
        let models = registry.list_models();
        assert_eq!(models.len(), 4);
        assert_eq!(models[0], ("groq".to_string(), "llama-3.3-70b-versatile".to_string()));
    }

    fn keyed(id: &str, key: Option<&str>) -> ProviderConfig {
        let mut cfg = ProviderConfig::new(id, ProviderKind::OpenAi);
        cfg.api_key = key.map(str::to_string);
        cfg.api_key_env = Some("CODA_TEST_REGISTRY_UNSET_KEY".into());
        cfg
    }

    #[tokio::test]
    async fn test_initialize_all_skips_unavailable_providers() {
        let mut registry = ProviderRegistry::from_configs(&[
            keyed("first", None),
            keyed("second", Some("sk-second")),
            keyed("third", None),
        ]);
        assert_eq!(registry.active_id(), Some("first"));

        registry.initialize_all().await.unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active_id(), Some("second"));
    }

    #[tokio::test]
    async fn test_initialize_all_fails_when_nothing_is_usable() {
        let mut registry =
            ProviderRegistry::from_configs(&[keyed("first", None), keyed("second", None)]);
        let err = registry.initialize_all().await.unwrap_err();
        assert!(matches!(err, CodaError::Config(ref m) if m.contains("first") && m.contains("second")));
        assert!(registry.active_id().is_none());
    }
}
