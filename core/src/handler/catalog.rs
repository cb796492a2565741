use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;

use super::LanguageHandler;

/// Builds a handler instance. The optional source string is handed through from the
/// `register` request and is the factory's to interpret (settings, a script, ...).
pub type HandlerFactory = Arc<dyn Fn(Option<&str>) -> Result<Arc<dyn LanguageHandler>, String> + Send + Sync>;

/// Handlers known to this process, resolved by id at registration time.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, id: &str, factory: F) -> &mut Self
    where
        F: Fn(Option<&str>) -> Result<Arc<dyn LanguageHandler>, String> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Arc::new(factory));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn instantiate(&self, id: &str, source: Option<&str>) -> Result<Arc<dyn LanguageHandler>, RegistryError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        factory(source).map_err(|reason| RegistryError::Load {
            id: id.to_string(),
            reason,
        })
    }
}

impl std::fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerCatalog").field("ids", &self.ids()).finish()
    }
}
