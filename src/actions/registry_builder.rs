//! Action registry builder
//!
//! Registers the actions whose backends were supplied. An action without a
//! backend is simply absent from the registry.

use std::sync::Arc;

use super::catalog::{CatalogSearch, ShoppingSearchAction};
use super::uploads::{DocumentSearch, FileOwnership, UploadsSearchAction};
use super::ActionRegistry;
use crate::config::ActionsConfig;
use crate::error::Result;

/// Builder for action registries
///
/// # Examples
///
/// ```
/// use clonar::actions::ActionRegistryBuilder;
/// use clonar::config::ActionsConfig;
///
/// let registry = ActionRegistryBuilder::new(ActionsConfig::default()).build().unwrap();
/// assert!(registry.is_empty());
/// ```
pub struct ActionRegistryBuilder {
    config: ActionsConfig,
    documents: Option<(Arc<dyn DocumentSearch>, Arc<dyn FileOwnership>)>,
    catalog: Option<Arc<dyn CatalogSearch>>,
}

impl ActionRegistryBuilder {
    /// Create a builder with no backends
    pub fn new(config: ActionsConfig) -> Self {
        Self {
            config,
            documents: None,
            catalog: None,
        }
    }

    /// Enable `uploads_search`
    ///
    /// # Arguments
    ///
    /// * `documents` - Per-user document index
    /// * `ownership` - File id to owner lookup
    ///
    /// # Returns
    ///
    /// Returns self for method chaining
    pub fn with_documents(
        mut self,
        documents: Arc<dyn DocumentSearch>,
        ownership: Arc<dyn FileOwnership>,
    ) -> Self {
        self.documents = Some((documents, ownership));
        self
    }

    /// Enable `catalog_search`
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogSearch>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Build the registry
    ///
    /// # Errors
    ///
    /// Returns error if an action is registered twice
    pub fn build(&self) -> Result<ActionRegistry> {
        let mut registry = ActionRegistry::new();
        let per_query = self.config.results_per_query;

        if let Some((documents, ownership)) = &self.documents {
            registry.register(UploadsSearchAction::new(
                documents.clone(),
                ownership.clone(),
                per_query,
            ))?;
        }

        if let Some(catalog) = &self.catalog {
            registry.register(ShoppingSearchAction::new(catalog.clone(), per_query))?;
        }

        tracing::debug!(
            actions.event = "registry_built",
            actions = ?registry.kinds(),
            "Built action registry"
        );

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalog::{CatalogHit, CatalogKind};
    use crate::actions::context::{NullSink, RequestContext};
    use crate::actions::uploads::DocumentHit;
    use crate::actions::ActionKind;
    use async_trait::async_trait;

    struct NoDocuments;

    #[async_trait]
    impl DocumentSearch for NoDocuments {
        async fn search_user_files(&self, _: &str, _: &str, _: usize) -> Result<Vec<DocumentHit>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl FileOwnership for NoDocuments {
        async fn owner_of(&self, _: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct NoCatalog;

    #[async_trait]
    impl CatalogSearch for NoCatalog {
        async fn search(&self, _: CatalogKind, _: &str, _: usize) -> Result<Vec<CatalogHit>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_build_registers_supplied_backends() {
        let registry = ActionRegistryBuilder::new(ActionsConfig::default())
            .with_documents(Arc::new(NoDocuments), Arc::new(NoDocuments))
            .with_catalog(Arc::new(NoCatalog))
            .build()
            .unwrap();

        assert_eq!(
            registry.kinds(),
            vec![ActionKind::UploadsSearch, ActionKind::CatalogSearch]
        );
    }

    #[test]
    fn test_enabled_depends_on_request() {
        let registry = ActionRegistryBuilder::new(ActionsConfig::default())
            .with_documents(Arc::new(NoDocuments), Arc::new(NoDocuments))
            .with_catalog(Arc::new(NoCatalog))
            .build()
            .unwrap();

        let ctx = RequestContext::new(Arc::new(NullSink));
        assert_eq!(registry.enabled_for(&ctx), vec![ActionKind::CatalogSearch]);

        let personal = ctx
            .with_personal_search(true)
            .with_file_ids(vec!["file-1".to_string()]);
        assert_eq!(registry.enabled_for(&personal), vec![ActionKind::UploadsSearch]);
    }

    #[test]
    fn test_catalog_only() {
        let registry = ActionRegistryBuilder::new(ActionsConfig::default())
            .with_catalog(Arc::new(NoCatalog))
            .build()
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get_by_name("uploads_search").is_none());
    }
}
