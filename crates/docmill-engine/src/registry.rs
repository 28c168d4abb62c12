//! Extractor registry for dispatching document kinds to extractors.

use std::collections::HashMap;
use std::sync::Arc;

use docmill_core::{
    DocumentKind, Error, ExtractOptions, Extractor, ExtractorFamily, RawDocument, Result,
};

/// Registry mapping extractor families to their implementations.
///
/// Dispatch is by [`DocumentKind::family`] only — no content sniffing
/// beyond classification.
pub struct ExtractorRegistry {
    extractors: HashMap<ExtractorFamily, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register an extractor. Replaces any existing extractor for the same
    /// family.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(extractor.family(), extractor);
    }

    /// Look up the extractor responsible for a document kind.
    pub fn extractor_for(&self, kind: DocumentKind) -> Result<Arc<dyn Extractor>> {
        let family = kind.family();
        self.extractors.get(&family).cloned().ok_or_else(|| {
            Error::ExtractorUnavailable(format!(
                "no extractor registered for family '{}' (kind '{}')",
                family, kind
            ))
        })
    }

    /// Extract a raw document using the extractor registered for the kind's
    /// family.
    pub async fn extract(
        &self,
        kind: DocumentKind,
        data: &[u8],
        filename: &str,
        options: &ExtractOptions,
    ) -> Result<RawDocument> {
        let extractor = self.extractor_for(kind)?;
        extractor.extract(kind, data, filename, options).await
    }

    /// List all families that have registered extractors.
    pub fn available_families(&self) -> Vec<ExtractorFamily> {
        self.extractors.keys().copied().collect()
    }

    /// Check if an extractor is registered for the given family.
    pub fn has_extractor(&self, family: ExtractorFamily) -> bool {
        self.extractors.contains_key(&family)
    }

    /// Run health checks on all registered extractors.
    pub async fn health_check_all(&self) -> HashMap<ExtractorFamily, bool> {
        let mut results = HashMap::new();
        for (family, extractor) in &self.extractors {
            let healthy = extractor.health_check().await.unwrap_or(false);
            results.insert(*family, healthy);
        }
        results
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
