//! Lookup table from source kind to a constructor of empty sources.

use crate::hd::HdKeySource;
use crate::simple::SimpleKeySource;
use crate::source::{KeySource, SourceKind};
use crate::{Error, Result};
use std::sync::Arc;

/// Builds an empty source, to be filled by `deserialize`
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn KeySource> + Send + Sync>;

/// Registered key source variants
#[derive(Clone, Default)]
pub struct SourceRegistry {
    factories: Vec<(SourceKind, SourceFactory)>,
}

impl SourceRegistry {
    /// Registry with no variants
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Simple and HD-Tree variants
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SourceKind::Simple, Arc::new(|| Box::new(SimpleKeySource::new())));
        registry.register(SourceKind::HdTree, Arc::new(|| Box::new(HdKeySource::new())));
        registry
    }

    /// Register (or replace) the factory for `kind`
    pub fn register(&mut self, kind: SourceKind, factory: SourceFactory) {
        match self.factories.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((kind, factory)),
        }
    }

    /// Kinds in registration order
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.factories.iter().map(|(kind, _)| *kind).collect()
    }

    /// Whether `kind` can be instantiated
    pub fn contains(&self, kind: SourceKind) -> bool {
        self.factories.iter().any(|(k, _)| *k == kind)
    }

    /// Instantiate an empty source for a vault tag
    pub fn create(&self, tag: &str) -> Result<Box<dyn KeySource>> {
        let kind: SourceKind = tag.parse()?;
        self.factories
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, factory)| factory())
            .ok_or_else(|| Error::UnknownSourceKind(format!("{tag} is not registered")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let registry = SourceRegistry::with_defaults();
        assert_eq!(registry.kinds(), vec![SourceKind::Simple, SourceKind::HdTree]);
        assert_eq!(
            registry.create("HD Key Tree").unwrap().kind(),
            SourceKind::HdTree
        );
    }

    #[test]
    fn test_unknown_and_unregistered() {
        let registry = SourceRegistry::with_defaults();
        assert!(matches!(
            registry.create("Paper Wallet"),
            Err(Error::UnknownSourceKind(_))
        ));
        assert!(matches!(
            registry.create("Ledger Hardware"),
            Err(Error::UnknownSourceKind(_))
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = SourceRegistry::with_defaults();
        registry.register(SourceKind::Simple, Arc::new(|| Box::new(SimpleKeySource::new())));
        assert_eq!(registry.kinds().len(), 2);
        assert!(!registry.contains(SourceKind::Hardware));
    }
}
