/// Compression registry
///
/// Maps persisted algorithm names to codecs. Each database owns its own
/// registry, so two databases in one process never see each other's
/// registrations.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::storage::compression::gzip::GzipCompression;
use crate::storage::compression::none::NoCompression;
use crate::storage::compression::traits::CompressionStrategy;

#[cfg(feature = "compression")]
use crate::storage::compression::{
    lz4::Lz4Compression, snappy::SnappyCompression, zstd::ZstdCompression,
};

/// Shared handle to a codec
pub type StrategyRef = Arc<dyn CompressionStrategy>;

/// Name -> codec map
#[derive(Clone, Default)]
pub struct CompressionRegistry {
    strategies: HashMap<String, StrategyRef>,
}

impl CompressionRegistry {
    /// Creates a registry with no codecs at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in codec
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_strategy(Arc::new(NoCompression::new()));
        registry.register_strategy(Arc::new(GzipCompression::new()));

        #[cfg(feature = "compression")]
        {
            registry.register_strategy(Arc::new(ZstdCompression::new()));
            registry.register_strategy(Arc::new(Lz4Compression::new()));
            registry.register_strategy(Arc::new(SnappyCompression::new()));
        }

        registry
    }

    /// Adds or replaces the codec registered under `name`
    ///
    /// Returns the codec previously registered under that name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        strategy: StrategyRef,
    ) -> Option<StrategyRef> {
        self.strategies.insert(name.into(), strategy)
    }

    /// Registers a codec under its own `name()`
    pub fn register_strategy(&mut self, strategy: StrategyRef) -> Option<StrategyRef> {
        let name = strategy.name().to_string();
        self.register(name, strategy)
    }

    pub fn get(&self, name: &str) -> Option<StrategyRef> {
        self.strategies.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl fmt::Debug for CompressionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}
