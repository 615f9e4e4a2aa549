//! Name → datasource directory with redeem-once semantics.
//!
//! A datasource is a single, non-replayable sequence, so looking a name up
//! removes it: of any number of concurrent lookups for one name, at most one
//! receives the source.

use crate::source::DataSource;
use catql_core::{QueryError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Cheap to clone; clones share the same directory.
#[derive(Clone, Default)]
pub struct DataSourceRegistry {
    sources: Arc<Mutex<HashMap<String, Box<dyn DataSource>>>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a datasource, replacing any previous one under the same name.
    pub fn register(&self, name: impl Into<String>, source: impl DataSource + 'static) {
        self.register_boxed(name, Box::new(source));
    }

    pub fn register_boxed(&self, name: impl Into<String>, source: Box<dyn DataSource>) {
        let name = name.into();
        let replaced = self.sources.lock().insert(name.clone(), source).is_some();
        debug!(name = %name, replaced, "registered datasource");
    }

    /// Take the datasource registered under `name`, removing it.
    pub fn get(&self, name: &str) -> Result<Box<dyn DataSource>> {
        let source = self.sources.lock().remove(name);
        match source {
            Some(source) => {
                debug!(name, "redeemed datasource");
                Ok(source)
            }
            None => Err(QueryError::TableNotFound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.lock().contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.sources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.lock().is_empty()
    }
}

impl fmt::Debug for DataSourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryDataSource;
    use catql_core::Row;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_get_removes_entry() {
        let registry = DataSourceRegistry::new();
        registry.register("t", MemoryDataSource::new(vec![]));
        assert!(registry.contains("t"));

        assert!(registry.get("t").is_ok());
        assert!(!registry.contains("t"));
        assert!(matches!(
            registry.get("t"),
            Err(QueryError::TableNotFound(name)) if name == "t"
        ));
    }

    #[test]
    fn test_unknown_name() {
        let registry = DataSourceRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(QueryError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_overwrites() {
        let registry = DataSourceRegistry::new();
        registry.register("t", MemoryDataSource::new(vec![Row::from_fields(["old"])]));
        registry.register("t", MemoryDataSource::new(vec![Row::from_fields(["new"])]));
        assert_eq!(registry.len(), 1);

        let rows = registry
            .get("t")
            .unwrap()
            .read(CancellationToken::new())
            .collect_rows()
            .await;
        assert_eq!(rows, vec![Row::from_fields(["new"])]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_redeem_yields_one_winner() {
        for _ in 0..50 {
            let registry = DataSourceRegistry::new();
            registry.register("shared", MemoryDataSource::new(vec![]));

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let registry = registry.clone();
                    std::thread::spawn(move || registry.get("shared").is_ok())
                })
                .collect();

            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }

    #[test]
    fn test_names_sorted() {
        let registry = DataSourceRegistry::new();
        registry.register("b", MemoryDataSource::new(vec![]));
        registry.register("a", MemoryDataSource::new(vec![]));
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            format!("{:?}", registry),
            "DataSourceRegistry { sources: [\"a\", \"b\"] }"
        );
    }
}
