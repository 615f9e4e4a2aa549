use crate::config::StreamConfig;
use crate::registry::DataSourceRegistry;
use crate::source::DataSource;
use crate::stream::{CompiledStatement, ErrorLog, StreamExecutor};
use catql_core::{QueryError, Result};
use catql_parser::TableReference;
use tracing::debug;

/// Resolves a `FROM` target to the datasource that feeds an executor.
///
/// Named tables are redeemed from the registry. Subqueries become nested
/// executors that share the caller's error log, so a failure at any depth
/// fails the outermost statement. Everything else is rejected.
pub struct SourceResolver<'a> {
    registry: &'a DataSourceRegistry,
    config: &'a StreamConfig,
    errors: &'a ErrorLog,
}

impl<'a> SourceResolver<'a> {
    pub fn new(
        registry: &'a DataSourceRegistry,
        config: &'a StreamConfig,
        errors: &'a ErrorLog,
    ) -> Self {
        Self {
            registry,
            config,
            errors,
        }
    }

    pub fn resolve(&self, from: &TableReference) -> Result<Box<dyn DataSource>> {
        match from {
            TableReference::Table { name, .. } => {
                debug!(table = %name, "resolving named datasource");
                self.registry.get(name)
            }
            TableReference::Subquery { query, alias } => {
                let plan = CompiledStatement::prepare((**query).clone())?;
                let name = alias.clone().unwrap_or_else(|| "subquery".to_string());
                debug!(subquery = %name, "resolving nested select");
                let executor = StreamExecutor::nested(
                    name,
                    plan,
                    self.registry.clone(),
                    self.config.clone(),
                    self.errors.clone(),
                );
                Ok(Box::new(executor))
            }
            TableReference::Join { join_type, .. } => Err(QueryError::Unsupported(format!(
                "{:?} join in FROM; only a single table or subquery is supported",
                join_type
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryDataSource;
    use catql_core::Row;
    use catql_parser::{parse, SelectStatement, Statement};
    use tokio_util::sync::CancellationToken;

    fn from_clause(sql: &str) -> TableReference {
        let Statement::Select(SelectStatement { from, .. }) = parse(sql).unwrap();
        from.unwrap()
    }

    #[tokio::test]
    async fn test_resolves_registered_table_once() {
        let registry = DataSourceRegistry::new();
        registry.register("t", MemoryDataSource::new(vec![Row::from_fields(["1"])]));
        let config = StreamConfig::default();
        let errors = ErrorLog::default();
        let resolver = SourceResolver::new(&registry, &config, &errors);
        let from = from_clause("select * from t");

        let source = resolver.resolve(&from).unwrap();
        let rows = source.read(CancellationToken::new()).collect_rows().await;
        assert_eq!(rows.len(), 1);

        assert!(matches!(
            resolver.resolve(&from),
            Err(QueryError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolves_subquery_to_executor() {
        let registry = DataSourceRegistry::new();
        registry.register("t", MemoryDataSource::from_text("1\n5\n9"));
        let config = StreamConfig::default();
        let errors = ErrorLog::default();
        let resolver = SourceResolver::new(&registry, &config, &errors);

        let source = resolver
            .resolve(&from_clause("select * from (select * from t where c1 > 2) s"))
            .unwrap();
        assert_eq!(source.name(), "s");
        let rows = source.read(CancellationToken::new()).collect_rows().await;
        assert_eq!(rows, vec![Row::from_fields(["5"]), Row::from_fields(["9"])]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_rejects_joins() {
        let registry = DataSourceRegistry::new();
        let config = StreamConfig::default();
        let errors = ErrorLog::default();
        let resolver = SourceResolver::new(&registry, &config, &errors);

        for sql in ["select * from a join b on a.c1 = b.c1", "select * from a, b"] {
            assert!(matches!(
                resolver.resolve(&from_clause(sql)),
                Err(QueryError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn test_invalid_subquery_fails_resolution() {
        let registry = DataSourceRegistry::new();
        let config = StreamConfig::default();
        let errors = ErrorLog::default();
        let resolver = SourceResolver::new(&registry, &config, &errors);

        assert!(matches!(
            resolver.resolve(&from_clause("select * from (select * from t where nope = 1) s")),
            Err(QueryError::ColumnNotFound(_))
        ));
    }
}
