//! Nested Subquery Example
//!
//! Each subquery runs as its own executor task, chained by bounded streams.

use anyhow::Result;
use catql_examples::{access_log, print_stream};
use catql_streaming::{DataSourceRegistry, ExecutionState, MemoryDataSource, StreamExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Nested Subquery Example ===\n");

    let registry = DataSourceRegistry::new();
    registry.register("access", MemoryDataSource::new(access_log(500)));

    let sql = "select * from (select * from access where c1 = 404) as missing \
               where c2 between 1000 and 3000 and c4 like '/item/1%' limit 10";
    println!("{}\n", sql);

    let executor = StreamExecutor::new(sql, registry.clone());
    let handle = executor.handle();
    let rows = print_stream(executor.run()).await?;
    println!("\n{} rows, state {:?}", rows.len(), handle.wait().await);

    // The datasource was redeemed by the first statement
    let again = StreamExecutor::new("select * from access", registry);
    let handle = again.handle();
    print_stream(again.run()).await?;
    if handle.wait().await == ExecutionState::Failed {
        println!("second run failed as expected: {:?}", handle.errors());
    }

    Ok(())
}
