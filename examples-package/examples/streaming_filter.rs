//! Streaming Filter Example
//!
//! Filters an in-memory access log, then a producer task feeding rows
//! through a channel.

use anyhow::Result;
use catql_core::Row;
use catql_examples::{access_log, print_stream};
use catql_streaming::{ChannelDataSource, DataSourceRegistry, MemoryDataSource, StreamExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Streaming Filter Example ===\n");

    memory_source().await?;
    channel_source().await?;

    println!("\n=== All streaming examples completed! ===");
    Ok(())
}

/// Example 1: predicate, LIMIT and OFFSET over fixed rows
async fn memory_source() -> Result<()> {
    println!("--- Example 1: Memory Source ---\n");

    let registry = DataSourceRegistry::new();
    registry.register("access", MemoryDataSource::new(access_log(200)));

    let sql = "select * from access where c1 >= 500 and c3 = 'POST' limit 5 offset 1";
    println!("{}", sql);
    let executor = StreamExecutor::new(sql, registry);
    let handle = executor.handle();

    let rows = print_stream(executor.run()).await?;
    println!("\n{} rows, {:?}\n", rows.len(), handle.stats());
    Ok(())
}

/// Example 2: rows pushed by another task
async fn channel_source() -> Result<()> {
    println!("--- Example 2: Channel Source ---\n");

    let registry = DataSourceRegistry::new();
    let (tx, source) = ChannelDataSource::new(16);
    registry.register("numbers", source);

    let producer = tokio::spawn(async move {
        for i in 0..1000 {
            let row = Row::from_fields([i.to_string(), (i * i).to_string()]);
            if tx.send(row).await.is_err() {
                // the query hit its limit and went away
                return i;
            }
        }
        1000
    });

    let sql = "select * from numbers where c2 % 7 = 1 limit 4";
    println!("{}", sql);
    let executor = StreamExecutor::new(sql, registry);
    print_stream(executor.run()).await?;

    let produced = producer.await?;
    println!("\nproducer stopped after {} rows", produced);
    Ok(())
}
