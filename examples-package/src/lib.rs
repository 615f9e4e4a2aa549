//! Shared fixtures for the catql demos.

use catql_core::Row;
use catql_streaming::{drain, CollectSink, RowStream};

/// Access-log style rows: `<status> <bytes> <method> <path>`.
pub fn access_log(count: usize) -> Vec<Row> {
    const METHODS: [&str; 3] = ["GET", "POST", "DELETE"];
    const STATUSES: [&str; 4] = ["200", "200", "404", "500"];

    (0..count)
        .map(|i| {
            Row::from_fields([
                STATUSES[i % STATUSES.len()].to_string(),
                (i * 37 % 5000).to_string(),
                METHODS[i % METHODS.len()].to_string(),
                format!("/item/{}", i),
            ])
        })
        .collect()
}

/// Collect a stream and print each row the way the CLI does.
pub async fn print_stream(stream: RowStream) -> catql_core::Result<Vec<Row>> {
    let mut sink = CollectSink::new();
    drain(stream, &mut sink).await?;
    let schema = catql_core::Schema::virtual_table();
    for row in sink.rows() {
        println!("  {}", row.to_text(&schema));
    }
    Ok(sink.into_rows())
}
