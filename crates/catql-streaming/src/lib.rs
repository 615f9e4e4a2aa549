//! Streaming SQL SELECT execution over line-oriented input
//!
//! Rows arrive from a [`DataSource`], flow through bounded channels and are
//! filtered by a [`StreamExecutor`] that is itself a datasource, so
//! `SELECT ... FROM (SELECT ...)` becomes a chain of concurrent tasks.
//!
//! # Example
//!
//! ```ignore
//! use catql_streaming::{DataSourceRegistry, LineDataSource, StreamExecutor};
//!
//! let registry = DataSourceRegistry::new();
//! registry.register("stdin", LineDataSource::stdin("stdin"));
//!
//! let executor = StreamExecutor::new("select * from stdin where c1 > 10", registry);
//! let mut rows = executor.run();
//! while let Some(row) = rows.next().await {
//!     println!("{:?}", row);
//! }
//! ```

pub mod config;
pub mod registry;
pub mod resolver;
pub mod sink;
pub mod source;
pub mod stream;

pub use config::{StreamConfig, DEFAULT_CHANNEL_CAPACITY};
pub use registry::DataSourceRegistry;
pub use resolver::SourceResolver;
pub use sink::{drain, CollectSink, RowSink, TextSink};
pub use source::{
    ChannelDataSource, DataSource, LineDataSource, MemoryDataSource, RowSender, RowStream,
};
pub use stream::{
    CompiledStatement, ErrorLog, ExecutionHandle, ExecutionState, StreamExecutor, StreamStats,
};
