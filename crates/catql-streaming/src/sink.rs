//! Row sinks: where an executor's output ends up.

use crate::source::RowStream;
use async_trait::async_trait;
use catql_core::{Result, Row, Schema};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Consumer of output rows
#[async_trait]
pub trait RowSink: Send {
    async fn write_row(&mut self, row: &Row) -> Result<()>;

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes each row as one line of space-separated values in column order.
pub struct TextSink<W> {
    writer: W,
    schema: Schema,
    line_buffered: bool,
}

impl<W: AsyncWrite + Unpin + Send> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            schema: Schema::virtual_table(),
            line_buffered: false,
        }
    }

    /// Flush after every row; used when output feeds another process.
    pub fn line_buffered(mut self, enabled: bool) -> Self {
        self.line_buffered = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RowSink for TextSink<W> {
    async fn write_row(&mut self, row: &Row) -> Result<()> {
        let mut line = row.to_text(&self.schema);
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        if self.line_buffered {
            self.writer.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Keeps every row in memory
#[derive(Debug, Default)]
pub struct CollectSink {
    rows: Vec<Row>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

#[async_trait]
impl RowSink for CollectSink {
    async fn write_row(&mut self, row: &Row) -> Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }
}

/// Pump a stream into a sink until it ends. Returns the number of rows
/// written. A sink error stops the drain and drops the stream, which
/// cancels everything upstream.
pub async fn drain(mut stream: RowStream, sink: &mut dyn RowSink) -> Result<u64> {
    let mut written = 0u64;
    while let Some(row) = stream.next().await {
        sink.write_row(&row).await?;
        written += 1;
    }
    sink.flush().await?;
    Ok(written)
}
