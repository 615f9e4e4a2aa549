//! Row streams and the datasources that produce them.
//!
//! Every datasource is single-use: `read` consumes it, spawns one producer
//! task and hands back the receiving end of a bounded channel. Closing the
//! channel is the only end-of-stream signal. Producers also watch a
//! cancellation token so an abandoned stream stops them promptly.

use crate::config::DEFAULT_CHANNEL_CAPACITY;
use catql_core::{Result, Row};
use futures::Stream;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// A single-use, asynchronous, ordered producer of rows.
pub trait DataSource: Send {
    /// Name used in logs and diagnostics
    fn name(&self) -> &str;

    /// Start producing rows. Must be called from within a tokio runtime.
    ///
    /// Producers stop as soon as `cancel` fires or the returned stream is dropped.
    fn read(self: Box<Self>, cancel: CancellationToken) -> RowStream;
}

/// Receiving end of a bounded row channel.
///
/// Dropping the stream cancels its token, telling the producer to stop.
pub struct RowStream {
    receiver: mpsc::Receiver<Row>,
    cancel: CancellationToken,
}

impl RowStream {
    /// Create a bounded stream and the sender a producer pushes into.
    pub fn channel(capacity: usize, cancel: CancellationToken) -> (RowSender, RowStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sender = RowSender {
            sender: tx,
            cancel: cancel.clone(),
        };
        (sender, Self::from_receiver(rx, cancel))
    }

    /// Wrap an existing receiver; `cancel` fires when the stream is dropped.
    pub fn from_receiver(receiver: mpsc::Receiver<Row>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// A stream that is already closed.
    pub fn empty() -> Self {
        let (_, stream) = Self::channel(1, CancellationToken::new());
        stream
    }

    /// Next row, or `None` once the producer has closed the stream.
    pub async fn next(&mut self) -> Option<Row> {
        self.receiver.recv().await
    }

    /// Ask the producer to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether this stream's producer has been told to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drain the stream into memory.
    pub async fn collect_rows(mut self) -> Vec<Row> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await {
            rows.push(row);
        }
        rows
    }
}

impl Stream for RowStream {
    type Item = Row;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Row>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Sending end of a bounded row channel.
#[derive(Debug, Clone)]
pub struct RowSender {
    sender: mpsc::Sender<Row>,
    cancel: CancellationToken,
}

impl RowSender {
    /// Push a row, waiting for capacity. Returns `false` when the consumer is
    /// gone or the stream was cancelled; the producer should stop then.
    pub async fn send(&self, row: Row) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            result = self.sender.send(row) => result.is_ok(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.sender.is_closed()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Datasource fed through an externally held channel sender.
pub struct ChannelDataSource {
    receiver: mpsc::Receiver<Row>,
    name: String,
}

impl ChannelDataSource {
    /// Create a new channel datasource with the given buffer size.
    /// Returns (sender, source) tuple
    pub fn new(buffer_size: usize) -> (mpsc::Sender<Row>, Self) {
        Self::with_name(buffer_size, "channel")
    }

    pub fn with_name(buffer_size: usize, name: impl Into<String>) -> (mpsc::Sender<Row>, Self) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let source = Self {
            receiver: rx,
            name: name.into(),
        };
        (tx, source)
    }
}

impl DataSource for ChannelDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    // The external feeder is the producer; dropping the receiver stops it.
    fn read(self: Box<Self>, cancel: CancellationToken) -> RowStream {
        let this = *self;
        RowStream::from_receiver(this.receiver, cancel)
    }
}

/// In-memory datasource, mostly for tests
pub struct MemoryDataSource {
    rows: Vec<Row>,
    name: String,
    capacity: usize,
}

impl MemoryDataSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self::with_name(rows, "memory")
    }

    pub fn with_name(rows: Vec<Row>, name: impl Into<String>) -> Self {
        Self {
            rows,
            name: name.into(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// One row per line of `text`, split on whitespace.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines().map(Row::from_line).collect())
    }
}

impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(self: Box<Self>, cancel: CancellationToken) -> RowStream {
        let MemoryDataSource {
            rows,
            name,
            capacity,
        } = *self;
        let (tx, stream) = RowStream::channel(capacity, cancel);
        tokio::spawn(async move {
            for row in rows {
                if !tx.send(row).await {
                    debug!(source = %name, "memory source stopped early");
                    return;
                }
            }
        });
        stream
    }
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Tokenizes each line of a byte input into positional columns `c1..c9`.
///
/// A blank line yields an empty row rather than being skipped. Invalid UTF-8
/// is replaced, never fatal.
pub struct LineDataSource {
    reader: BoxedReader,
    name: String,
    capacity: usize,
}

impl LineDataSource {
    pub fn new(name: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            name: name.into(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Lines from the process's standard input
    pub fn stdin(name: impl Into<String>) -> Self {
        Self::new(name, tokio::io::stdin())
    }

    /// Lines from a file opened now; the read itself starts with `read`.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Ok(Self::new(name, tokio::fs::File::from_std(file)))
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl DataSource for LineDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(self: Box<Self>, cancel: CancellationToken) -> RowStream {
        let (tx, stream) = RowStream::channel(self.capacity, cancel);
        let this = *self;
        tokio::spawn(produce_lines(this.name, this.reader, tx));
        stream
    }
}

async fn produce_lines(name: String, reader: BoxedReader, tx: RowSender) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut rows = 0u64;

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = tx.cancellation().cancelled() => {
                debug!(source = %name, rows, "line source cancelled");
                return;
            }
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                let row = Row::from_line(line);
                trace!(source = %name, line, fields = row.len(), "read line");
                if !tx.send(row).await {
                    debug!(source = %name, rows, "line source consumer gone");
                    return;
                }
                rows += 1;
            }
            Err(e) => {
                warn!(source = %name, error = %e, "read failed, closing stream");
                break;
            }
        }
    }

    debug!(source = %name, rows, "line source exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, ReadBuf};

    /// Endless input that hands out one numbered line per read and counts them.
    struct CountingLines {
        served: Arc<AtomicUsize>,
    }

    impl AsyncRead for CountingLines {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let n = self.served.fetch_add(1, Ordering::SeqCst);
            buf.put_slice(format!("{}\n", n).as_bytes());
            Poll::Ready(Ok(()))
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_line_source_tokenizes_lines() {
        let input: &'static [u8] = b"a b  c\n\n  x\t y\r\nlast";
        let source = Box::new(LineDataSource::new("test", input));
        let rows = source.read(CancellationToken::new()).collect_rows().await;

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], Row::from_fields(["a", "b", "c"]));
        // blank line is an empty row, not skipped
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], Row::from_fields(["x", "y"]));
        assert_eq!(rows[3], Row::from_fields(["last"]));
    }

    #[tokio::test]
    async fn test_line_source_replaces_invalid_utf8() {
        let input: &'static [u8] = b"ok \xff\n";
        let source = Box::new(LineDataSource::new("test", input));
        let rows = source.read(CancellationToken::new()).collect_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("c1"), Some("ok"));
        assert_eq!(rows[0].get("c2"), Some("\u{fffd}"));
    }

    #[tokio::test]
    async fn test_line_source_stops_when_cancelled() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let feeder = tokio::spawn(async move {
            // ends with an error once the reading side is dropped
            while writer.write_all(b"1 2 3\n").await.is_ok() {}
        });

        let source = Box::new(LineDataSource::new("pipe", reader));
        let mut stream = source.read(CancellationToken::new());
        assert!(stream.next().await.is_some());
        drop(stream);

        tokio::time::timeout(Duration::from_secs(5), feeder)
            .await
            .expect("feeder should observe the closed pipe")
            .unwrap();
    }

    #[tokio::test]
    async fn test_line_source_blocks_when_buffer_full() {
        let served = Arc::new(AtomicUsize::new(0));
        let reader = CountingLines {
            served: served.clone(),
        };
        let source = Box::new(LineDataSource::new("endless", reader));
        let mut stream = source.read(CancellationToken::new());

        // nobody reads: the producer fills the channel, holds one more row
        // waiting for room, and stops reading input
        settle().await;
        let stalled = served.load(Ordering::SeqCst);
        assert!(
            (DEFAULT_CHANNEL_CAPACITY..=DEFAULT_CHANNEL_CAPACITY + 2).contains(&stalled),
            "read {} lines ahead of the consumer",
            stalled
        );
        settle().await;
        assert_eq!(served.load(Ordering::SeqCst), stalled);

        // each row taken frees room for exactly one more line
        for expected in 0..5 {
            let row = stream.next().await.unwrap();
            assert_eq!(row.get("c1"), Some(expected.to_string().as_str()));
        }
        settle().await;
        assert_eq!(served.load(Ordering::SeqCst), stalled + 5);

        stream.cancel();
        assert!(stream.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_keeps_buffered_rows_readable() {
        let rows: Vec<Row> = (0..3).map(|i| Row::from_fields([i.to_string()])).collect();
        let source = Box::new(MemoryDataSource::new(rows.clone()));
        let stream = source.read(CancellationToken::new());
        settle().await;

        assert!(!stream.is_cancelled());
        stream.cancel();
        assert!(stream.is_cancelled());
        assert_eq!(stream.collect_rows().await, rows);
    }

    #[tokio::test]
    async fn test_memory_source_preserves_order_past_capacity() {
        let rows: Vec<Row> = (0..25).map(|i| Row::from_fields([i.to_string()])).collect();
        let source = Box::new(MemoryDataSource::new(rows.clone()).with_capacity(3));
        let received = source.read(CancellationToken::new()).collect_rows().await;
        assert_eq!(received, rows);
    }

    #[tokio::test]
    async fn test_memory_source_stops_on_cancel() {
        let rows: Vec<Row> = (0..100).map(|i| Row::from_fields([i.to_string()])).collect();
        let source = Box::new(MemoryDataSource::new(rows).with_capacity(2));
        let cancel = CancellationToken::new();
        let mut stream = source.read(cancel.clone());
        assert!(stream.next().await.is_some());

        cancel.cancel();
        let mut remaining = 0;
        while stream.next().await.is_some() {
            remaining += 1;
        }
        // at most what was already buffered
        assert!(remaining <= 2, "received {} rows after cancel", remaining);
    }

    #[tokio::test]
    async fn test_channel_source() {
        let (tx, source) = ChannelDataSource::new(4);
        tx.send(Row::from_fields(["1"])).await.unwrap();
        tx.send(Row::from_fields(["2"])).await.unwrap();
        drop(tx);

        let stream = Box::new(source).read(CancellationToken::new());
        let values: Vec<String> = stream
            .map(|row| row.get("c1").unwrap_or_default().to_string())
            .collect()
            .await;
        assert_eq!(values, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_token() {
        let cancel = CancellationToken::new();
        let (tx, stream) = RowStream::channel(2, cancel.clone());
        assert!(!tx.is_closed());
        drop(stream);
        assert!(cancel.is_cancelled());
        assert!(!tx.send(Row::new()).await);
    }

    #[tokio::test]
    async fn test_empty_stream_is_closed() {
        let mut stream = RowStream::empty();
        assert!(stream.next().await.is_none());
    }
}
