use anyhow::{bail, Result};
use catql_core::QueryError;
use catql_streaming::{
    drain, DataSource, DataSourceRegistry, ExecutionState, LineDataSource, StreamConfig,
    StreamExecutor, StreamStats, TextSink,
};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::AsyncWrite;
use tracing::debug;

/// Where the named datasource reads its lines from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `stdin://`, `file://<path>` or a bare path.
    pub fn parse(url: &str) -> Result<Self> {
        if url == "-" || url == "stdin://" {
            return Ok(InputSource::Stdin);
        }
        if let Some(path) = url.strip_prefix("file://") {
            if path.is_empty() {
                bail!("missing path in input url '{}'", url);
            }
            return Ok(InputSource::File(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            bail!("unsupported input scheme '{}://'", scheme);
        }
        Ok(InputSource::File(PathBuf::from(url)))
    }

    fn into_datasource(self, name: &str, capacity: usize) -> Result<LineDataSource> {
        let source = match self {
            InputSource::Stdin => LineDataSource::stdin(name),
            InputSource::File(path) => LineDataSource::open(name, &path)?,
        };
        Ok(source.with_capacity(capacity))
    }
}

/// Statement text to run: either the full SQL, or the `-w` shorthand
/// rewritten into a select over the datasource.
pub fn statement_text(sql: Option<&str>, predicate: Option<&str>, datasource: &str) -> Result<String> {
    match (sql, predicate) {
        (Some(sql), None) => Ok(sql.to_string()),
        (None, Some(predicate)) => Ok(format!("select * from {} where {}", datasource, predicate)),
        (Some(_), Some(_)) => bail!("use either -e or -w, not both"),
        (None, None) => bail!("nothing to run: pass a statement with -e or a predicate with -w"),
    }
}

/// Outcome of one run, for the exit code and stats output.
#[derive(Debug)]
pub struct RunSummary {
    pub state: ExecutionState,
    pub errors: Vec<QueryError>,
    pub stats: StreamStats,
    pub rows_written: u64,
}

/// Register `input` under `datasource`, run `sql` and write rows to stdout.
pub async fn run_query(
    sql: &str,
    datasource: &str,
    input: InputSource,
    config: StreamConfig,
) -> Result<RunSummary> {
    let source = input.into_datasource(datasource, config.channel_capacity)?;
    execute(sql, datasource, source, config, tokio::io::stdout()).await
}

/// Run `sql` over `source` registered as `datasource`, writing rows to `output`.
/// Returns as soon as the executor is done, even if the source never ends.
pub async fn execute<W>(
    sql: &str,
    datasource: &str,
    source: impl DataSource + 'static,
    config: StreamConfig,
    output: W,
) -> Result<RunSummary>
where
    W: AsyncWrite + Unpin + Send,
{
    let start = Instant::now();

    let registry = DataSourceRegistry::new();
    registry.register(datasource, source);

    let executor = StreamExecutor::with_config(sql, registry, config);
    let handle = executor.handle();

    let mut sink = TextSink::new(output).line_buffered(true);
    let rows_written = drain(executor.run(), &mut sink).await?;
    let state = handle.wait().await;

    debug!(
        ?state,
        rows_written,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "query finished"
    );

    Ok(RunSummary {
        state,
        errors: handle.errors(),
        stats: handle.stats(),
        rows_written,
    })
}

pub fn report_errors(errors: &[QueryError]) {
    for error in errors {
        eprintln!("{} {}", "error:".bright_red().bold(), error);
    }
}

pub fn print_stats(stats: &StreamStats) {
    eprintln!(
        "{} read {}, matched {}, emitted {}, evaluation errors {}",
        "stats:".bright_yellow(),
        stats.rows_read,
        stats.rows_matched,
        stats.rows_emitted,
        stats.eval_errors
    );
}
