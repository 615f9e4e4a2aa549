//! Streaming SELECT executor
//!
//! A [`StreamExecutor`] owns one statement. Construction parses and compiles
//! it; reading spawns a single task that resolves the input lazily, filters
//! rows with the compiled predicate, applies OFFSET/LIMIT and pushes the
//! survivors into a bounded output stream. Because the executor is itself a
//! [`DataSource`], nested subqueries compose into a pipeline of tasks.
//!
//! Lifecycle: `Created → Initialized → Running → Completed`, or `Failed`
//! from any state after `Created`. A failed executor emits no rows and its
//! output stream closes empty; the error log is the only way to learn why.

use crate::config::StreamConfig;
use crate::registry::DataSourceRegistry;
use crate::resolver::SourceResolver;
use crate::source::{DataSource, RowSender, RowStream};
use catql_core::{QueryError, Result, Row, ScalarValue, Schema};
use catql_executor::{evaluate_constant, Predicate};
use catql_parser::{parse, Expr, LimitClause, SelectStatement, Statement, TableReference};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Lifecycle state of an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Statement text received
    Created,
    /// Parsed and compiled, ready to run
    Initialized,
    /// Filter task spawned and pulling rows
    Running,
    /// Output closed after input ended or the limit was reached
    Completed,
    /// A fatal error was recorded; no rows are emitted
    Failed,
}

impl ExecutionState {
    /// Completed or failed: no further transitions happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Completed | ExecutionState::Failed)
    }
}

/// Ordered accumulator of fatal errors.
///
/// Clones share storage; a statement and all its nested subqueries write to
/// the same log.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    errors: Arc<Mutex<Vec<QueryError>>>,
}

impl ErrorLog {
    /// Record a fatal error
    pub fn push(&self, err: QueryError) {
        self.errors.lock().push(err);
    }

    /// No error recorded yet
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Number of recorded errors
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Snapshot of the errors in the order they were recorded
    pub fn errors(&self) -> Vec<QueryError> {
        self.errors.lock().clone()
    }
}

/// Statistics for one execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Rows pulled from the input
    pub rows_read: u64,
    /// Rows for which the predicate was true
    pub rows_matched: u64,
    /// Rows pushed to the output
    pub rows_emitted: u64,
    /// Rows dropped because the predicate failed to evaluate
    pub eval_errors: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    rows_read: AtomicU64,
    rows_matched: AtomicU64,
    rows_emitted: AtomicU64,
    eval_errors: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> StreamStats {
        StreamStats {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_matched: self.rows_matched.load(Ordering::Relaxed),
            rows_emitted: self.rows_emitted.load(Ordering::Relaxed),
            eval_errors: self.eval_errors.load(Ordering::Relaxed),
        }
    }
}

/// Observes an executor after `run`/`read` has consumed it.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    state: watch::Receiver<ExecutionState>,
    errors: ErrorLog,
    stats: Arc<StatsCounters>,
}

impl ExecutionHandle {
    /// Current lifecycle state
    pub fn state(&self) -> ExecutionState {
        *self.state.borrow()
    }

    /// Whether any fatal error was recorded
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded errors, including those of nested subqueries
    pub fn errors(&self) -> Vec<QueryError> {
        self.errors.errors()
    }

    /// Statistics so far
    pub fn stats(&self) -> StreamStats {
        self.stats.snapshot()
    }

    /// Wait until the executor completes or fails.
    pub async fn wait(&self) -> ExecutionState {
        let mut state = self.state.clone();
        let result = match state.wait_for(ExecutionState::is_terminal).await {
            Ok(state) => *state,
            // executor dropped without running
            Err(_) => *self.state.borrow(),
        };
        result
    }
}

/// A parsed statement bound to the virtual schema, ready to run.
#[derive(Debug, Clone)]
pub struct CompiledStatement {
    pub select: SelectStatement,
    pub from: TableReference,
    pub schema: Schema,
    pub predicate: Option<Predicate>,
    /// 0 means unbounded
    pub limit: usize,
    pub offset: usize,
}

impl CompiledStatement {
    /// Validate a SELECT, compile its predicate and evaluate LIMIT/OFFSET once.
    pub fn prepare(select: SelectStatement) -> Result<Self> {
        if select.distinct {
            return Err(QueryError::Unsupported("SELECT DISTINCT".to_string()));
        }
        if !select.group_by.is_empty() || select.having.is_some() {
            return Err(QueryError::Unsupported("GROUP BY / HAVING".to_string()));
        }
        if !select.order_by.is_empty() {
            return Err(QueryError::Unsupported("ORDER BY".to_string()));
        }

        let from = select
            .from
            .clone()
            .ok_or_else(|| QueryError::Unsupported("SELECT without FROM".to_string()))?;

        let schema = Schema::virtual_table();
        let predicate = select
            .selection
            .as_ref()
            .map(|expr| Predicate::compile(expr, &schema))
            .transpose()?;

        let (limit, offset) = match &select.limit {
            Some(LimitClause { count, offset }) => (
                bound_value(count.as_ref(), "LIMIT")?,
                bound_value(offset.as_ref(), "OFFSET")?,
            ),
            None => (0, 0),
        };

        Ok(Self {
            select,
            from,
            schema,
            predicate,
            limit,
            offset,
        })
    }

    /// Predicate outcome for one row. Evaluation failures are `Err` and
    /// are the caller's to count as non-matching.
    fn matches(&self, row: &Row) -> Result<bool> {
        match &self.predicate {
            Some(predicate) => predicate.matches(row, &self.schema),
            None => Ok(true),
        }
    }
}

fn bound_value(expr: Option<&Expr>, clause: &str) -> Result<usize> {
    let Some(expr) = expr else {
        return Ok(0);
    };
    match evaluate_constant(expr)? {
        ScalarValue::Int64(v) if v >= 0 => Ok(v as usize),
        other => Err(QueryError::ParseError(format!(
            "{} must be a non-negative integer, found {}",
            clause, other
        ))),
    }
}

/// OFFSET/LIMIT bookkeeping over matching rows.
#[derive(Debug)]
struct Window {
    limit: usize,
    offset: usize,
    matched: usize,
}

impl Window {
    fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit,
            offset,
            matched: 0,
        }
    }

    /// No further row can be emitted.
    fn is_complete(&self) -> bool {
        self.limit > 0 && self.matched.saturating_sub(self.offset) >= self.limit
    }

    /// Count a matching row; `false` while it is still inside the offset.
    fn admit(&mut self) -> bool {
        self.matched += 1;
        self.matched > self.offset
    }
}

/// The per-statement streaming engine; itself a [`DataSource`].
pub struct StreamExecutor {
    name: String,
    plan: Option<CompiledStatement>,
    registry: DataSourceRegistry,
    config: StreamConfig,
    errors: ErrorLog,
    state: watch::Sender<ExecutionState>,
    stats: Arc<StatsCounters>,
}

impl StreamExecutor {
    /// Parse and initialize `sql`. Failures are recorded, not returned: check
    /// [`has_error`](Self::has_error) before running.
    pub fn new(sql: &str, registry: DataSourceRegistry) -> Self {
        Self::with_config(sql, registry, StreamConfig::default())
    }

    /// Like [`new`](Self::new) with explicit stream settings.
    pub fn with_config(sql: &str, registry: DataSourceRegistry, config: StreamConfig) -> Self {
        let mut executor = Self::created("query".to_string(), registry, config, ErrorLog::default());

        let prepared = parse(sql).and_then(|statement| match statement {
            Statement::Select(select) => CompiledStatement::prepare(select),
        });
        match prepared {
            Ok(plan) => executor.initialize(plan),
            Err(e) => {
                error!(sql, error = %e, "failed to prepare statement");
                executor.fail(e);
            }
        }

        executor
    }

    /// Executor for a subquery; shares the parent's error log.
    pub(crate) fn nested(
        name: String,
        plan: CompiledStatement,
        registry: DataSourceRegistry,
        config: StreamConfig,
        errors: ErrorLog,
    ) -> Self {
        let mut executor = Self::created(name, registry, config, errors);
        executor.initialize(plan);
        executor
    }

    fn created(
        name: String,
        registry: DataSourceRegistry,
        config: StreamConfig,
        errors: ErrorLog,
    ) -> Self {
        let (state, _) = watch::channel(ExecutionState::Created);
        Self {
            name,
            plan: None,
            registry,
            config,
            errors,
            state,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    fn initialize(&mut self, plan: CompiledStatement) {
        debug!(
            executor = %self.name,
            limit = plan.limit,
            offset = plan.offset,
            has_predicate = plan.predicate.is_some(),
            "executor initialized"
        );
        self.plan = Some(plan);
        self.set_state(ExecutionState::Initialized);
    }

    fn fail(&self, err: QueryError) {
        self.errors.push(err);
        self.set_state(ExecutionState::Failed);
    }

    fn set_state(&self, state: ExecutionState) {
        self.state.send_replace(state);
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExecutionState {
        *self.state.borrow()
    }

    /// Whether construction or execution recorded a fatal error
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded errors, in order
    pub fn errors(&self) -> Vec<QueryError> {
        self.errors.errors()
    }

    /// The compiled statement, if preparation succeeded
    pub fn statement(&self) -> Option<&CompiledStatement> {
        self.plan.as_ref()
    }

    /// Handle that keeps observing state, errors and stats after `run`
    pub fn handle(&self) -> ExecutionHandle {
        ExecutionHandle {
            state: self.state.subscribe(),
            errors: self.errors.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Start executing and return the output stream.
    pub fn run(self) -> RowStream {
        self.start(CancellationToken::new())
    }

    fn start(mut self, cancel: CancellationToken) -> RowStream {
        let (output, stream) = RowStream::channel(self.config.channel_capacity, cancel.clone());

        let plan = match self.plan.take() {
            Some(plan) if self.errors.is_empty() => plan,
            _ => {
                debug!(executor = %self.name, "not running a failed executor");
                self.set_state(ExecutionState::Failed);
                // dropping `output` closes the stream empty
                return stream;
            }
        };

        self.set_state(ExecutionState::Running);
        tokio::spawn(self.execute(plan, output, cancel));
        stream
    }

    async fn execute(self, plan: CompiledStatement, output: RowSender, cancel: CancellationToken) {
        let resolver = SourceResolver::new(&self.registry, &self.config, &self.errors);
        let source = match resolver.resolve(&plan.from) {
            Ok(source) => source,
            Err(e) => {
                error!(executor = %self.name, error = %e, "failed to resolve datasource");
                self.fail(e);
                return;
            }
        };

        debug!(executor = %self.name, source = source.name(), "executor running");
        let upstream = cancel.child_token();
        let mut input = source.read(upstream.clone());
        let mut window = Window::new(plan.limit, plan.offset);

        loop {
            if window.is_complete() {
                debug!(executor = %self.name, limit = plan.limit, "limit reached, cancelling upstream");
                upstream.cancel();
                break;
            }

            let row = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(executor = %self.name, "cancelled by downstream");
                    break;
                }
                row = input.next() => row,
            };
            let Some(row) = row else {
                break;
            };
            self.stats.rows_read.fetch_add(1, Ordering::Relaxed);

            if !self.filter(&plan, &row) {
                continue;
            }
            self.stats.rows_matched.fetch_add(1, Ordering::Relaxed);

            if !window.admit() {
                continue;
            }

            // a nested executor failed; nothing may be emitted any more
            if !self.errors.is_empty() {
                upstream.cancel();
                break;
            }

            if !output.send(row).await {
                debug!(executor = %self.name, "output closed, cancelling upstream");
                upstream.cancel();
                break;
            }
            self.stats.rows_emitted.fetch_add(1, Ordering::Relaxed);
        }

        drop(input);
        let state = if self.errors.is_empty() {
            ExecutionState::Completed
        } else {
            ExecutionState::Failed
        };
        debug!(executor = %self.name, ?state, stats = ?self.stats.snapshot(), "executor finished");
        self.set_state(state);
    }

    fn filter(&self, plan: &CompiledStatement, row: &Row) -> bool {
        match plan.matches(row) {
            Ok(matched) => matched,
            Err(e) => {
                self.stats.eval_errors.fetch_add(1, Ordering::Relaxed);
                if self.config.log_row_errors {
                    warn!(executor = %self.name, row = ?row, error = %e, "predicate evaluation failed, dropping row");
                }
                false
            }
        }
    }
}

impl DataSource for StreamExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(self: Box<Self>, cancel: CancellationToken) -> RowStream {
        (*self).start(cancel)
    }
}
