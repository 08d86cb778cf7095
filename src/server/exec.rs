// Submodules implementing parts of exec
// NOTE: This module is intentionally kept thin. Add new logic in exec_*.rs files.
pub mod exec_common;    // AST -> polars Expr helpers shared by the stages
pub mod exec_derive;    // CASE rules -> derived columns
pub mod exec_reformat;  // date layout inference and rewrite
pub mod exec_filter;    // filter predicates
pub mod exec_join;      // join planning and left-fold execution

use std::sync::Arc;
use std::time::Instant;

use polars::prelude::*;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::ident::{namespace_frame, namespace_plan};
use crate::server::plan::{QualifiedPlan, QualifiedSource, RequestPlan};
use crate::storage::{TableSink, TableSource};

pub use exec_derive::apply_derived_columns;
pub use exec_filter::{apply_filter, apply_filters};
pub use exec_join::{execute_joins, plan_joins, JoinStep};
pub use exec_reformat::{infer_layout, reformat_date_column};

/// Result of one persisted run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub destination: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Per-request orchestration: validate, namespace, prepare every source
/// (load, derive, reformat, filter), fold the joins, write once.
///
/// A Pipeline holds no per-request state; clones share the same config and collaborators.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<EngineConfig>,
    source: Arc<dyn TableSource>,
    sink: Arc<dyn TableSink>,
}

impl Pipeline {
    pub fn new(config: EngineConfig, source: Arc<dyn TableSource>, sink: Arc<dyn TableSink>) -> Self {
        Self { config: Arc::new(config), source, sink }
    }

    /// Run the plan and persist the result through the sink.
    pub fn run(&self, plan: &RequestPlan) -> AppResult<PipelineOutput> {
        let started = Instant::now();
        let mut df = self.execute(plan)?;
        let t = Instant::now();
        let destination = self.sink.write_table(&mut df)?;
        info!(target: "tabweave::exec", "write took {:?}", t.elapsed());
        info!(target: "tabweave::exec", "pipeline finished: rows={} cols={} dest='{}' total={:?}",
            df.height(), df.width(), destination, started.elapsed());
        Ok(PipelineOutput {
            destination,
            rows: df.height(),
            columns: exec_common::column_names(&df),
        })
    }

    /// Run the plan and return the final table without writing it.
    pub fn execute(&self, plan: &RequestPlan) -> AppResult<DataFrame> {
        plan.validate(&self.config)?;
        let qualified = namespace_plan(plan, &self.config)?;
        let steps = plan_joins(&qualified)?;

        let t = Instant::now();
        let mut frames = self.prepare_all(&qualified)?.into_iter();
        info!(target: "tabweave::exec", "prepared {} source(s) in {:?}", qualified.sources().count(), t.elapsed());

        let primary = frames.next().ok_or_else(|| AppError::internal("primary table missing after preparation"))?;
        if steps.is_empty() {
            return Ok(primary);
        }
        let t = Instant::now();
        let joined = execute_joins(primary, frames.collect(), &steps)?;
        info!(target: "tabweave::exec", "join of {} table(s) took {:?}, rows={}", steps.len() + 1, t.elapsed(), joined.height());
        Ok(joined)
    }

    /// Load, namespace, derive and filter one source.
    pub fn prepare_source(&self, src: &QualifiedSource) -> AppResult<DataFrame> {
        let t = Instant::now();
        let raw = self.source.load_table(&src.table)?;
        info!(target: "tabweave::exec", "load '{}' took {:?} ({} rows)", src.table, t.elapsed(), raw.height());

        let df = namespace_frame(raw, &src.source, &self.config)?;
        debug!(target: "tabweave::exec", "namespaced '{}': {:?}", src.source, df.get_column_names());

        let t = Instant::now();
        let df = apply_derived_columns(df, &src.source, &src.derived)?;
        if !src.derived.is_empty() {
            info!(target: "tabweave::exec", "derive on '{}' took {:?}", src.source, t.elapsed());
        }

        let t = Instant::now();
        let df = apply_filters(df, &src.source, &src.filters, &self.config)?;
        if !src.filters.is_empty() {
            info!(target: "tabweave::exec", "filter on '{}' took {:?} ({} rows left)", src.source, t.elapsed(), df.height());
        }
        Ok(df)
    }

    /// Prepare every source, primary first. Sources are independent until the
    /// join, so they run on scoped threads when enabled.
    fn prepare_all(&self, plan: &QualifiedPlan) -> AppResult<Vec<DataFrame>> {
        let sources: Vec<&QualifiedSource> = plan.sources().collect();
        if !self.config.parallel_sources || sources.len() < 2 {
            return sources.into_iter().map(|s| self.prepare_source(s)).collect();
        }
        std::thread::scope(|scope| {
            let handles: Vec<_> = sources
                .into_iter()
                .map(|s| scope.spawn(move || self.prepare_source(s)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().map_err(|_| AppError::internal("source preparation thread panicked"))?)
                .collect()
        })
    }
}
