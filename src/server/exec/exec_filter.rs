//! Filter stage: optional reformat, then one vectorised predicate per filter spec.

use polars::prelude::*;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::server::plan::{BooleanOp, QualifiedFilter};
use crate::server::query::Comparison;
use super::exec_common::{apply_op, require_column, typed_literal};
use super::exec_reformat::reformat_date_column;

pub fn comparison_expr(df: &DataFrame, source: &str, cmp: &Comparison) -> AppResult<Expr> {
    let dtype = require_column(df, &cmp.column, source)?;
    let rhs = typed_literal(&cmp.value, &dtype)
        .map_err(|m| AppError::filter(format!("{} {} {}", cmp.column, cmp.op, cmp.value), m))?;
    Ok(apply_op(col(cmp.column.as_str()), cmp.op, rhs))
}

/// Combine comparisons pairwise left to right under `op`.
pub fn fold_predicates(mut exprs: Vec<Expr>, op: Option<BooleanOp>) -> Option<Expr> {
    if exprs.is_empty() {
        return None;
    }
    let first = exprs.remove(0);
    Some(exprs.into_iter().fold(first, |acc, e| match op {
        Some(BooleanOp::Or) => acc.or(e),
        _ => acc.and(e),
    }))
}

pub fn apply_filter(df: DataFrame, source: &str, filter: &QualifiedFilter, config: &EngineConfig) -> AppResult<DataFrame> {
    let df = match &filter.reformat {
        Some(r) => reformat_date_column(df, source, &r.column, &r.target_format, config)?,
        None => df,
    };
    let exprs = filter
        .comparisons
        .iter()
        .map(|c| comparison_expr(&df, source, c))
        .collect::<AppResult<Vec<_>>>()?;
    let Some(predicate) = fold_predicates(exprs, filter.operator) else {
        return Ok(df);
    };
    let before = df.height();
    let out = df.lazy().filter(predicate).collect()?;
    debug!(target: "tabweave::exec", "FILTER: source='{}' rows {} -> {}", source, before, out.height());
    Ok(out)
}

pub fn apply_filters(df: DataFrame, source: &str, filters: &[QualifiedFilter], config: &EngineConfig) -> AppResult<DataFrame> {
    filters.iter().try_fold(df, |acc, f| apply_filter(acc, source, f, config))
}
