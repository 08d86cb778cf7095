//! Derived columns: each CaseRule becomes `when(cond).then(a).otherwise(b)`.
//!
//! All rules of a source are compiled against the frame as loaded and applied in
//! one projection, in declaration order, so no rule can observe another's output.

use polars::prelude::*;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::server::plan::DerivedColumn;
use super::exec_common::{apply_op, branch_values, require_column, typed_literal};

pub fn derived_expr(df: &DataFrame, source: &str, derived: &DerivedColumn) -> AppResult<Expr> {
    let rule = &derived.rule;
    let dtype = require_column(df, &rule.column, source)?;
    let rhs = typed_literal(&rule.comparison, &dtype).map_err(|m| AppError::derived(rule.to_string(), m))?;
    let cond = apply_op(col(rule.column.as_str()), rule.op, rhs);
    let (then_v, else_v) = branch_values(&rule.then_value, &rule.else_value);
    Ok(when(cond).then(then_v).otherwise(else_v).alias(derived.name.as_str()))
}

pub fn apply_derived_columns(df: DataFrame, source: &str, derived: &[DerivedColumn]) -> AppResult<DataFrame> {
    if derived.is_empty() {
        return Ok(df);
    }
    let mut exprs = Vec::with_capacity(derived.len());
    for d in derived {
        if df.column(&d.name).is_ok() {
            return Err(AppError::validation(format!(
                "derived column '{}' collides with an existing column of '{}'", d.name, source
            )));
        }
        exprs.push(derived_expr(&df, source, d)?);
    }
    debug!(target: "tabweave::exec", "DERIVE: source='{}' adding {:?}", source, derived.iter().map(|d| d.name.as_str()).collect::<Vec<_>>());
    Ok(df.lazy().with_columns(exprs).collect()?)
}
