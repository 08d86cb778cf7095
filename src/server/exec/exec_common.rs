//! Shared helpers for compiling parsed ASTs into polars expressions.

use polars::prelude::*;

use crate::error::{AppError, AppResult};
use crate::server::query::{render_iso, CompOp, Literal};

/// Dtype of `column` in `df`, or a ColumnNotFound error listing what does exist.
pub fn require_column(df: &DataFrame, column: &str, table: &str) -> AppResult<DataType> {
    match df.column(column) {
        Ok(c) => Ok(c.dtype().clone()),
        Err(_) => {
            let available: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
            Err(AppError::column_not_found(column, table, &available))
        }
    }
}

pub fn literal_expr(value: &Literal) -> Expr {
    match value {
        Literal::Int(i) => lit(*i),
        Literal::Float(x) => lit(*x),
        Literal::Text(s) => lit(s.clone()),
        Literal::DateTime(dt) => lit(*dt),
    }
}

/// Right-hand side literal for a comparison against a column of type `dtype`.
/// Mismatched kinds are rejected rather than coerced.
pub fn typed_literal(value: &Literal, dtype: &DataType) -> Result<Expr, String> {
    match (value, dtype) {
        (_, DataType::Null) => Ok(literal_expr(value)),
        (v, dt) if v.is_numeric() && dt.is_numeric() => Ok(literal_expr(v)),
        (Literal::Text(s), DataType::String) => Ok(lit(s.clone())),
        (Literal::DateTime(dt), DataType::String) => Ok(lit(render_iso(dt))),
        (Literal::DateTime(dt), DataType::Date) => Ok(lit(dt.date())),
        (Literal::DateTime(dt), DataType::Datetime(_, _)) => Ok(lit(*dt).cast(dtype.clone())),
        (v, dt) => Err(format!("cannot compare a {} column with {} literal {}", dt, v.kind_name(), v)),
    }
}

pub fn apply_op(lhs: Expr, op: CompOp, rhs: Expr) -> Expr {
    match op {
        CompOp::Eq => lhs.eq(rhs),
        CompOp::Ne => lhs.neq(rhs),
        CompOp::Gt => lhs.gt(rhs),
        CompOp::Ge => lhs.gt_eq(rhs),
        CompOp::Lt => lhs.lt(rhs),
        CompOp::Le => lhs.lt_eq(rhs),
    }
}

/// THEN/ELSE value pair with a common output type: numerals stay numeric
/// as Int64, or Float64 if either side is a float; anything else renders as text.
pub fn branch_values(then_value: &Literal, else_value: &Literal) -> (Expr, Expr) {
    match (then_value, else_value) {
        (Literal::Int(a), Literal::Int(b)) => (
            lit(*a).cast(DataType::Int64),
            lit(*b).cast(DataType::Int64),
        ),
        (a, b) if a.is_numeric() && b.is_numeric() => (
            lit(as_f64(a)).cast(DataType::Float64),
            lit(as_f64(b)).cast(DataType::Float64),
        ),
        (a, b) => (lit(a.render_text()), lit(b.render_text())),
    }
}

fn as_f64(v: &Literal) -> f64 {
    match v {
        Literal::Int(i) => *i as f64,
        Literal::Float(x) => *x,
        _ => f64::NAN,
    }
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|c| c.to_string()).collect()
}
