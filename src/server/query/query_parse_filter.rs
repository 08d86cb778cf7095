//! Filter expression grammar: `<col> <op> <value>`.
//!
//! The value type is inferred in a fixed order, first match wins:
//! a '-' or '/' means ISO-8601 date/time (and failing that is an error),
//! a '.' means float, otherwise integer; anything left over is text.

use tracing::debug;

use crate::error::{AppError, AppResult};
use super::query_common::{find_operator, parse_iso_datetime, Comparison, Literal};

pub fn parse_filter_expression(expression: &str) -> AppResult<Comparison> {
    let text = expression.trim();
    let Some((at, len, op)) = find_operator(text) else {
        return Err(AppError::filter(expression, "expected '<column> <op> <value>' with op one of ==, !=, >, >=, <, <="));
    };
    let column = strip_brackets(text[..at].trim());
    if column.is_empty() {
        return Err(AppError::filter(expression, "missing column name before the operator"));
    }
    let raw_value = text[at + len..].trim();
    if raw_value.is_empty() {
        return Err(AppError::filter(expression, "missing value after the operator"));
    }
    let value = infer_literal(strip_quotes(raw_value)).map_err(|m| AppError::filter(expression, m.as_str()))?;
    debug!(target: "tabweave::plan", "filter '{}' -> column={} op={} value={:?}", expression, column, op, value);
    Ok(Comparison { column: column.to_string(), op, value })
}

pub fn infer_literal(value: &str) -> Result<Literal, String> {
    if value.contains('-') || value.contains('/') {
        return parse_iso_datetime(value)
            .map(Literal::DateTime)
            .ok_or_else(|| format!("value '{}' looks like a date but is not ISO-8601", value));
    }
    if value.contains('.') {
        return Ok(value.parse::<f64>().map(Literal::Float).unwrap_or_else(|_| Literal::Text(value.to_string())));
    }
    Ok(value.parse::<i64>().map(Literal::Int).unwrap_or_else(|_| Literal::Text(value.to_string())))
}

fn strip_quotes(v: &str) -> &str {
    let b = v.as_bytes();
    if b.len() >= 2 && (b[0] == b'\'' || b[0] == b'"') && b[b.len() - 1] == b[0] {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

fn strip_brackets(c: &str) -> &str {
    c.strip_prefix('[').and_then(|s| s.strip_suffix(']')).map(str::trim).unwrap_or(c)
}
