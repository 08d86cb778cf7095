//! Date reformatting ahead of filtering.
//!
//! The source layout is inferred from the first row: the first entry of
//! `EngineConfig::known_layouts` that parses it wins and is then applied to every
//! row. A row that does not parse under that layout fails the whole stage.
//! Typed `Date`/`Datetime` columns skip inference and are rendered directly.

use std::fmt::Write as _;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use super::exec_common::require_column;

fn parse_with(value: &str, layout: &str) -> Option<NaiveDateTime> {
    let v = value.trim();
    NaiveDateTime::parse_from_str(v, layout)
        .ok()
        .or_else(|| NaiveDate::parse_from_str(v, layout).ok().map(|d| d.and_time(NaiveTime::MIN)))
}

pub fn infer_layout<'a>(sample: &str, config: &'a EngineConfig) -> Option<&'a str> {
    config
        .known_layouts
        .iter()
        .map(String::as_str)
        .find(|layout| parse_with(sample, layout).is_some())
}

fn render(value: &NaiveDateTime, column: &str, target_format: &str) -> AppResult<String> {
    let mut rendered = String::new();
    write!(rendered, "{}", value.format(target_format))
        .map_err(|_| AppError::validation(format!("target format '{}' cannot render a date in '{}'", target_format, column)))?;
    Ok(rendered)
}

fn render_temporal(series: &Series, column: &str, target_format: &str) -> AppResult<Series> {
    let as_datetime = series.cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
    let out = as_datetime
        .datetime()?
        .as_datetime_iter()
        .map(|v| v.map(|dt| render(&dt, column, target_format)).transpose())
        .collect::<AppResult<Vec<Option<String>>>>()?;
    Ok(Series::new(column.into(), out))
}

/// Rewrite `column` of `df` from its inferred layout into `target_format`
/// (a chrono strftime string). Empty tables pass through untouched.
pub fn reformat_date_column(df: DataFrame, source: &str, column: &str, target_format: &str, config: &EngineConfig) -> AppResult<DataFrame> {
    let dtype = require_column(&df, column, source)?;
    if df.height() == 0 {
        return Ok(df);
    }
    let series = df.column(column)?.as_materialized_series().clone();
    if matches!(dtype, DataType::Date | DataType::Datetime(_, _)) {
        debug!(target: "tabweave::exec", "REFORMAT: column='{}' typed {} target='{}'", column, dtype, target_format);
        let rendered = render_temporal(&series, column, target_format)?;
        let mut df = df;
        df.with_column(rendered)?;
        return Ok(df);
    }
    let series = if dtype == DataType::String { series } else { series.cast(&DataType::String)? };
    let ca = series.str()?;

    let Some(sample) = ca.get(0) else {
        return Err(AppError::date_format(column.to_string(), "first row is null, no sample to infer a layout from".to_string()));
    };
    let Some(layout) = infer_layout(sample, config) else {
        return Err(AppError::date_format(column.to_string(), format!(
            "no known layout parses sample '{}' (tried: {})", sample, config.known_layouts.join(", ")
        )));
    };
    debug!(target: "tabweave::exec", "REFORMAT: column='{}' sample='{}' layout='{}' target='{}'", column, sample, layout, target_format);

    let mut out: Vec<Option<String>> = Vec::with_capacity(ca.len());
    for (row, value) in ca.into_iter().enumerate() {
        let Some(value) = value else { out.push(None); continue; };
        let Some(parsed) = parse_with(value, layout) else {
            return Err(AppError::date_format(column.to_string(), format!(
                "value '{}' at row {} does not match inferred layout '{}'", value, row, layout
            )));
        };
        out.push(Some(render(&parsed, column, target_format)?));
    }

    let mut df = df;
    df.with_column(Series::new(column.into(), out))?;
    Ok(df)
}
