//! Request plan: the declarative description of one pipeline run.
//!
//! The wire model accepts both the normalized field names and the aliases used by
//! existing clients (`files_and_join_info`, `Filename`, `Join_columns`, ...).
//! `RequestPlan::validate` enforces every structural invariant before any table
//! is loaded; `ident::namespace_plan` then turns a validated plan into a
//! `QualifiedPlan` whose column references are all namespaced.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::ident::source_name;
use crate::server::query::{translate_date_format, CaseRule, Comparison};

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\- ]*$").expect("static regex"));

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    #[default]
    #[serde(alias = "full")]
    Outer,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanOp {
    #[serde(rename = "AND", alias = "And", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "Or", alias = "or")]
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedColumnSpec {
    #[serde(alias = "sql_statement")]
    pub statement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryTable {
    #[serde(alias = "Filename", alias = "file_name", alias = "filename")]
    pub name: String,
    #[serde(default, alias = "Join_columns", alias = "join_columns", alias = "joinKeys", deserialize_with = "null_as_default")]
    pub join_keys: Vec<String>,
    #[serde(default, alias = "derivedColumns", deserialize_with = "null_as_default")]
    pub derived_columns: Vec<DerivedColumnSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryTable {
    #[serde(alias = "File name", alias = "file_name", alias = "fileName")]
    pub name: String,
    #[serde(default, alias = "Join_columns", alias = "join_columns", alias = "joinKeys", deserialize_with = "null_as_default")]
    pub join_keys: Vec<String>,
    #[serde(default, alias = "join_type", alias = "joinKind", deserialize_with = "null_as_default")]
    pub join_kind: JoinKind,
    #[serde(default, alias = "derivedColumns", deserialize_with = "null_as_default")]
    pub derived_columns: Vec<DerivedColumnSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesAndJoin {
    #[serde(alias = "primary_file")]
    pub primary: PrimaryTable,
    #[serde(default, alias = "secondary_files", deserialize_with = "null_as_default")]
    pub secondaries: Vec<SecondaryTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertSpec {
    #[serde(alias = "column_name")]
    pub column: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(alias = "Expressions")]
    pub expressions: Vec<String>,
    #[serde(default)]
    pub operator: Option<BooleanOp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(alias = "fileName", alias = "file_name")]
    pub name: String,
    #[serde(default, alias = "convert_condition")]
    pub convert: Option<ConvertSpec>,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPlan {
    #[serde(alias = "tablesAndJoin", alias = "files_and_join_info")]
    pub tables_and_join: TablesAndJoin,
    #[serde(default, alias = "filter", deserialize_with = "null_as_default")]
    pub filters: Vec<FilterSpec>,
}

impl RequestPlan {
    /// All declared table names, primary first.
    pub fn table_names(&self) -> Vec<&str> {
        let mut out = vec![self.tables_and_join.primary.name.as_str()];
        out.extend(self.tables_and_join.secondaries.iter().map(|s| s.name.as_str()));
        out
    }

    pub fn validate(&self, config: &EngineConfig) -> AppResult<()> {
        let tj = &self.tables_and_join;

        let mut seen_sources: HashSet<&str> = HashSet::new();
        for name in self.table_names() {
            if !TABLE_NAME.is_match(name) || name.contains("..") {
                return Err(AppError::validation(format!("invalid table name '{}'", name)));
            }
            let source = source_name(name);
            if source.contains(config.connector.as_str()) {
                return Err(AppError::validation(format!(
                    "source name '{}' must not contain the namespace connector '{}'", source, config.connector
                )));
            }
            if !seen_sources.insert(source) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}': table names must stay unique once their extension is dropped", source
                )));
            }
        }

        if tj.secondaries.is_empty() {
            if self.filters.is_empty() {
                return Err(AppError::validation("a single table without filters is a no-op request; add a filter or a secondary table"));
            }
        } else {
            if tj.primary.join_keys.is_empty() {
                return Err(AppError::validation("primary table must declare join keys when secondary tables are present"));
            }
            for sec in &tj.secondaries {
                if sec.join_keys.len() != tj.primary.join_keys.len() {
                    return Err(AppError::JoinColumnMismatch {
                        left: tj.primary.name.clone(),
                        left_count: tj.primary.join_keys.len(),
                        right: sec.name.clone(),
                        right_count: sec.join_keys.len(),
                    });
                }
            }
        }

        let declared: HashSet<&str> = self.table_names().into_iter().collect();
        for f in &self.filters {
            if !declared.contains(f.name.as_str()) {
                return Err(AppError::validation(format!("filter references '{}', which is not a declared table", f.name)));
            }
            let n = f.conditions.expressions.len();
            if n == 0 {
                return Err(AppError::validation(format!("filter on '{}': expressions list cannot be empty", f.name)));
            }
            match (n > 1, f.conditions.operator) {
                (true, None) => return Err(AppError::validation(format!(
                    "filter on '{}': operator is required when more than one expression is provided", f.name
                ))),
                (false, Some(_)) => return Err(AppError::validation(format!(
                    "filter on '{}': operator must not be provided for a single expression", f.name
                ))),
                _ => {}
            }
            if let Some(conv) = &f.convert {
                if conv.column.trim().is_empty() {
                    return Err(AppError::validation(format!("filter on '{}': convert column must not be empty", f.name)));
                }
                translate_date_format(&conv.format, config)?;
            }
        }
        debug!(target: "tabweave::plan", "validated plan: tables={:?} filters={}", self.table_names(), self.filters.len());
        Ok(())
    }
}

/// Reformat step with a namespaced column and a translated strftime layout.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedReformat {
    pub column: String,
    pub target_format: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedFilter {
    pub reformat: Option<QualifiedReformat>,
    pub comparisons: Vec<Comparison>,
    pub operator: Option<BooleanOp>,
}

/// A derived column: its namespaced output name and the rule computing it.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    pub name: String,
    pub rule: CaseRule,
}

/// One source with every textual reference resolved to its namespaced form.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedSource {
    /// Declared table name, handed to the loader.
    pub table: String,
    /// Namespace prefix (table name without extension).
    pub source: String,
    pub join_keys: Vec<String>,
    pub join_kind: Option<JoinKind>,
    pub derived: Vec<DerivedColumn>,
    pub filters: Vec<QualifiedFilter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedPlan {
    pub primary: QualifiedSource,
    pub secondaries: Vec<QualifiedSource>,
}

impl QualifiedPlan {
    pub fn sources(&self) -> impl Iterator<Item = &QualifiedSource> {
        std::iter::once(&self.primary).chain(self.secondaries.iter())
    }
}
