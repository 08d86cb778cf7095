//! Column namespacing
//! -----------------
//! Single source of truth for qualifying column identifiers with their owning
//! source: `<source><connector><column>`, e.g. `data1__id`. Frames are renamed
//! once after loading, and every textual reference in a plan is rewritten to the
//! same form before any stage interprets it.

use polars::prelude::*;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{AppError, AppResult};
use crate::server::plan::{
    DerivedColumn, DerivedColumnSpec, FilterSpec, QualifiedFilter, QualifiedPlan, QualifiedReformat,
    QualifiedSource, RequestPlan,
};
use crate::server::query::{parse_case_statement, parse_filter_expression, translate_date_format};

/// Namespace prefix for a declared table name: everything before the first '.'.
pub fn source_name(table: &str) -> &str {
    let t = table.trim();
    t.split('.').next().unwrap_or(t)
}

pub fn qualify(source: &str, column: &str, config: &EngineConfig) -> String {
    format!("{}{}{}", source, config.connector, column.trim())
}

/// Rename every column of a freshly loaded frame into the source's namespace.
pub fn namespace_frame(mut df: DataFrame, source: &str, config: &EngineConfig) -> AppResult<DataFrame> {
    let names: Vec<PlSmallStr> = df
        .get_column_names()
        .iter()
        .map(|c| PlSmallStr::from(qualify(source, c.as_str(), config)))
        .collect();
    df.set_column_names(names)?;
    Ok(df)
}

fn qualify_source(
    table: &str,
    join_keys: &[String],
    join_kind: Option<crate::server::plan::JoinKind>,
    derived: &[DerivedColumnSpec],
    filters: &[&FilterSpec],
    config: &EngineConfig,
) -> AppResult<QualifiedSource> {
    let source = source_name(table).to_string();

    let mut rules = Vec::with_capacity(derived.len());
    for (i, spec) in derived.iter().enumerate() {
        let rule = parse_case_statement(&spec.statement)?;
        if source_name(&rule.table) != source {
            return Err(AppError::validation(format!(
                "derived column statement '{}' reads FROM '{}' but belongs to '{}'",
                spec.statement, rule.table, source
            )));
        }
        let mut rule = rule;
        rule.column = qualify(&source, &rule.column, config);
        rule.table = source.clone();
        let name = qualify(&source, &format!("{}{}", config.derived_prefix, i + 1), config);
        debug!(target: "tabweave::plan", "derived column {} := {}", name, rule);
        rules.push(DerivedColumn { name, rule });
    }

    let mut qfilters = Vec::with_capacity(filters.len());
    for f in filters {
        let reformat = match &f.convert {
            Some(conv) => Some(QualifiedReformat {
                column: qualify(&source, &conv.column, config),
                target_format: translate_date_format(&conv.format, config)?,
            }),
            None => None,
        };
        let comparisons = f
            .conditions
            .expressions
            .iter()
            .map(|e| {
                let cmp = parse_filter_expression(e)?;
                Ok(cmp.with_column(qualify(&source, &cmp.column, config)))
            })
            .collect::<AppResult<Vec<_>>>()?;
        qfilters.push(QualifiedFilter { reformat, comparisons, operator: f.conditions.operator });
    }

    Ok(QualifiedSource {
        table: table.to_string(),
        join_keys: join_keys.iter().map(|k| qualify(&source, k, config)).collect(),
        source,
        join_kind,
        derived: rules,
        filters: qfilters,
    })
}

/// Produce a new plan with every column reference namespaced and every
/// statement parsed exactly once. The input plan is left untouched.
pub fn namespace_plan(plan: &RequestPlan, config: &EngineConfig) -> AppResult<QualifiedPlan> {
    let tj = &plan.tables_and_join;
    let filters_for = |name: &str| -> Vec<&FilterSpec> { plan.filters.iter().filter(|f| f.name == name).collect() };

    let primary = qualify_source(
        &tj.primary.name,
        &tj.primary.join_keys,
        None,
        &tj.primary.derived_columns,
        &filters_for(&tj.primary.name),
        config,
    )?;
    let secondaries = tj
        .secondaries
        .iter()
        .map(|s| qualify_source(&s.name, &s.join_keys, Some(s.join_kind), &s.derived_columns, &filters_for(&s.name), config))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(QualifiedPlan { primary, secondaries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::query::{CompOp, Literal};

    #[test]
    fn source_name_drops_extension() {
        assert_eq!(source_name("data1.csv"), "data1");
        assert_eq!(source_name("data_in_json.json"), "data_in_json");
        assert_eq!(source_name("plain"), "plain");
    }

    #[test]
    fn namespace_frame_renames_every_column() {
        let cfg = EngineConfig::default();
        let df = DataFrame::new(vec![
            Series::new("id".into(), &[1i64, 2]).into(),
            Series::new("age".into(), &[20i64, 30]).into(),
        ]).unwrap();
        let out = namespace_frame(df, "people", &cfg).unwrap();
        let names: Vec<String> = out.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["people__id", "people__age"]);
    }

    #[test]
    fn disjoint_sources_never_collide() {
        let cfg = EngineConfig::default();
        let a = namespace_frame(DataFrame::new(vec![Series::new("id".into(), &[1i64]).into()]).unwrap(), "a", &cfg).unwrap();
        let b = namespace_frame(DataFrame::new(vec![Series::new("id".into(), &[1i64]).into()]).unwrap(), "b", &cfg).unwrap();
        let mut all: Vec<String> = a.get_column_names().iter().chain(b.get_column_names().iter()).map(|c| c.to_string()).collect();
        let n = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), n);
    }

    #[test]
    fn namespace_plan_qualifies_every_reference() {
        let cfg = EngineConfig::default();
        let plan: RequestPlan = serde_json::from_value(serde_json::json!({
            "tables_and_join": {
                "primary": { "name": "data1.csv", "join_keys": ["id"],
                             "derived_columns": [ { "statement": "CASE WHEN [value] > 10 THEN 'H' ELSE 'L' END FROM data1" } ] },
                "secondaries": [ { "name": "data2.csv", "join_keys": ["roll"], "join_kind": "left" } ]
            },
            "filters": [
                { "name": "data1.csv", "convert": { "column": "created_at", "format": "dd/mm/yyyy" },
                  "conditions": { "expressions": ["dc1 == 'H'"] } },
                { "name": "data2.csv", "conditions": { "expressions": ["roll > 3", "roll < 9"], "operator": "OR" } }
            ]
        })).unwrap();
        let raw_before = format!("{:?}", plan);
        let q = namespace_plan(&plan, &cfg).unwrap();
        assert_eq!(format!("{:?}", plan), raw_before, "input plan must not be mutated");

        assert_eq!(q.primary.source, "data1");
        assert_eq!(q.primary.join_keys, vec!["data1__id"]);
        assert_eq!(q.primary.derived[0].name, "data1__dc1");
        assert_eq!(q.primary.derived[0].rule.column, "data1__value");
        assert_eq!(q.primary.derived[0].rule.op, CompOp::Gt);
        let f = &q.primary.filters[0];
        assert_eq!(f.reformat.as_ref().unwrap().column, "data1__created_at");
        assert_eq!(f.reformat.as_ref().unwrap().target_format, "%d/%m/%Y");
        assert_eq!(f.comparisons[0].column, "data1__dc1");
        assert_eq!(f.comparisons[0].value, Literal::Text("H".into()));

        let s = &q.secondaries[0];
        assert_eq!(s.join_keys, vec!["data2__roll"]);
        assert_eq!(s.filters[0].comparisons.len(), 2);
        assert_eq!(s.filters[0].comparisons[1].column, "data2__roll");
    }

    #[test]
    fn derived_rule_must_read_from_its_owner() {
        let cfg = EngineConfig::default();
        let plan: RequestPlan = serde_json::from_value(serde_json::json!({
            "tables_and_join": {
                "primary": { "name": "a.csv", "derived_columns": [ { "statement": "CASE WHEN [x] > 1 THEN 1 ELSE 0 END FROM b" } ] }
            },
            "filters": [ { "name": "a.csv", "conditions": { "expressions": ["x > 0"] } } ]
        })).unwrap();
        assert!(matches!(namespace_plan(&plan, &cfg), Err(AppError::SchemaValidation { .. })));
    }
}
