//! Join planning and the left-fold executor.
//!
//! `plan_joins` checks every primary/secondary key pairing before any join runs;
//! `execute_joins` then folds the secondaries into the primary strictly in
//! declaration order, each step joining the running result on conjunctive key
//! equality. Both key columns are kept in the output.

use polars::prelude::*;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::server::plan::{JoinKind, QualifiedPlan};
use super::exec_common::require_column;

#[derive(Debug, Clone, PartialEq)]
pub struct JoinStep {
    pub right_source: String,
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    pub kind: JoinKind,
}

fn join_how(kind: JoinKind) -> JoinType {
    match kind {
        JoinKind::Inner => JoinType::Inner,
        JoinKind::Outer => JoinType::Full,
        JoinKind::Left => JoinType::Left,
        JoinKind::Right => JoinType::Right,
    }
}

pub fn plan_joins(plan: &QualifiedPlan) -> AppResult<Vec<JoinStep>> {
    let left_keys = &plan.primary.join_keys;
    plan.secondaries
        .iter()
        .map(|s| {
            if s.join_keys.len() != left_keys.len() {
                return Err(AppError::JoinColumnMismatch {
                    left: plan.primary.table.clone(),
                    left_count: left_keys.len(),
                    right: s.table.clone(),
                    right_count: s.join_keys.len(),
                });
            }
            Ok(JoinStep {
                right_source: s.source.clone(),
                left_keys: left_keys.clone(),
                right_keys: s.join_keys.clone(),
                kind: s.join_kind.unwrap_or_default(),
            })
        })
        .collect()
}

fn check_step(result: &DataFrame, right: &DataFrame, step: &JoinStep) -> AppResult<()> {
    for (lk, rk) in step.left_keys.iter().zip(step.right_keys.iter()) {
        let ldt = require_column(result, lk, "join result")?;
        let rdt = require_column(right, rk, &step.right_source)?;
        if ldt != rdt {
            return Err(AppError::validation(format!(
                "join key type mismatch: '{}' is {} but '{}' is {}", lk, ldt, rk, rdt
            )));
        }
    }
    Ok(())
}

pub fn execute_joins(primary: DataFrame, secondaries: Vec<DataFrame>, steps: &[JoinStep]) -> AppResult<DataFrame> {
    if secondaries.len() != steps.len() {
        return Err(AppError::internal(format!("{} join steps for {} secondary tables", steps.len(), secondaries.len())));
    }
    let mut result = primary;
    for (right, step) in secondaries.into_iter().zip(steps.iter()) {
        check_step(&result, &right, step)?;
        debug!(target: "tabweave::join", "JOIN: {:?} on {:?} = {:?} (left rows={}, right rows={})",
            step.kind, step.left_keys, step.right_keys, result.height(), right.height());
        let left_on: Vec<Expr> = step.left_keys.iter().map(|k| col(k.as_str())).collect();
        let right_on: Vec<Expr> = step.right_keys.iter().map(|k| col(k.as_str())).collect();
        let args = JoinArgs::new(join_how(step.kind)).with_coalesce(JoinCoalesce::KeepColumns);
        result = result.lazy().join(right.lazy(), left_on, right_on, args).collect()?;
        debug!(target: "tabweave::join", "JOIN: result rows={} cols={}", result.height(), result.width());
    }
    Ok(result)
}
