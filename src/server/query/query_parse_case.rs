//! Derived-column rule grammar.
//!
//! ```text
//! CASE WHEN [ <col> ] <op> <value> THEN <value> ELSE <value> END FROM <table>
//! <op>    := == | != | > | >= | < | <=
//! <value> := '<text with '' escapes>' | [-]digits[.digits]
//! ```
//! Keywords are case-insensitive and whitespace between tokens is free-form.
//! The whole statement must match; there is no partial recovery.

use crate::error::{AppError, AppResult};
use super::query_common::{CaseRule, Cursor, Literal};

pub fn parse_case_statement(statement: &str) -> AppResult<CaseRule> {
    let fail = |msg: &str| AppError::derived(statement, msg);
    let mut c = Cursor::new(statement.trim());

    expect_keyword(&mut c, "CASE").map_err(|m| fail(&m))?;
    expect_keyword(&mut c, "WHEN").map_err(|m| fail(&m))?;

    c.skip_ws();
    if !c.eat_char('[') { return Err(fail("expected '[' before the column name")); }
    let column = c.take_while(|ch| ch != ']').trim().to_string();
    if !c.eat_char(']') { return Err(fail("missing closing ']' after the column name")); }
    if column.is_empty() { return Err(fail("empty column name")); }

    c.skip_ws();
    let op = c.eat_op().ok_or_else(|| fail("expected one of ==, !=, >, >=, <, <= after the column"))?;
    c.skip_ws();
    let comparison = parse_value(&mut c).map_err(|m| fail(&format!("comparison value: {}", m)))?;

    expect_keyword(&mut c, "THEN").map_err(|m| fail(&m))?;
    c.skip_ws();
    let then_value = parse_value(&mut c).map_err(|m| fail(&format!("THEN value: {}", m)))?;

    expect_keyword(&mut c, "ELSE").map_err(|m| fail(&m))?;
    c.skip_ws();
    let else_value = parse_value(&mut c).map_err(|m| fail(&format!("ELSE value: {}", m)))?;

    expect_keyword(&mut c, "END").map_err(|m| fail(&m))?;
    expect_keyword(&mut c, "FROM").map_err(|m| fail(&m))?;
    c.skip_ws();
    let table = c.take_while(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-' || ch == '.').to_string();
    if table.is_empty() { return Err(fail("expected a table name after FROM")); }
    c.skip_ws();
    if !c.at_end() {
        return Err(fail(&format!("unexpected trailing input '{}'", c.rest())));
    }

    Ok(CaseRule { column, op, comparison, then_value, else_value, table })
}

fn expect_keyword(c: &mut Cursor<'_>, kw: &str) -> Result<(), String> {
    c.skip_ws();
    if c.eat_keyword(kw) { Ok(()) } else { Err(format!("expected keyword {}", kw)) }
}

/// A quoted string or a decimal numeral. Numerals with a '.' become floats.
fn parse_value(c: &mut Cursor<'_>) -> Result<Literal, String> {
    match c.peek() {
        Some('\'') => {
            c.bump();
            let mut out = String::new();
            loop {
                match c.bump() {
                    Some('\'') => {
                        if c.peek() == Some('\'') { c.bump(); out.push('\''); } else { break; }
                    }
                    Some(ch) => out.push(ch),
                    None => return Err("unterminated string literal".to_string()),
                }
            }
            Ok(Literal::Text(out))
        }
        Some(ch) if ch.is_ascii_digit() || ch == '-' => {
            let mut text = String::new();
            if c.eat_char('-') { text.push('-'); }
            let int_part = c.take_while(|ch| ch.is_ascii_digit());
            if int_part.is_empty() { return Err("expected digits".to_string()); }
            text.push_str(int_part);
            if c.eat_char('.') {
                let frac = c.take_while(|ch| ch.is_ascii_digit());
                if frac.is_empty() { return Err("expected digits after '.'".to_string()); }
                text.push('.');
                text.push_str(frac);
                return text.parse::<f64>().map(Literal::Float).map_err(|e| e.to_string());
            }
            text.parse::<i64>().map(Literal::Int).map_err(|e| e.to_string())
        }
        Some(other) => Err(format!("expected a quoted string or a number, found '{}'", other)),
        None => Err("expected a value, found end of statement".to_string()),
    }
}
